//! halo2 circuit proving group membership, nullifier derivation and signal binding.
//!
//! Private witnesses: the identity secret, the Merkle siblings and the path
//! direction bits. Public instance (one column, see [`PublicSignals`]):
//!
//! | row | value              |
//! |-----|--------------------|
//! | 0   | merkle root        |
//! | 1   | nullifier hash     |
//! | 2   | signal hash        |
//! | 3   | external nullifier |
//!
//! Constraints:
//! 1. `commitment = Poseidon(secret)`
//! 2. folding `commitment` up the path with `Poseidon(left, right)` yields row 0
//! 3. `Poseidon(secret, external_nullifier)` equals row 1
//! 4. the signal hash is copied from row 2 into an advice cell, binding it to the proof
//!
//! The number of levels is a property of the circuit, so each depth has its
//! own proving and verifying key.

use crate::merkle::MerklePath;
use crate::types::PublicSignals;
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{Advice, Circuit, Column, ConstraintSystem, Error, Expression, Instance, Selector},
    poly::Rotation,
};
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;

type Cell = AssignedCell<pallas::Base, pallas::Base>;

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// current, sibling, bit, left, right
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    q_swap: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
}

#[derive(Debug, Clone)]
pub struct MembershipCircuit {
    secret: Value<pallas::Base>,
    siblings: Vec<Value<pallas::Base>>,
    /// 1 when the node at that level is a right child.
    path_bits: Vec<Value<pallas::Base>>,
}

impl MembershipCircuit {
    /// Witness-free circuit of the given depth, used for key generation.
    #[must_use]
    pub fn blank(depth: usize) -> Self {
        Self {
            secret: Value::unknown(),
            siblings: vec![Value::unknown(); depth],
            path_bits: vec![Value::unknown(); depth],
        }
    }

    /// Circuit with witnesses for a member holding `secret` at `path`.
    #[must_use]
    pub fn new(secret: pallas::Base, path: &MerklePath) -> Self {
        Self {
            secret: Value::known(secret),
            siblings: path.siblings.iter().map(|s| Value::known(*s)).collect(),
            path_bits: path
                .path_bits
                .iter()
                .map(|&is_right| {
                    Value::known(if is_right {
                        pallas::Base::ONE
                    } else {
                        pallas::Base::ZERO
                    })
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

fn hash_one(
    config: &MembershipConfig,
    mut layouter: impl Layouter<pallas::Base>,
    value: Cell,
) -> Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<1>, 3, 2>::init(
        chip,
        layouter.namespace(|| "init"),
    )?;
    hasher.hash(layouter.namespace(|| "hash"), [value])
}

fn hash_pair(
    config: &MembershipConfig,
    mut layouter: impl Layouter<pallas::Base>,
    left: Cell,
    right: Cell,
) -> Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<2>, 3, 2>::init(
        chip,
        layouter.namespace(|| "init"),
    )?;
    hasher.hash(layouter.namespace(|| "hash"), [left, right])
}

impl Circuit<pallas::Base> for MembershipCircuit {
    type Config = MembershipConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::blank(self.depth())
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        let instance = meta.instance_column();
        meta.enable_equality(instance);
        for column in advice {
            meta.enable_equality(column);
        }

        let state = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        let partial_sbox = meta.advice_column();
        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);
        let poseidon = Pow5Chip::<pallas::Base, 3, 2>::configure::<P128Pow5T3>(
            meta,
            state,
            partial_sbox,
            rc_a,
            rc_b,
        );

        // Orders (current, sibling) by the path bit:
        // left = current + bit * (sibling - current), right = sibling + bit * (current - sibling)
        let q_swap = meta.selector();
        meta.create_gate("merkle swap", |meta| {
            let q = meta.query_selector(q_swap);
            let current = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let bit = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::ONE);

            vec![
                q.clone() * bit.clone() * (one - bit.clone()),
                q.clone()
                    * (left - (current.clone() + bit.clone() * (sibling.clone() - current.clone()))),
                q * (right - (sibling.clone() + bit * (current - sibling))),
            ]
        });

        MembershipConfig {
            advice,
            instance,
            q_swap,
            poseidon,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> Result<(), Error> {
        let (secret, external_nullifier) = layouter.assign_region(
            || "load inputs",
            |mut region| {
                let secret =
                    region.assign_advice(|| "secret", config.advice[0], 0, || self.secret)?;
                let external_nullifier = region.assign_advice_from_instance(
                    || "external nullifier",
                    config.instance,
                    PublicSignals::EXTERNAL_NULLIFIER_ROW,
                    config.advice[1],
                    0,
                )?;
                region.assign_advice_from_instance(
                    || "signal hash",
                    config.instance,
                    PublicSignals::SIGNAL_HASH_ROW,
                    config.advice[2],
                    0,
                )?;
                Ok((secret, external_nullifier))
            },
        )?;

        let commitment = hash_one(&config, layouter.namespace(|| "commitment"), secret.clone())?;

        let nullifier_hash = hash_pair(
            &config,
            layouter.namespace(|| "nullifier hash"),
            secret,
            external_nullifier,
        )?;
        layouter.constrain_instance(
            nullifier_hash.cell(),
            config.instance,
            PublicSignals::NULLIFIER_HASH_ROW,
        )?;

        let mut current = commitment;
        for (level, (sibling, bit)) in self.siblings.iter().zip(&self.path_bits).enumerate() {
            let (left, right) = layouter.assign_region(
                || format!("merkle swap {level}"),
                |mut region| {
                    config.q_swap.enable(&mut region, 0)?;
                    let node = current.copy_advice(|| "current", &mut region, config.advice[0], 0)?;
                    region.assign_advice(|| "sibling", config.advice[1], 0, || *sibling)?;
                    region.assign_advice(|| "path bit", config.advice[2], 0, || *bit)?;

                    let inputs = node.value().map(|v| *v).zip(*sibling).zip(*bit);
                    let left = region.assign_advice(
                        || "left",
                        config.advice[3],
                        0,
                        || inputs.map(|((c, s), b)| c + b * (s - c)),
                    )?;
                    let right = region.assign_advice(
                        || "right",
                        config.advice[4],
                        0,
                        || inputs.map(|((c, s), b)| s + b * (c - s)),
                    )?;
                    Ok((left, right))
                },
            )?;

            current = hash_pair(
                &config,
                layouter.namespace(|| format!("merkle hash {level}")),
                left,
                right,
            )?;
        }

        layouter.constrain_instance(current.cell(), config.instance, PublicSignals::MERKLE_ROOT_ROW)
    }
}
