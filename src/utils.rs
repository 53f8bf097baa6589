//! Utility functions for hex validation, field encoding and hashing.

use crate::error::{Error, Result};
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::{Field, PrimeField};
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};

/// Length in hex characters of an encoded field element.
pub const FIELD_HEX_LEN: usize = 64;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use zkp_group_signal::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(Error::InvalidInput(format!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(Error::InvalidInput(
            "Invalid hex string: contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped.to_string())
}

const BASE_U64: u64 = 256;

/// Reduces 32 big-endian bytes into a Pallas base field element.
///
/// Total (never fails): values at or above the modulus wrap around.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; 32]) -> pallas::Base {
    let mut value = pallas::Base::ZERO;
    let base = pallas::Base::from(BASE_U64);

    for &byte in bytes.iter() {
        value = value * base + pallas::Base::from(byte as u64);
    }

    value
}

/// Canonical little-endian encoding of a field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let repr = field.to_repr();
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

/// Inverse of [`field_to_bytes`]. Returns `None` for non-canonical encodings.
#[inline]
#[must_use]
pub fn field_from_bytes(bytes: &[u8; 32]) -> Option<pallas::Base> {
    Option::from(pallas::Base::from_repr(*bytes))
}

#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a canonical field element from 64 hex characters (optional `0x`).
///
/// ```
/// use zkp_group_signal::utils::{field_from_hex, field_to_hex};
/// use pasta_curves::pallas;
///
/// let value = pallas::Base::from(42);
/// assert_eq!(field_from_hex(&field_to_hex(value)).unwrap(), value);
/// ```
pub fn field_from_hex(input: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(input, FIELD_HEX_LEN)?;
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(&stripped, &mut bytes)
        .map_err(|e| Error::InvalidInput(format!("Invalid hex '{stripped}': {e}")))?;
    field_from_bytes(&bytes).ok_or_else(|| {
        Error::InvalidInput(format!(
            "'{stripped}' is not a canonical field element encoding"
        ))
    })
}

/// Domain-separated SHA3-256 of `data`, reduced into the field.
///
/// The most significant byte of the digest is cleared so the value is always
/// below the modulus and the mapping never wraps.
#[must_use]
pub fn hash_to_field(domain: &[u8], data: &[u8]) -> pallas::Base {
    let mut hasher = Sha3_256::new();
    hasher.update((domain.len() as u64).to_be_bytes());
    hasher.update(domain);
    hasher.update(data);
    let mut digest: [u8; 32] = hasher.finalize().into();
    digest[0] = 0;
    bytes_to_field(&digest)
}

/// Poseidon hash of two field elements using `P128Pow5T3` specification.
///
/// This is the pairwise node hash of the group tree and the nullifier hash.
///
/// # Example
///
/// ```
/// use zkp_group_signal::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// assert_ne!(poseidon_hash(left, right), poseidon_hash(right, left));
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

/// Poseidon hash of a single field element, used for identity commitments.
#[inline]
#[must_use]
pub fn poseidon_hash_one(value: pallas::Base) -> pallas::Base {
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<1>, 3, 2>::init().hash([value])
}

/// Serde adapter encoding a field element as canonical hex.
pub mod serde_field {
    use pasta_curves::pallas;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &pallas::Base, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::field_to_hex(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<pallas::Base, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::field_from_hex(&encoded).map_err(de::Error::custom)
    }
}

/// Serde adapter for a sequence of hex encoded field elements.
pub mod serde_field_vec {
    use pasta_curves::pallas;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[pallas::Base], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| super::field_to_hex(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<pallas::Base>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| super::field_from_hex(s).map_err(de::Error::custom))
            .collect()
    }
}
