use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zkp_group_signal::{
    config, nullifier::NullifierLog, utils::field_from_hex, utils::field_to_hex,
    CircuitArtifacts, Config, ProofOutput, ProofVerifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    proof_file: PathBuf,

    /// Depth of the group the proof must have been made for
    #[arg(short, long)]
    depth: usize,

    /// Only accept proofs against this group root
    #[arg(long)]
    expected_root: Option<String>,

    /// Defaults to `<proof file>.nullifiers.txt`. Not safe to share between
    /// verifier processes running at the same time.
    #[arg(long)]
    nullifier_file: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::init(Config::load(args.config.as_deref())?)?;

    if !args.proof_file.exists() {
        return Err(anyhow::anyhow!(
            "Proof file does not exist: {}",
            args.proof_file.display()
        ));
    }

    info!("Loading proof from: {}", args.proof_file.display());
    println!("Loading proof from: {}", args.proof_file.display());

    let metadata = fs::metadata(&args.proof_file).context("Failed to read proof file metadata")?;
    debug!("Proof file size: {} bytes", metadata.len());
    if metadata.len() > config.proof.max_file_size {
        return Err(anyhow::anyhow!(
            "Proof file too large: {} bytes (max {} bytes). Set ZKP_MAX_PROOF_FILE_SIZE to raise the limit.",
            metadata.len(),
            config.proof.max_file_size
        ));
    }

    let proof_content =
        fs::read_to_string(&args.proof_file).context("Failed to read proof file")?;
    let output: ProofOutput =
        serde_json::from_str(&proof_content).context("Failed to parse proof JSON")?;
    output
        .validate(config)
        .context("Proof validation failed. The proof structure is invalid.")?;
    info!("Proof validation passed");

    let signals = output.public_signals;
    println!("Proof details:");
    println!("  Merkle Root: {}", field_to_hex(signals.merkle_root));
    println!("  Nullifier Hash: {}", field_to_hex(signals.nullifier_hash));
    println!("  Signal Hash: {}", field_to_hex(signals.signal_hash));
    println!(
        "  External Nullifier: {}",
        field_to_hex(signals.external_nullifier)
    );
    println!("  Depth: {} (verifying at {})", output.depth, args.depth);
    println!("  Timestamp: {}", output.timestamp);
    println!("  ZK Proof Size: {} bytes", output.proof.len());

    let artifacts =
        Arc::new(CircuitArtifacts::load(&config.keys).context("Failed to load circuit artifacts")?);
    let verifier = ProofVerifier::from_config(artifacts, config);

    info!("Verifying ZK proof...");
    println!("Verifying ZK proof...");
    let full_proof = output.full_proof();
    let valid = match &args.expected_root {
        Some(root) => {
            let expected = field_from_hex(root).context("Invalid --expected-root")?;
            verifier.verify_with_root(&full_proof.proof, &signals, args.depth, expected)
        }
        None => verifier.verify_proof(&full_proof.proof, &signals, args.depth),
    }
    .context("Proof could not be checked")?;

    if !valid {
        error!("Proof verification FAILED");
        println!("\n✗ Proof verification FAILED!");
        return Err(anyhow::anyhow!("Proof verification failed"));
    }

    info!("Proof verification PASSED");
    println!("\n✓ Proof verification PASSED!");
    println!("The prover is a member of the group with root");
    println!("{}", field_to_hex(signals.merkle_root));

    let log = match args.nullifier_file {
        Some(path) => NullifierLog::new(path),
        None => NullifierLog::beside(&args.proof_file),
    };
    if !log.record(&signals)? {
        error!("Nullifier already used for this external nullifier");
        println!("\n✗ Nullifier hash already recorded: this member has already signalled in this context.");
        return Err(anyhow::anyhow!("Nullifier already exists in file"));
    }
    println!("\nNullifier recorded to: {}", log.path().display());
    Ok(())
}
