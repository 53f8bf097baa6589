use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use zkp_group_signal::{
    config, members::load_members_file, utils::field_to_hex, CircuitArtifacts, Config,
    ExternalNullifier, GroupTree, Identity, ProofOutput, ProofRequest, ProvingService,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with one member commitment per line
    #[arg(short, long)]
    members_file: PathBuf,

    /// Exported identity secret (64 hex characters)
    #[arg(short, long, env = "ZKP_IDENTITY_SECRET", hide_env_values = true)]
    secret: String,

    /// Context the nullifier is scoped to, e.g. a poll id
    #[arg(short, long)]
    external_nullifier: String,

    #[arg(long, default_value = "")]
    signal: String,

    /// Tree depth; defaults to `group.default_depth`
    #[arg(short, long)]
    depth: Option<usize>,

    /// Defaults to `proof.output_file`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Proving deadline in seconds; defaults to `proof.deadline_secs`
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::init(Config::load(args.config.as_deref())?)?;
    let depth = args.depth.unwrap_or(config.group.default_depth);

    println!("Loading members from: {}", args.members_file.display());
    let members = load_members_file(&args.members_file)?;
    println!("Loaded {} members", members.len());

    let identity = Identity::from_secret_hex(&args.secret).context("Failed to parse secret")?;
    println!("Prover commitment: {}", identity.commitment_hex());

    println!("Building group tree (depth {depth})...");
    let group = GroupTree::with_members(depth, members).context("Failed to build group")?;
    println!("Group root: {}", field_to_hex(group.root()));
    let leaf_index = group.index_of(&identity.commitment()).with_context(|| {
        format!(
            "Commitment {} not found in members file '{}'. Make sure the secret belongs to a member of the group.",
            identity.commitment_hex(),
            args.members_file.display()
        )
    })?;
    debug!("Prover is member #{leaf_index}");

    let external_nullifier = ExternalNullifier::new(&args.external_nullifier)?;

    info!("Loading circuit artifacts from {}", config.keys.cache_dir.display());
    let artifacts =
        Arc::new(CircuitArtifacts::load(&config.keys).context("Failed to load circuit artifacts")?);
    let service = ProvingService::new(artifacts, config);
    let deadline = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| service.default_deadline());

    println!("Generating ZK proof (this may take a while)...");
    let request = ProofRequest {
        identity,
        snapshot: group.snapshot(),
        external_nullifier,
        signal: args.signal.into_bytes(),
    };
    let full_proof = service
        .generate(request, deadline)
        .await
        .context("Failed to create proof")?;
    println!("ZK proof generated, size: {} bytes", full_proof.proof.len());

    let output = ProofOutput::new(full_proof, depth)?;
    let output_path = args.output.unwrap_or_else(|| config.proof.output_file.clone());
    println!("Writing proof to: {}", output_path.display());
    let json_output =
        serde_json::to_string_pretty(&output).context("Failed to serialize proof to JSON")?;
    fs::write(&output_path, json_output).context("Failed to write proof file")?;

    println!("Proof successfully generated and saved!");
    println!("Merkle Root: {}", field_to_hex(output.public_signals.merkle_root));
    println!(
        "Nullifier Hash: {}",
        field_to_hex(output.public_signals.nullifier_hash)
    );

    Ok(())
}
