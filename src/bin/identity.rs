use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use zkp_group_signal::{config, Config, Identity};

/// Create identities and export their commitments.
///
/// With `--count` a whole test group is generated: commitments go to
/// `--members-out` and the matching secrets to `--secrets-out`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Derive the identity from this seed instead of the OS RNG
    #[arg(short, long, conflicts_with = "count")]
    seed: Option<String>,

    /// Restore an identity from an exported secret and print its commitment
    #[arg(long, conflicts_with_all = ["seed", "count"])]
    secret: Option<String>,

    /// Generate this many random identities
    #[arg(short, long)]
    count: Option<usize>,

    #[arg(long, default_value = "members.txt")]
    members_out: PathBuf,

    #[arg(long, default_value = "secrets.txt")]
    secrets_out: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn generate_group(count: usize, args: &Args) -> Result<()> {
    println!("Generating {count} random identities...");
    let identities = (0..count)
        .map(|_| Identity::new(None))
        .collect::<zkp_group_signal::Result<Vec<_>>>()
        .context("Failed to generate identity")?;

    let unique: HashSet<_> = identities.iter().map(Identity::commitment_hex).collect();
    if unique.len() != identities.len() {
        return Err(anyhow::anyhow!("Generated duplicate commitments"));
    }

    let mut members = BufWriter::new(
        File::create(&args.members_out)
            .with_context(|| format!("Failed to create {}", args.members_out.display()))?,
    );
    let mut secrets = BufWriter::new(
        File::create(&args.secrets_out)
            .with_context(|| format!("Failed to create {}", args.secrets_out.display()))?,
    );
    for identity in &identities {
        writeln!(members, "{}", identity.commitment_hex())?;
        writeln!(secrets, "{}", identity.secret_hex())?;
    }
    members.flush()?;
    secrets.flush()?;

    info!(
        "Wrote {count} commitments to {} and secrets to {}",
        args.members_out.display(),
        args.secrets_out.display()
    );
    println!("First commitments:");
    for (i, identity) in identities.iter().take(5).enumerate() {
        println!("  {}: {}", i + 1, identity.commitment_hex());
    }
    println!(
        "\nKeep {} private: each line is a member's secret.",
        args.secrets_out.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::init(Config::load(args.config.as_deref())?)?;

    if let Some(count) = args.count {
        if count == 0 {
            return Err(anyhow::anyhow!("--count must be at least 1"));
        }
        return generate_group(count, &args);
    }

    let identity = match &args.secret {
        Some(secret) => Identity::from_secret_hex(secret).context("Failed to restore identity")?,
        None => Identity::new_with_limit(args.seed.as_deref(), config.identity.max_seed_len)
            .context("Failed to create identity")?,
    };

    println!("Commitment: {}", identity.commitment_hex());
    if args.secret.is_none() {
        println!("Secret:     {}", identity.secret_hex());
        println!("\nAdd the commitment to the group; keep the secret private.");
    }
    Ok(())
}
