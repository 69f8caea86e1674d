// eerc/eerc-prover/src/main.rs
// Numan Thabit 2025

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eerc_common::ProofFormat;
use eerc_prover::{
    pipeline::{DEFAULT_CACHE_DIR, DEFAULT_EXPORT_DIR},
    ProofPipeline, ProverConfig,
};

/// Generate a Groth16 proof for a confidential-token transfer or withdraw.
#[derive(Parser)]
struct Args {
    /// Load the whole request from a JSON config file instead of flags.
    #[arg(long, conflicts_with_all = ["operation", "input", "output"])]
    config: Option<PathBuf>,
    /// `transfer` or `withdraw`.
    #[arg(long, required_unless_present = "config")]
    operation: Option<String>,
    /// JSON document with `PubIns` and `PrivIns`.
    #[arg(long, required_unless_present = "config")]
    input: Option<PathBuf>,
    #[arg(long, required_unless_present = "config")]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = ProofFormat::Json)]
    format: ProofFormat,
    /// Also export the artifact set (constraint system, keys, manifest).
    #[arg(long)]
    extract: bool,
    #[arg(long, env = "EERC_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    export_dir: PathBuf,
    #[arg(long, env = "EERC_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,
    /// Ignore cached artifacts and compile new ones.
    #[arg(long)]
    new: bool,
    /// Deterministic key generation. Anyone with the seed can forge proofs.
    #[arg(long)]
    keygen_seed: Option<u64>,
    /// Do not write compiled artifacts to the cache.
    #[arg(long)]
    no_persist: bool,
    /// Replace unreadable cached artifacts instead of failing.
    #[arg(long)]
    recompile_on_corrupt: bool,
    #[arg(long, default_value = eerc_common::DEFAULT_PARAMETER_SET)]
    parameter_set: String,
}

impl Args {
    fn into_config(self) -> Result<ProverConfig> {
        if let Some(path) = &self.config {
            return ProverConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()));
        }
        let (Some(operation), Some(input), Some(output)) = (self.operation, self.input, self.output)
        else {
            anyhow::bail!("--operation, --input and --output are required without --config");
        };
        Ok(ProverConfig {
            extract: self.extract,
            format: self.format,
            export_dir: self.export_dir,
            cache_dir: self.cache_dir,
            new: self.new,
            keygen_seed: self.keygen_seed,
            persist: !self.no_persist,
            recompile_on_corrupt: self.recompile_on_corrupt,
            parameter_set: self.parameter_set,
            ..ProverConfig::new(operation, input, output)
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eerc_prover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Args::parse().into_config()?;
    let pipeline = ProofPipeline::from_config(&config);
    let outcome = pipeline
        .run(&config)
        .with_context(|| format!("failed to prove {} request", config.operation))?;

    println!(
        "wrote {} proof to {} ({})",
        outcome.kind,
        outcome.output.display(),
        outcome.format
    );
    if let Some(manifest) = &outcome.exported {
        println!(
            "exported {} artifacts to {} (fingerprint {})",
            outcome.kind.artifact_name(),
            config.export_dir.display(),
            manifest.fingerprint
        );
    }
    Ok(())
}
