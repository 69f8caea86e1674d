use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use ark_bn254::{Bn254, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_groth16::VerifyingKey;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eerc_circuit::{CircuitRegistry, OperationKind};
use eerc_common::{
    codec::parse_rendered, export_artifacts, field::field_to_decimal,
    manifest::load_verifying_key, read_inputs, ArtifactManifest, CircuitDescriptor, ProofFormat,
    DEFAULT_PARAMETER_SET,
};
use eerc_prover::{compile, KeygenEntropy};
use eerc_verifier::verify_with_inputs;

const DEFAULT_OUTPUT_DIR: &str = "artifacts/export";

#[derive(Parser)]
#[command(
    name = "eerc-tools",
    about = "Utility commands for confidential-token proving artifacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a circuit, generate its keys and export the artifact set.
    GenParams(GenParamsArgs),
    /// Print metadata about the verifying key of an exported set.
    DumpVk(DumpArgs),
    /// Check a proof file against an exported verifying key.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct GenParamsArgs {
    /// `transfer` or `withdraw`.
    #[arg(long)]
    operation: OperationKind,
    /// Output directory for artifacts.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Deterministic setup. Anyone holding the seed can forge proofs.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = DEFAULT_PARAMETER_SET)]
    parameter_set: String,
}

#[derive(Args)]
struct DumpArgs {
    #[arg(long)]
    manifest: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    manifest: PathBuf,
    #[arg(long)]
    proof: PathBuf,
    /// Input document whose `PubIns` the proof must match.
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value_t = ProofFormat::Json)]
    format: ProofFormat,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eerc_prover=info,eerc_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::GenParams(args) => gen_params(args),
        Commands::DumpVk(args) => dump_vk(args),
        Commands::Verify(args) => verify(args),
    }
}

fn gen_params(args: GenParamsArgs) -> Result<()> {
    let factory = CircuitRegistry::default().resolve(args.operation)?;
    let descriptor = CircuitDescriptor::from_factory(&factory, args.parameter_set.as_str());
    let entropy = args.seed.map_or(KeygenEntropy::Os, KeygenEntropy::Seeded);

    println!(
        "Generating {} circuit artifacts ({})...",
        args.operation,
        descriptor.cache_slot()
    );
    let started = Instant::now();
    let artifacts = compile(&descriptor, &factory, entropy)
        .with_context(|| format!("failed to compile {} circuit", args.operation))?;
    tracing::info!(
        operation = %args.operation,
        constraints = artifacts.compiled().num_constraints(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "circuit compiled"
    );

    let started = Instant::now();
    let manifest = export_artifacts(&args.output_dir, args.operation.artifact_name(), &artifacts)
        .with_context(|| format!("failed to export to {}", args.output_dir.display()))?;
    tracing::info!(
        dir = %args.output_dir.display(),
        fingerprint = %manifest.fingerprint,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "artifacts exported"
    );

    println!(
        "Generated {} artifacts for circuit v{} at {}",
        args.operation.artifact_name(),
        descriptor.circuit_version,
        args.output_dir.display()
    );
    print_artifact_summary(&manifest);
    Ok(())
}

fn print_artifact_summary(manifest: &ArtifactManifest) {
    println!("\nArtifact Summary:");
    for entry in [&manifest.constraint_system, &manifest.pk, &manifest.vk] {
        println!("  {}: {} bytes, blake3: {}", entry.path, entry.size, entry.blake3);
    }
    println!("  fingerprint: {}", manifest.fingerprint);
    println!("  keygen: {:?}", manifest.keygen);
}

fn dump_vk(args: DumpArgs) -> Result<()> {
    let (manifest, vk) = load_vk(&args.manifest)?;
    let summary = VkSummary {
        manifest_path: args.manifest.display().to_string(),
        operation: manifest.descriptor.kind,
        circuit_version: manifest.descriptor.circuit_version,
        parameter_set: manifest.descriptor.parameter_set.clone(),
        fingerprint: manifest.fingerprint.clone(),
        vk_hash: manifest.vk.blake3.clone(),
        vk_size: manifest.vk.size,
        num_public_inputs: vk.gamma_abc_g1.len().saturating_sub(1),
        alpha_g1: g1_words(&vk.alpha_g1),
        beta_g2: g2_words(&vk.beta_g2),
        gamma_g2: g2_words(&vk.gamma_g2),
        delta_g2: g2_words(&vk.delta_g2),
        ic: vk.gamma_abc_g1.iter().map(g1_words).collect(),
    };
    output_summary(&summary, args.json)
}

fn verify(args: VerifyArgs) -> Result<()> {
    let (manifest, vk) = load_vk(&args.manifest)?;
    let inputs = read_inputs(&args.input)?;
    let raw = fs::read(&args.proof)
        .with_context(|| format!("failed to read {}", args.proof.display()))?;
    let proof = parse_rendered(&raw, args.format)
        .with_context(|| format!("failed to parse {} proof", args.format))?;

    let valid = verify_with_inputs(&vk, &proof, &inputs)?;
    tracing::info!(
        operation = %manifest.descriptor.kind,
        proof = %args.proof.display(),
        valid,
        "verification finished"
    );
    if !valid {
        bail!(
            "proof {} does not verify under {}",
            args.proof.display(),
            manifest.descriptor.cache_slot()
        );
    }
    println!(
        "proof {} is valid for {} ({})",
        args.proof.display(),
        manifest.descriptor.kind,
        manifest.descriptor.cache_slot()
    );
    Ok(())
}

fn load_vk(path: &Path) -> Result<(ArtifactManifest, VerifyingKey<Bn254>)> {
    let (manifest, vk) = load_verifying_key(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    tracing::info!(
        manifest = %path.display(),
        slot = %manifest.descriptor.cache_slot(),
        "verifying key loaded"
    );
    Ok((manifest, vk))
}

fn g1_words(point: &G1Affine) -> [String; 2] {
    match point.xy() {
        Some((x, y)) => [field_to_decimal(x), field_to_decimal(y)],
        None => ["0".into(), "0".into()],
    }
}

// Solidity verifiers take G2 coordinates with the imaginary part first.
fn g2_words(point: &G2Affine) -> [[String; 2]; 2] {
    match point.xy() {
        Some((x, y)) => [
            [field_to_decimal(&x.c1), field_to_decimal(&x.c0)],
            [field_to_decimal(&y.c1), field_to_decimal(&y.c0)],
        ],
        None => Default::default(),
    }
}

fn output_summary<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

#[derive(Serialize)]
struct VkSummary {
    manifest_path: String,
    operation: OperationKind,
    circuit_version: u32,
    parameter_set: String,
    fingerprint: String,
    vk_hash: String,
    vk_size: u64,
    num_public_inputs: usize,
    alpha_g1: [String; 2],
    beta_g2: [[String; 2]; 2],
    gamma_g2: [[String; 2]; 2],
    delta_g2: [[String; 2]; 2],
    ic: Vec<[String; 2]>,
}

impl fmt::Display for VkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "manifest: {}", self.manifest_path)?;
        writeln!(f, "operation: {}", self.operation)?;
        writeln!(f, "circuit_version: {}", self.circuit_version)?;
        writeln!(f, "parameter_set: {}", self.parameter_set)?;
        writeln!(f, "fingerprint: {}", self.fingerprint)?;
        writeln!(f, "vk_hash: {}", self.vk_hash)?;
        writeln!(f, "vk_size: {} bytes", self.vk_size)?;
        write!(f, "public inputs: {}", self.num_public_inputs)
    }
}
