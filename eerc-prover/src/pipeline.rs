// eerc/eerc-prover/src/pipeline.rs
// Numan Thabit 2025

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eerc_circuit::{CircuitRegistry, OperationKind};
use eerc_common::{
    build_witness, check_shape,
    codec::{public_signals, write_proof},
    encode_proof, export_artifacts, read_inputs, ArtifactManifest, CanonicalProofBytes,
    CircuitArtifacts, CircuitDescriptor, FailureKind, Inputs, PipelineError, PipelineResult,
    ProofFormat, DEFAULT_PARAMETER_SET,
};

use crate::{
    prove,
    store::{ArtifactBackend, ArtifactStore, CorruptArtifactPolicy, FsArtifactBackend, StorePolicy},
    KeygenEntropy,
};

pub const DEFAULT_CACHE_DIR: &str = "artifacts/cache";
pub const DEFAULT_EXPORT_DIR: &str = "artifacts/export";

/// One proof request. Field names follow the JSON config files the tool
/// has always read (`Input`, `Output`, `Extract`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProverConfig {
    pub operation: String,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Export the artifact set next to the proof.
    #[serde(default)]
    pub extract: bool,
    #[serde(default)]
    pub format: ProofFormat,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Ignore cached artifacts and compile fresh ones.
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub keygen_seed: Option<u64>,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default)]
    pub recompile_on_corrupt: bool,
    #[serde(default = "default_parameter_set")]
    pub parameter_set: String,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_true() -> bool {
    true
}

fn default_parameter_set() -> String {
    DEFAULT_PARAMETER_SET.to_string()
}

impl ProverConfig {
    pub fn new(
        operation: impl Into<String>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            operation: operation.into(),
            input: input.into(),
            output: output.into(),
            extract: false,
            format: ProofFormat::default(),
            export_dir: default_export_dir(),
            cache_dir: default_cache_dir(),
            new: false,
            keygen_seed: None,
            persist: true,
            recompile_on_corrupt: false,
            parameter_set: default_parameter_set(),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| PipelineError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|err| PipelineError::InputParse(format!("invalid prover config: {err}")))
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            persist_compiled: self.persist,
            on_corrupt: if self.recompile_on_corrupt {
                CorruptArtifactPolicy::Recompile
            } else {
                CorruptArtifactPolicy::Fail
            },
            entropy: self
                .keygen_seed
                .map_or(KeygenEntropy::Os, KeygenEntropy::Seeded),
            force_recompile: self.new,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Idle,
    InputParsed,
    CircuitResolved,
    ArtifactsAcquired,
    WitnessBuilt,
    Proved,
    Encoded,
    Exported,
    Done,
    Failed(FailureKind),
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Failed(kind) => write!(f, "Failed({kind})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Terminal failure of one request. `reached` lists the stages completed
/// before the failing one.
#[derive(Debug, Error)]
#[error("proof pipeline failed after {}: {error}", last_stage(.reached))]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    pub reached: Vec<PipelineStage>,
    #[source]
    pub error: PipelineError,
}

fn last_stage(reached: &[PipelineStage]) -> PipelineStage {
    reached.last().copied().unwrap_or(PipelineStage::Idle)
}

impl PipelineFailure {
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    pub kind: OperationKind,
    pub output: PathBuf,
    pub format: ProofFormat,
    pub proof: CanonicalProofBytes,
    /// Public inputs as decimal strings, in verifier order.
    pub public_signals: Vec<String>,
    pub exported: Option<ArtifactManifest>,
    pub stages: Vec<PipelineStage>,
}

/// Result of proving without touching the filesystem.
#[derive(Clone, Debug)]
pub struct GeneratedProof {
    pub proof: Proof<Bn254>,
    pub canonical: CanonicalProofBytes,
    pub public_inputs: Vec<Fr>,
    pub artifacts: Arc<CircuitArtifacts>,
}

struct StageLog {
    reached: Vec<PipelineStage>,
}

impl StageLog {
    fn start() -> Self {
        Self {
            reached: vec![PipelineStage::Idle],
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        tracing::debug!(%stage, "pipeline stage reached");
        self.reached.push(stage);
    }

    fn fail(self, error: PipelineError) -> PipelineFailure {
        tracing::error!(
            code = error.error_code(),
            after = %last_stage(&self.reached),
            error = %error,
            "proof request failed"
        );
        PipelineFailure {
            stage: PipelineStage::Failed(error.kind()),
            reached: self.reached,
            error,
        }
    }
}

/// Input → circuit → artifacts → witness → proof → encoding → (export).
pub struct ProofPipeline<B = FsArtifactBackend> {
    registry: CircuitRegistry,
    store: Arc<ArtifactStore<B>>,
    parameter_set: String,
}

impl ProofPipeline<FsArtifactBackend> {
    /// Default registry over a filesystem cache configured by `config`.
    pub fn from_config(config: &ProverConfig) -> Self {
        Self::new(
            CircuitRegistry::default(),
            Arc::new(ArtifactStore::filesystem(
                &config.cache_dir,
                config.store_policy(),
            )),
            config.parameter_set.clone(),
        )
    }
}

impl<B: ArtifactBackend> ProofPipeline<B> {
    pub fn new(
        registry: CircuitRegistry,
        store: Arc<ArtifactStore<B>>,
        parameter_set: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            parameter_set: parameter_set.into(),
        }
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ArtifactStore<B>> {
        &self.store
    }

    pub fn descriptor(&self, kind: OperationKind) -> PipelineResult<CircuitDescriptor> {
        let factory = self.registry.resolve(kind)?;
        Ok(CircuitDescriptor::from_factory(&factory, self.parameter_set.as_str()))
    }

    /// Run one request end to end. The proof file is written only once the
    /// proof has been generated and encoded.
    pub fn run(&self, config: &ProverConfig) -> Result<PipelineOutcome, PipelineFailure> {
        let mut log = StageLog::start();
        macro_rules! step {
            ($expr:expr) => {
                match $expr {
                    Ok(value) => value,
                    Err(err) => return Err(log.fail(PipelineError::from(err))),
                }
            };
        }

        let inputs = step!(read_inputs(&config.input));
        log.advance(PipelineStage::InputParsed);

        let kind: OperationKind = step!(config.operation.parse());
        let factory = step!(self.registry.resolve(kind));
        log.advance(PipelineStage::CircuitResolved);
        step!(check_shape(factory.layout(), &inputs));

        let descriptor = CircuitDescriptor::from_factory(&factory, self.parameter_set.as_str());
        let artifacts = step!(self.store.acquire(&descriptor, &factory));
        log.advance(PipelineStage::ArtifactsAcquired);

        let witness = step!(build_witness(artifacts.compiled(), &inputs));
        let public_inputs = witness.public().to_vec();
        log.advance(PipelineStage::WitnessBuilt);

        let proof = step!(prove(&artifacts, &factory, witness, &mut OsRng));
        log.advance(PipelineStage::Proved);

        let canonical = step!(encode_proof(&proof));
        step!(write_proof(&config.output, &canonical, config.format));
        log.advance(PipelineStage::Encoded);
        tracing::info!(
            operation = %kind,
            output = %config.output.display(),
            format = %config.format,
            "proof written"
        );

        let exported = if config.extract {
            let manifest = step!(export_artifacts(
                &config.export_dir,
                kind.artifact_name(),
                &artifacts
            ));
            log.advance(PipelineStage::Exported);
            tracing::info!(
                set = kind.artifact_name(),
                dir = %config.export_dir.display(),
                "exported artifact set"
            );
            Some(manifest)
        } else {
            None
        };
        log.advance(PipelineStage::Done);

        Ok(PipelineOutcome {
            kind,
            output: config.output.clone(),
            format: config.format,
            proof: canonical,
            public_signals: public_signals(&public_inputs),
            exported,
            stages: log.reached,
        })
    }

    /// In-memory variant of [`run`](Self::run) for embedders: no input file,
    /// no proof file, no export.
    pub fn prove_inputs<R: RngCore + CryptoRng>(
        &self,
        kind: OperationKind,
        inputs: &Inputs,
        rng: &mut R,
    ) -> PipelineResult<GeneratedProof> {
        let factory = self.registry.resolve(kind)?;
        check_shape(factory.layout(), inputs)?;
        let descriptor = CircuitDescriptor::from_factory(&factory, self.parameter_set.as_str());
        let artifacts = self.store.acquire(&descriptor, &factory)?;
        let witness = build_witness(artifacts.compiled(), inputs)?;
        let public_inputs = witness.public().to_vec();
        let proof = prove(&artifacts, &factory, witness, rng)?;
        let canonical = encode_proof(&proof)?;
        Ok(GeneratedProof {
            proof,
            canonical,
            public_inputs,
            artifacts,
        })
    }
}
