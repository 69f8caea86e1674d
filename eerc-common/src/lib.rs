//! Shared types for the confidential-token proving pipeline: inputs, artifact
//! sets and their on-disk formats, witness assignment and the proof codec.

pub mod artifacts;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod field;
pub mod inputs;
pub mod io;
pub mod manifest;
pub mod witness;

pub use artifacts::{CircuitArtifacts, CompiledCircuit, PairingError};
pub use codec::{decode_proof, encode_proof, CanonicalProofBytes, ProofFormat, PROOF_BYTES};
pub use descriptor::{CircuitDescriptor, DEFAULT_PARAMETER_SET};
pub use error::{FailureKind, InputSection, PipelineError, PipelineResult};
pub use export::{export_artifacts, load_exported};
pub use inputs::{read_inputs, InputValue, Inputs};
pub use manifest::{ArtifactFile, ArtifactManifest, KeygenLabel, MANIFEST_VERSION};
pub use witness::{build_witness, check_shape, Witness};

pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
