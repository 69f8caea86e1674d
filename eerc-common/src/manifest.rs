use std::{
    fs,
    path::{Path, PathBuf},
};

use ark_bn254::Bn254;
use ark_groth16::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::{
    artifacts::{
        deserialize_constraint_system, deserialize_proving_key, deserialize_verifying_key,
        CircuitArtifacts,
    },
    descriptor::CircuitDescriptor,
    error::{PipelineError, PipelineResult},
    hash_bytes_hex,
    io::write_atomic,
};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub blake3: String,
    pub size: u64,
}

impl ArtifactFile {
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            blake3: hash_bytes_hex(bytes),
            size: bytes.len() as u64,
        }
    }

    fn resolve_path(&self, base_dir: &Path) -> PipelineResult<PathBuf> {
        // Entries are bare file names next to the manifest.
        let bare = Path::new(&self.path)
            .file_name()
            .is_some_and(|name| name == self.path.as_str());
        if !bare {
            return Err(PipelineError::KeyLoad(format!(
                "manifest entry '{}' is not a plain file name",
                self.path
            )));
        }
        Ok(base_dir.join(&self.path))
    }
}

/// How the key pair's setup randomness was obtained. The seed itself is never recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeygenLabel {
    Os,
    Seeded,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub manifest_version: u32,
    pub descriptor: CircuitDescriptor,
    pub fingerprint: String,
    pub keygen: KeygenLabel,
    pub created_at_unix: u64,
    pub constraint_system: ArtifactFile,
    pub pk: ArtifactFile,
    pub vk: ArtifactFile,
}

pub fn write_manifest(path: impl AsRef<Path>, manifest: &ArtifactManifest) -> PipelineResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(manifest)
        .map_err(|err| PipelineError::Export(format!("failed to serialize manifest: {err}")))?;
    write_atomic(path, &json).map_err(|err| {
        PipelineError::Export(format!("failed to write manifest {}: {err}", path.display()))
    })
}

pub fn read_manifest(path: impl AsRef<Path>) -> PipelineResult<ArtifactManifest> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| {
        PipelineError::KeyLoad(format!("failed to read manifest {}: {err}", path.display()))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::KeyLoad(format!("failed to parse manifest json: {err}")))
}

/// Load and verify a complete artifact set. When `expected` is given the
/// manifest must describe exactly that circuit.
pub fn load_artifacts(
    manifest_path: impl AsRef<Path>,
    expected: Option<&CircuitDescriptor>,
) -> PipelineResult<(ArtifactManifest, CircuitArtifacts)> {
    let manifest_path = manifest_path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest, expected)?;
    let base_dir = manifest_dir(manifest_path);

    let cs_bytes = read_artifact_file(&base_dir, &manifest.constraint_system, "constraint system")?;
    let pk_bytes = read_artifact_file(&base_dir, &manifest.pk, "proving key")?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;

    let compiled = deserialize_constraint_system(&cs_bytes)
        .map_err(|err| PipelineError::KeyLoad(format!("constraint system: {err}")))?;
    let pk = deserialize_proving_key(&pk_bytes)
        .map_err(|err| PipelineError::KeyLoad(format!("proving key: {err}")))?;
    let vk = deserialize_verifying_key(&vk_bytes)
        .map_err(|err| PipelineError::KeyLoad(format!("verifying key: {err}")))?;

    let artifacts =
        CircuitArtifacts::pair(manifest.descriptor.clone(), compiled, pk, vk, manifest.keygen)
            .map_err(|err| PipelineError::KeyLoad(err.to_string()))?;
    Ok((manifest, artifacts))
}

/// Verifier-side load: only the verifying key is read.
pub fn load_verifying_key(
    manifest_path: impl AsRef<Path>,
) -> PipelineResult<(ArtifactManifest, VerifyingKey<Bn254>)> {
    let manifest_path = manifest_path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest, None)?;
    let vk_bytes = read_artifact_file(&manifest_dir(manifest_path), &manifest.vk, "verifying key")?;
    let vk = deserialize_verifying_key(&vk_bytes)
        .map_err(|err| PipelineError::KeyLoad(format!("verifying key: {err}")))?;
    if vk.gamma_abc_g1.len() != manifest.descriptor.layout.public + 1 {
        return Err(PipelineError::KeyLoad(format!(
            "verifying key accepts {} public inputs, manifest declares {}",
            vk.gamma_abc_g1.len().saturating_sub(1),
            manifest.descriptor.layout.public
        )));
    }
    Ok((manifest, vk))
}

fn read_artifact_file(
    base_dir: &Path,
    entry: &ArtifactFile,
    label: &str,
) -> PipelineResult<Vec<u8>> {
    let path = entry.resolve_path(base_dir)?;
    let bytes = fs::read(&path).map_err(|err| {
        PipelineError::KeyLoad(format!("failed to read {label} at {}: {err}", path.display()))
    })?;
    if bytes.len() as u64 != entry.size {
        return Err(PipelineError::KeyLoad(format!(
            "{label} size mismatch, manifest recorded {} bytes but found {}",
            entry.size,
            bytes.len()
        )));
    }
    let actual = hash_bytes_hex(&bytes);
    if actual != entry.blake3 {
        return Err(PipelineError::KeyLoad(format!(
            "{label} hash mismatch, expected {} but computed {actual}",
            entry.blake3
        )));
    }
    Ok(bytes)
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn ensure_manifest_compat(
    manifest: &ArtifactManifest,
    expected: Option<&CircuitDescriptor>,
) -> PipelineResult<()> {
    if manifest.manifest_version != MANIFEST_VERSION {
        return Err(PipelineError::KeyLoad(format!(
            "unsupported manifest version {}, expected {MANIFEST_VERSION}",
            manifest.manifest_version
        )));
    }
    if manifest.fingerprint != manifest.descriptor.fingerprint() {
        return Err(PipelineError::KeyLoad(
            "manifest fingerprint does not match its descriptor".into(),
        ));
    }
    if let Some(expected) = expected {
        if manifest.descriptor != *expected {
            return Err(PipelineError::KeyLoad(format!(
                "artifact set was built for {} (fingerprint {}), requested {}",
                manifest.descriptor.cache_slot(),
                manifest.fingerprint,
                expected.cache_slot()
            )));
        }
    }
    Ok(())
}
