use std::path::{Path, PathBuf};

use crate::{
    artifacts::{serialize_constraint_system, serialize_proving_key, serialize_verifying_key},
    current_unix_timestamp,
    descriptor::CircuitDescriptor,
    error::{PipelineError, PipelineResult},
    io::write_atomic,
    manifest::{load_artifacts, write_manifest, ArtifactFile, ArtifactManifest, MANIFEST_VERSION},
    CircuitArtifacts,
};

/// File locations of the artifact set `name` inside `dir`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub constraint_system: PathBuf,
    pub pk: PathBuf,
    pub vk: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            constraint_system: dir.join(format!("{name}.ccs")),
            pk: dir.join(format!("{name}.pk")),
            vk: dir.join(format!("{name}.vk")),
            manifest: dir.join(format!("{name}.manifest.json")),
        }
    }
}

fn ensure_set_name(name: &str) -> PipelineResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Export(format!("invalid artifact set name '{name}'")))
    }
}

/// Write the constraint system, both keys and a manifest under `name`,
/// replacing any earlier set of that name. The manifest goes last so a set
/// interrupted halfway never verifies against it.
pub fn export_artifacts(
    dir: impl AsRef<Path>,
    name: &str,
    artifacts: &CircuitArtifacts,
) -> PipelineResult<ArtifactManifest> {
    ensure_set_name(name)?;
    let dir = dir.as_ref();
    let paths = ArtifactPaths::new(dir, name);
    let export_err = |what: &str, err: String| PipelineError::Export(format!("{what}: {err}"));

    let cs_bytes = serialize_constraint_system(artifacts.compiled())
        .map_err(|err| export_err("constraint system", err.to_string()))?;
    let pk_bytes = serialize_proving_key(artifacts.proving_key())
        .map_err(|err| export_err("proving key", err.to_string()))?;
    let vk_bytes = serialize_verifying_key(artifacts.verifying_key())
        .map_err(|err| export_err("verifying key", err.to_string()))?;

    for (path, bytes) in [
        (&paths.constraint_system, &cs_bytes),
        (&paths.pk, &pk_bytes),
        (&paths.vk, &vk_bytes),
    ] {
        write_atomic(path, bytes)
            .map_err(|err| export_err(&path.display().to_string(), err.to_string()))?;
    }

    let manifest = ArtifactManifest {
        manifest_version: MANIFEST_VERSION,
        descriptor: artifacts.descriptor().clone(),
        fingerprint: artifacts.fingerprint(),
        keygen: artifacts.keygen(),
        created_at_unix: current_unix_timestamp(),
        constraint_system: ArtifactFile::from_bytes(file_name(&paths.constraint_system), &cs_bytes),
        pk: ArtifactFile::from_bytes(file_name(&paths.pk), &pk_bytes),
        vk: ArtifactFile::from_bytes(file_name(&paths.vk), &vk_bytes),
    };
    write_manifest(&paths.manifest, &manifest)?;
    Ok(manifest)
}

/// Read back a set written by [`export_artifacts`], requiring it to match `descriptor`.
pub fn load_exported(
    dir: impl AsRef<Path>,
    name: &str,
    descriptor: &CircuitDescriptor,
) -> PipelineResult<CircuitArtifacts> {
    ensure_set_name(name).map_err(|err| PipelineError::KeyLoad(err.to_string()))?;
    let paths = ArtifactPaths::new(dir.as_ref(), name);
    let (_, artifacts) = load_artifacts(&paths.manifest, Some(descriptor))?;
    Ok(artifacts)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
