// eerc/eerc-prover/src/store.rs
// Numan Thabit 2025

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use once_cell::sync::OnceCell;

use eerc_circuit::CircuitFactory;
use eerc_common::{
    export::ArtifactPaths, export_artifacts, load_exported, CircuitArtifacts, CircuitDescriptor,
    PipelineError, PipelineResult,
};

use crate::{compile, KeygenEntropy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored,
    /// Another writer filled the slot first; its set is authoritative.
    AlreadyPresent,
    /// The backend does not persist.
    Skipped,
}

/// Stable storage for compiled artifact sets, one slot per descriptor.
pub trait ArtifactBackend: Send + Sync {
    /// `Ok(None)` for an empty slot, `KeyLoad` for an unreadable one.
    fn load(&self, descriptor: &CircuitDescriptor) -> PipelineResult<Option<CircuitArtifacts>>;

    fn persist(&self, artifacts: &CircuitArtifacts) -> PipelineResult<PersistOutcome>;

    fn discard(&self, descriptor: &CircuitDescriptor) -> PipelineResult<()>;
}

/// Keeps nothing between processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryOnly;

impl ArtifactBackend for MemoryOnly {
    fn load(&self, _descriptor: &CircuitDescriptor) -> PipelineResult<Option<CircuitArtifacts>> {
        Ok(None)
    }

    fn persist(&self, _artifacts: &CircuitArtifacts) -> PipelineResult<PersistOutcome> {
        Ok(PersistOutcome::Skipped)
    }

    fn discard(&self, _descriptor: &CircuitDescriptor) -> PipelineResult<()> {
        Ok(())
    }
}

/// Slots are directories `<root>/<cache_slot>/` holding an exported artifact
/// set named after the operation.
#[derive(Clone, Debug)]
pub struct FsArtifactBackend {
    root: PathBuf,
}

impl FsArtifactBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn slot_dir(&self, descriptor: &CircuitDescriptor) -> PathBuf {
        self.root.join(descriptor.cache_slot())
    }

    pub fn slot_paths(&self, descriptor: &CircuitDescriptor) -> ArtifactPaths {
        ArtifactPaths::new(&self.slot_dir(descriptor), descriptor.kind.artifact_name())
    }
}

impl ArtifactBackend for FsArtifactBackend {
    fn load(&self, descriptor: &CircuitDescriptor) -> PipelineResult<Option<CircuitArtifacts>> {
        let dir = self.slot_dir(descriptor);
        if !dir.exists() {
            return Ok(None);
        }
        // Slots appear by rename of a complete staging directory, so a slot
        // that exists but does not load is damaged, not half-written.
        load_exported(&dir, descriptor.kind.artifact_name(), descriptor).map(Some)
    }

    fn persist(&self, artifacts: &CircuitArtifacts) -> PipelineResult<PersistOutcome> {
        let descriptor = artifacts.descriptor();
        let dir = self.slot_dir(descriptor);
        if dir.exists() {
            return Ok(PersistOutcome::AlreadyPresent);
        }
        fs::create_dir_all(&self.root).map_err(|source| PipelineError::Write {
            path: self.root.clone(),
            source,
        })?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|source| PipelineError::Write {
                path: self.root.clone(),
                source,
            })?;
        export_artifacts(staging.path(), descriptor.kind.artifact_name(), artifacts)?;

        match fs::rename(staging.path(), &dir) {
            Ok(()) => Ok(PersistOutcome::Stored),
            Err(_) if dir.exists() => Ok(PersistOutcome::AlreadyPresent),
            Err(source) => Err(PipelineError::Write { path: dir, source }),
        }
    }

    fn discard(&self, descriptor: &CircuitDescriptor) -> PipelineResult<()> {
        let dir = self.slot_dir(descriptor);
        if !dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&dir).map_err(|err| {
            PipelineError::KeyLoad(format!("failed to discard {}: {err}", dir.display()))
        })
    }
}

/// What to do when a persisted set exists but cannot be loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorruptArtifactPolicy {
    /// Surface `KeyLoad`. Recompiling would mint keys a deployed verifier rejects.
    #[default]
    Fail,
    /// Discard the slot and compile again; the caller accepts new keys.
    Recompile,
}

#[derive(Clone, Copy, Debug)]
pub struct StorePolicy {
    pub persist_compiled: bool,
    pub on_corrupt: CorruptArtifactPolicy,
    pub entropy: KeygenEntropy,
    /// Ignore persisted sets and compile fresh ones, replacing them.
    pub force_recompile: bool,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            persist_compiled: true,
            on_corrupt: CorruptArtifactPolicy::Fail,
            entropy: KeygenEntropy::Os,
            force_recompile: false,
        }
    }
}

type Slot = Arc<OnceCell<Arc<CircuitArtifacts>>>;

/// Compile-or-load cache over an [`ArtifactBackend`].
///
/// At most one compilation runs per descriptor fingerprint; concurrent callers
/// for the same descriptor wait for it and share the result.
pub struct ArtifactStore<B = FsArtifactBackend> {
    backend: B,
    policy: StorePolicy,
    slots: Mutex<HashMap<String, Slot>>,
    compilations: AtomicUsize,
}

impl ArtifactStore<FsArtifactBackend> {
    pub fn filesystem(root: impl Into<PathBuf>, policy: StorePolicy) -> Self {
        Self::new(FsArtifactBackend::new(root), policy)
    }
}

impl ArtifactStore<MemoryOnly> {
    pub fn in_memory(entropy: KeygenEntropy) -> Self {
        Self::new(
            MemoryOnly,
            StorePolicy {
                persist_compiled: false,
                entropy,
                ..StorePolicy::default()
            },
        )
    }
}

impl<B: ArtifactBackend> ArtifactStore<B> {
    pub fn new(backend: B, policy: StorePolicy) -> Self {
        Self {
            backend,
            policy,
            slots: Mutex::new(HashMap::new()),
            compilations: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &StorePolicy {
        &self.policy
    }

    /// Number of compilations this store has run.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    pub fn acquire(
        &self,
        descriptor: &CircuitDescriptor,
        factory: &CircuitFactory,
    ) -> PipelineResult<Arc<CircuitArtifacts>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(descriptor.fingerprint()).or_default())
        };
        let artifacts = slot.get_or_try_init(|| self.load_or_compile(descriptor, factory))?;
        Ok(Arc::clone(artifacts))
    }

    /// Forget the in-process copy; the next `acquire` consults the backend again.
    pub fn invalidate(&self, descriptor: &CircuitDescriptor) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&descriptor.fingerprint());
    }

    fn load_or_compile(
        &self,
        descriptor: &CircuitDescriptor,
        factory: &CircuitFactory,
    ) -> PipelineResult<Arc<CircuitArtifacts>> {
        let slot = descriptor.cache_slot();
        if !self.policy.force_recompile {
            match self.backend.load(descriptor) {
                Ok(Some(artifacts)) => {
                    tracing::info!(slot = %slot, "artifact cache hit");
                    return Ok(Arc::new(artifacts));
                }
                Ok(None) => tracing::info!(slot = %slot, "artifact cache miss"),
                Err(err) => match self.policy.on_corrupt {
                    CorruptArtifactPolicy::Fail => {
                        tracing::error!(slot = %slot, error = %err, "persisted artifacts unusable");
                        return Err(err);
                    }
                    CorruptArtifactPolicy::Recompile => {
                        tracing::warn!(
                            slot = %slot,
                            error = %err,
                            "discarding unusable artifacts; new keys will not match previously deployed verifiers"
                        );
                        self.backend.discard(descriptor)?;
                    }
                },
            }
        } else {
            tracing::info!(slot = %slot, "forced recompilation");
        }

        let artifacts = compile(descriptor, factory, self.policy.entropy)?;
        self.compilations.fetch_add(1, Ordering::SeqCst);

        if self.policy.persist_compiled {
            if self.policy.force_recompile {
                if let Err(err) = self.backend.discard(descriptor) {
                    // The stale set is still in the slot; keep the fresh one in memory only.
                    tracing::warn!(
                        slot = %slot,
                        error = %err,
                        "failed to clear slot; recompiled artifacts not persisted"
                    );
                    return Ok(Arc::new(artifacts));
                }
            }
            match self.backend.persist(&artifacts) {
                Ok(PersistOutcome::Stored) => tracing::info!(slot = %slot, "persisted artifacts"),
                Ok(PersistOutcome::Skipped) => {}
                Ok(PersistOutcome::AlreadyPresent) => {
                    if let Some(existing) = self.backend.load(descriptor)? {
                        tracing::info!(slot = %slot, "slot filled concurrently; using persisted set");
                        return Ok(Arc::new(existing));
                    }
                }
                Err(err) => {
                    tracing::warn!(slot = %slot, error = %err, "failed to persist artifacts");
                }
            }
        }
        Ok(Arc::new(artifacts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eerc_circuit::{CircuitRegistry, OperationKind};
    use eerc_common::{FailureKind, DEFAULT_PARAMETER_SET};
    use std::thread;

    fn withdraw() -> (CircuitDescriptor, CircuitFactory) {
        let factory = CircuitRegistry::default()
            .resolve(OperationKind::Withdraw)
            .unwrap();
        (
            CircuitDescriptor::from_factory(&factory, DEFAULT_PARAMETER_SET),
            factory,
        )
    }

    fn seeded(seed: u64) -> StorePolicy {
        StorePolicy {
            entropy: KeygenEntropy::Seeded(seed),
            ..StorePolicy::default()
        }
    }

    #[test]
    fn repeated_acquire_shares_one_compilation() {
        let (descriptor, factory) = withdraw();
        let store = ArtifactStore::in_memory(KeygenEntropy::Seeded(1));
        let first = store.acquire(&descriptor, &factory).unwrap();
        let second = store.acquire(&descriptor, &factory).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.compilations(), 1);

        store.invalidate(&descriptor);
        store.acquire(&descriptor, &factory).unwrap();
        assert_eq!(store.compilations(), 2);
    }

    #[test]
    fn concurrent_requests_compile_once() {
        let (descriptor, factory) = withdraw();
        let store = Arc::new(ArtifactStore::in_memory(KeygenEntropy::Os));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let (descriptor, factory) = (descriptor.clone(), factory.clone());
                thread::spawn(move || store.acquire(&descriptor, &factory).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.compilations(), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn warm_filesystem_cache_skips_compilation() {
        let dir = tempfile::tempdir().unwrap();
        let (descriptor, factory) = withdraw();

        let cold = ArtifactStore::filesystem(dir.path(), seeded(3));
        let compiled = cold.acquire(&descriptor, &factory).unwrap();
        assert_eq!(cold.compilations(), 1);
        assert!(cold.backend().slot_paths(&descriptor).manifest.exists());

        // A different seed proves the keys come from disk, not a recompile.
        let warm = ArtifactStore::filesystem(dir.path(), seeded(4));
        let loaded = warm.acquire(&descriptor, &factory).unwrap();
        assert_eq!(warm.compilations(), 0);
        assert_eq!(loaded.verifying_key(), compiled.verifying_key());
    }

    #[test]
    fn corrupt_slot_fails_without_consent() {
        let dir = tempfile::tempdir().unwrap();
        let (descriptor, factory) = withdraw();
        let store = ArtifactStore::filesystem(dir.path(), seeded(5));
        store.acquire(&descriptor, &factory).unwrap();

        let pk_path = store.backend().slot_paths(&descriptor).pk;
        let mut bytes = fs::read(&pk_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&pk_path, bytes).unwrap();

        let strict = ArtifactStore::filesystem(dir.path(), seeded(5));
        let err = strict.acquire(&descriptor, &factory).unwrap_err();
        assert_eq!(err.kind(), FailureKind::KeyLoad);
        assert_eq!(strict.compilations(), 0);

        let lenient = ArtifactStore::filesystem(
            dir.path(),
            StorePolicy {
                on_corrupt: CorruptArtifactPolicy::Recompile,
                ..seeded(6)
            },
        );
        lenient.acquire(&descriptor, &factory).unwrap();
        assert_eq!(lenient.compilations(), 1);

        let reloaded = ArtifactStore::filesystem(dir.path(), seeded(5));
        reloaded.acquire(&descriptor, &factory).unwrap();
        assert_eq!(reloaded.compilations(), 0);
    }

    #[test]
    fn forced_recompile_replaces_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (descriptor, factory) = withdraw();
        let first = ArtifactStore::filesystem(dir.path(), seeded(7))
            .acquire(&descriptor, &factory)
            .unwrap();

        let forced = ArtifactStore::filesystem(
            dir.path(),
            StorePolicy {
                force_recompile: true,
                ..seeded(8)
            },
        );
        let replaced = forced.acquire(&descriptor, &factory).unwrap();
        assert_eq!(forced.compilations(), 1);
        assert_ne!(replaced.verifying_key(), first.verifying_key());

        let after = ArtifactStore::filesystem(dir.path(), seeded(9))
            .acquire(&descriptor, &factory)
            .unwrap();
        assert_eq!(after.verifying_key(), replaced.verifying_key());
    }

    /// Slot that accepts writes but can never be cleared.
    #[derive(Default)]
    struct PinnedSlot {
        persisted: AtomicUsize,
    }

    impl ArtifactBackend for PinnedSlot {
        fn load(&self, _descriptor: &CircuitDescriptor) -> PipelineResult<Option<CircuitArtifacts>> {
            Ok(None)
        }

        fn persist(&self, _artifacts: &CircuitArtifacts) -> PipelineResult<PersistOutcome> {
            self.persisted.fetch_add(1, Ordering::SeqCst);
            Ok(PersistOutcome::Stored)
        }

        fn discard(&self, _descriptor: &CircuitDescriptor) -> PipelineResult<()> {
            Err(PipelineError::Write {
                path: PathBuf::from("pinned"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only slot"),
            })
        }
    }

    #[test]
    fn forced_recompile_survives_a_slot_that_cannot_be_cleared() {
        let (descriptor, factory) = withdraw();
        let store = ArtifactStore::new(
            PinnedSlot::default(),
            StorePolicy {
                force_recompile: true,
                ..seeded(11)
            },
        );
        let artifacts = store.acquire(&descriptor, &factory).unwrap();
        assert_eq!(artifacts.descriptor(), &descriptor);
        assert_eq!(store.compilations(), 1);
        assert_eq!(store.backend().persisted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn distinct_parameter_sets_use_distinct_slots() {
        let dir = tempfile::tempdir().unwrap();
        let (descriptor, factory) = withdraw();
        let staging = CircuitDescriptor {
            parameter_set: "staging".into(),
            ..descriptor.clone()
        };
        let store = ArtifactStore::filesystem(dir.path(), seeded(10));
        store.acquire(&descriptor, &factory).unwrap();
        store.acquire(&staging, &factory).unwrap();
        assert_eq!(store.compilations(), 2);
        assert_ne!(
            store.backend().slot_dir(&descriptor),
            store.backend().slot_dir(&staging)
        );
    }
}
