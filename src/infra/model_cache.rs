// ============================================================
// Layer 6 — Model Cache
// ============================================================
// Maps CacheKey → trained model so each (algorithm, data set)
// pair is trained at most once, however many tasks use it.
//
// In-process, every key owns a Slot:
//
//   Building ──▶ Ready(model)     kept for the rest of the run
//       └──────▶ Failed(error)    slot removed; next caller retries
//
// The first caller for a key becomes the builder; everyone else
// blocks on the slot's condvar and receives the same model (or
// the same failure).
//
// With a cache directory configured, each entry is persisted as
// two files written atomically (temp file + rename):
//
//   <key>.model  ← bytes from TrainedModel::to_bytes
//   <key>.json   ← ModelCacheEntry (freshness marker, artifact)
//
// An entry whose freshness marker does not match, or whose
// artifact fails to load, is stale and replaced wholesale.

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::domain::traits::{Algorithm, ModelHandle};
use crate::domain::work_unit::CacheKey;

/// Why a model could not be produced.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The build function (or model serialisation) failed. Not cached.
    #[error("model build failed: {0:#}")]
    Build(Arc<anyhow::Error>),

    /// The cache directory could not be written.
    #[error("model cache storage failure at '{}': {source}", path.display())]
    Storage {
        path:   PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

/// Metadata persisted next to each model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCacheEntry {
    pub key:       String,
    pub freshness: String,
    pub artifact:  String,
    pub bytes:     u64,
}

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Models trained by a build function.
    pub builds: usize,
    /// Requests answered from an in-process entry.
    pub hits:   usize,
    /// Requests answered by loading a persisted entry.
    pub loads:  usize,
}

enum SlotState {
    Building,
    Ready(ModelHandle),
    Failed(CacheError),
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn building() -> Self {
        Self {
            state: Mutex::new(SlotState::Building),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, state: SlotState) {
        *self.state.lock() = state;
        self.ready.notify_all();
    }
}

/// Content-addressed store of trained models with a
/// single-build-per-key guarantee.
pub struct ModelCache {
    dir:    Option<PathBuf>,
    slots:  Mutex<HashMap<CacheKey, Arc<Slot>>>,
    builds: AtomicUsize,
    hits:   AtomicUsize,
    loads:  AtomicUsize,
}

impl ModelCache {
    /// Process-local memoisation for the current run only.
    pub fn in_memory() -> Self {
        Self {
            dir:    None,
            slots:  Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
            hits:   AtomicUsize::new(0),
            loads:  AtomicUsize::new(0),
        }
    }

    /// Cache persisted under `dir`, created if missing.
    ///
    /// Fails when the directory cannot be created or written to.
    pub fn persistent(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        // Probe: the directory must accept new files
        NamedTempFile::new_in(&dir)?;

        tracing::info!("Model cache directory: '{}'", dir.display());
        Ok(Self {
            dir: Some(dir),
            ..Self::in_memory()
        })
    }

    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            builds: self.builds.load(Ordering::Relaxed),
            hits:   self.hits.load(Ordering::Relaxed),
            loads:  self.loads.load(Ordering::Relaxed),
        }
    }

    /// Return the model for `key`, building it with `build` when no
    /// valid entry exists.
    ///
    /// `freshness` is compared against a persisted entry's marker;
    /// `algorithm` decodes persisted artifacts. Concurrent callers for
    /// the same key share a single invocation of `build`.
    pub fn get_or_build<F>(
        &self,
        key:       &CacheKey,
        freshness: &str,
        algorithm: &dyn Algorithm,
        build:     F,
    ) -> Result<ModelHandle, CacheError>
    where
        F: FnOnce() -> anyhow::Result<ModelHandle>,
    {
        let (slot, owner) = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot::building());
                    slots.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !owner {
            return self.wait(key, &slot);
        }

        let outcome = self.resolve(key, freshness, algorithm, build);
        match &outcome {
            Ok(model) => slot.finish(SlotState::Ready(Arc::clone(model))),
            Err(err) => {
                // Unpublish first so later callers start a fresh build
                self.slots.lock().remove(key);
                slot.finish(SlotState::Failed(err.clone()));
            }
        }
        outcome
    }

    fn wait(&self, key: &CacheKey, slot: &Slot) -> Result<ModelHandle, CacheError> {
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Building => slot.ready.wait(&mut state),
                SlotState::Ready(model) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Model cache hit for {}", key);
                    return Ok(Arc::clone(model));
                }
                SlotState::Failed(err) => return Err(err.clone()),
            }
        }
    }

    fn resolve<F>(
        &self,
        key:       &CacheKey,
        freshness: &str,
        algorithm: &dyn Algorithm,
        build:     F,
    ) -> Result<ModelHandle, CacheError>
    where
        F: FnOnce() -> anyhow::Result<ModelHandle>,
    {
        if let Some(dir) = &self.dir {
            match read_entry(dir, key, freshness, algorithm) {
                Ok(Some(model)) => {
                    self.loads.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("Loaded cached model {} from disk", key);
                    return Ok(model);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!("Discarding unreadable cache entry {}: {:#}", key, err),
            }
        }

        let started = Instant::now();
        let model = guarded("model build", build).map_err(|e| CacheError::Build(Arc::new(e)))?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Built model {} in {:?}", key, started.elapsed());

        if let Some(dir) = &self.dir {
            write_entry(dir, key, freshness, &model)?;
        }

        Ok(model)
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────────

fn entry_path(dir: &Path, key: &CacheKey) -> PathBuf {
    dir.join(format!("{}.json", key.as_str()))
}

/// Load a persisted entry if one exists and is fresh.
fn read_entry(
    dir:       &Path,
    key:       &CacheKey,
    freshness: &str,
    algorithm: &dyn Algorithm,
) -> anyhow::Result<Option<ModelHandle>> {
    let meta_path = entry_path(dir, key);
    if !meta_path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(&meta_path)
        .with_context(|| format!("Cannot read '{}'", meta_path.display()))?;
    let entry: ModelCacheEntry = serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse '{}'", meta_path.display()))?;

    if entry.key != key.as_str() || entry.freshness != freshness {
        tracing::info!("Cache entry {} is stale; rebuilding", key);
        return Ok(None);
    }

    let artifact = dir.join(&entry.artifact);
    let bytes = fs::read(&artifact)
        .with_context(|| format!("Cannot read artifact '{}'", artifact.display()))?;
    let model = guarded("model load", || algorithm.load(&bytes))?;
    Ok(Some(model))
}

/// Persist a freshly built model; the metadata file is written last
/// so a half-written entry is never considered valid.
fn write_entry(
    dir:       &Path,
    key:       &CacheKey,
    freshness: &str,
    model:     &ModelHandle,
) -> Result<(), CacheError> {
    let bytes = guarded("model serialisation", || model.to_bytes())
        .map_err(|e| CacheError::Build(Arc::new(e)))?;

    let artifact = format!("{}.model", key.as_str());
    write_atomic(&dir.join(&artifact), &bytes)?;

    let entry = ModelCacheEntry {
        key:       key.as_str().to_string(),
        freshness: freshness.to_string(),
        artifact,
        bytes:     bytes.len() as u64,
    };
    let meta_path = entry_path(dir, key);
    let json = serde_json::to_vec_pretty(&entry).map_err(|e| storage_error(&meta_path, e.into()))?;
    write_atomic(&meta_path, &json)?;

    tracing::debug!("Persisted model {} ({} bytes)", key, entry.bytes);
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage_error(path, e))?;
    tmp.write_all(bytes).map_err(|e| storage_error(path, e))?;
    tmp.persist(path).map_err(|e| storage_error(path, e.error))?;
    Ok(())
}

fn storage_error(path: &Path, source: io::Error) -> CacheError {
    CacheError::Storage {
        path:   path.to_path_buf(),
        source: Arc::new(source),
    }
}

// ─── Panic isolation ──────────────────────────────────────────────────────────

/// Run a collaborator callback, turning a panic into an error.
pub(crate) fn guarded<T>(what: &str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("{what} panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
