// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Storage concerns used by the engine but owned by no single
// layer:
//
//   model_cache.rs — Trained-model cache
//                    Single build per (algorithm, data set)
//                    key within a run; optionally persisted
//                    to a directory and reused across runs
//                    while the training data is unchanged.
//
//   table_sink.rs  — CSV output
//                    Opens result files before the run starts
//                    and writes finished tables to them.

/// Content-addressed trained-model cache
pub mod model_cache;

/// CSV destinations for output tables
pub mod table_sink;

pub use model_cache::{CacheError, CacheStats, ModelCache, ModelCacheEntry};
pub use table_sink::{OutputSinks, TableSink};
