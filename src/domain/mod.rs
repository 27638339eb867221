// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define what an
// experiment IS: algorithm instances, data sets, evaluation
// tasks, the work units built from them, and the results and
// tables they produce.
//
// Rules for this layer:
//   - NO file or network I/O
//   - NO knowledge of how work is scheduled
//   - Only value types, capability traits and hashing helpers
//
// The engine (Layer 5) and the built-in providers (Layers 4
// and 5b) both program against the traits defined here.

/// A single observed user → item rating
pub mod rating;

/// Stable SHA-256 fingerprints for configuration and data identity
pub mod fingerprint;

/// Capability traits implemented by external collaborators
pub mod traits;

/// A named, fingerprinted algorithm configuration
pub mod algorithm;

/// A named train/test pair of rating partitions
pub mod data_set;

/// WorkUnits, CacheKeys and the canonical work-matrix enumeration
pub mod work_unit;

/// Metrics, unit results and failure records
pub mod result;

/// Finalised tabular output
pub mod table;

/// Top-level error taxonomy
pub mod error;

pub use algorithm::AlgorithmInstance;
pub use data_set::DataSet;
pub use error::ExperimentError;
pub use rating::Rating;
pub use result::{
    EntityMetrics, ExperimentResult, FailureKind, FailureRecord, Metrics, RunSummary, TaskOutput,
    UnitOutcome, UnitResult,
};
pub use table::{Cell, OutputTable, TableBuilder};
pub use traits::{Algorithm, EvalTask, ModelHandle, RatingSource, TrainedModel};
pub use work_unit::{CacheKey, WorkUnit};
