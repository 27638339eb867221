// ============================================================
// Layer 3 — Core Traits (Capabilities)
// ============================================================
// The narrow interfaces through which the engine consumes the
// pluggable parts of an experiment. The engine never branches
// on a concrete implementation:
//
//   RatingSource  → a train or test partition
//   Algorithm     → builds (and reloads) a TrainedModel
//   TrainedModel  → scores user/item pairs, serialises itself
//   EvalTask      → measures a TrainedModel on a DataSet
//
// Collaborator errors are reported through anyhow so the
// original error chain reaches the failure log untouched.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::data_set::DataSet;
use crate::domain::rating::Rating;
use crate::domain::result::TaskOutput;

/// Shared handle to a trained model, handed out by the model cache.
pub type ModelHandle = Arc<dyn TrainedModel>;

// ─── RatingSource ─────────────────────────────────────────────────────────────
/// One partition of rating data.
///
/// Implementations:
///   - InMemoryRatings → ratings held in memory (crossfold output)
///   - CsvRatingSource → a delimited ratings file read on demand
pub trait RatingSource: Send + Sync + fmt::Debug {
    /// Load every rating in this partition.
    fn ratings(&self) -> Result<Arc<Vec<Rating>>>;

    /// Content fingerprint; changes whenever the ratings change.
    fn fingerprint(&self) -> Result<String>;
}

// ─── TrainedModel ─────────────────────────────────────────────────────────────
/// A model produced by an [`Algorithm`] for one data set.
pub trait TrainedModel: Send + Sync {
    /// Predicted preference of `user` for `item`, or `None` when the
    /// model cannot score the pair.
    fn predict(&self, user: u64, item: u64) -> Option<f64>;

    /// Serialise the model for the persistent model cache.
    /// The matching decoder is [`Algorithm::load`].
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

// ─── Algorithm ────────────────────────────────────────────────────────────────
/// Builds trained models from the training partition of a data set.
///
/// Implementations live in `ml::baselines` and `ml::item_knn`;
/// tests plug in counting and failing fakes.
pub trait Algorithm: Send + Sync {
    /// Train a model on `data`'s training partition.
    fn build(&self, data: &DataSet) -> Result<ModelHandle>;

    /// Rebuild a model from bytes written by [`TrainedModel::to_bytes`].
    fn load(&self, bytes: &[u8]) -> Result<ModelHandle>;
}

// ─── EvalTask ─────────────────────────────────────────────────────────────────
/// One evaluation applied to every (algorithm, data set) pair.
///
/// Metric columns are declared up front so that name collisions
/// between tasks are rejected before anything runs.
pub trait EvalTask: Send + Sync {
    /// Task label used in logs and failure records.
    fn name(&self) -> &str;

    /// Global metric columns this task may report.
    fn metric_columns(&self) -> Vec<String>;

    /// Per-entity metric columns this task may report; empty when the
    /// task produces no entity-level output.
    fn entity_metric_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Measure `model` against `data`'s test partition.
    fn evaluate(&self, model: &dyn TrainedModel, data: &DataSet) -> Result<TaskOutput>;
}
