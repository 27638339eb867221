// ============================================================
// Layer 3 — Results
// ============================================================
// What flows out of a WorkUnit and into the aggregator:
//
//   TaskOutput    → ordered global metrics + optional per-entity rows
//   UnitResult    → a TaskOutput or a classified FailureRecord,
//                   tagged with the unit's canonical position
//   ExperimentResult → the finished tables plus the failure log

use std::fmt;

use serde::Serialize;

use crate::domain::table::OutputTable;

// ─── Metrics ──────────────────────────────────────────────────────────────────
/// Ordered set of named numeric values. Names are unique; inserting
/// an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics(Vec<(String, f64)>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut metrics = Metrics::new();
        for (name, value) in iter {
            metrics.insert(name, value);
        }
        metrics
    }
}

/// Metrics for one entity (e.g. one user).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMetrics {
    pub entity:  String,
    pub metrics: Metrics,
}

impl EntityMetrics {
    pub fn new(entity: impl Into<String>, metrics: Metrics) -> Self {
        Self { entity: entity.into(), metrics }
    }
}

/// Everything an evaluation task reports for one WorkUnit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    pub metrics:  Metrics,
    pub entities: Option<Vec<EntityMetrics>>,
}

impl TaskOutput {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics, entities: None }
    }

    pub fn with_entities(mut self, entities: Vec<EntityMetrics>) -> Self {
        self.entities = Some(entities);
        self
    }
}

// ─── Failures ─────────────────────────────────────────────────────────────────
/// Classification of a per-unit failure. Fatal conditions are never
/// recorded here; they surface as `ExperimentError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The algorithm could not be trained on the data set.
    ModelBuildFailure,
    /// The task failed against an otherwise valid model.
    TaskEvaluationFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ModelBuildFailure => write!(f, "ModelBuildFailure"),
            FailureKind::TaskEvaluationFailure => write!(f, "TaskEvaluationFailure"),
        }
    }
}

/// One entry of the failure log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub algorithm: String,
    pub data_set:  String,
    pub task:      String,
    pub kind:      FailureKind,
    pub message:   String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}/{}/{}: {}",
            self.kind, self.data_set, self.algorithm, self.task, self.message
        )
    }
}

// ─── UnitResult ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Completed(TaskOutput),
    Failed(FailureRecord),
}

/// Outcome of exactly one WorkUnit.
#[derive(Debug, Clone)]
pub struct UnitResult {
    /// Canonical index of the unit.
    pub unit:       usize,
    /// Canonical index of the unit's (data set, algorithm) pair.
    pub pair:       usize,
    /// Position of the unit's task in the task list.
    pub task_index: usize,
    pub outcome:    UnitOutcome,
}

impl UnitResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed(_))
    }
}

// ─── ExperimentResult ─────────────────────────────────────────────────────────
/// Counts describing how a run went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub units:        usize,
    pub completed:    usize,
    pub failed:       usize,
    pub cancelled:    usize,
    /// Models trained during this run.
    pub model_builds: usize,
    /// Model requests served from memory or from the cache directory.
    pub cache_hits:   usize,
}

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// One row per (data set, algorithm) pair, in canonical order.
    pub global:     OutputTable,
    /// Per-entity rows, present when at least one task reports them.
    pub per_entity: Option<OutputTable>,
    /// Failed units, in canonical order.
    pub failures:   Vec<FailureRecord>,
    pub summary:    RunSummary,
}

impl ExperimentResult {
    /// True when every unit completed without failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_keep_insertion_order_and_replace_in_place() {
        let mut m = Metrics::new().with("RMSE", 0.9).with("MAE", 0.7);
        m.insert("RMSE", 0.8);
        let names: Vec<&str> = m.names().collect();
        assert_eq!(names, vec!["RMSE", "MAE"]);
        assert_eq!(m.get("RMSE"), Some(0.8));
        assert_eq!(m.get("nDCG"), None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn metrics_collect_from_pairs() {
        let m: Metrics = vec![("a", 1.0), ("b", 2.0), ("a", 3.0)].into_iter().collect();
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![("a", 3.0), ("b", 2.0)]);
    }

    #[test]
    fn failure_record_display_names_the_unit() {
        let record = FailureRecord {
            algorithm: "ItemKNN".into(),
            data_set:  "ML100K-fold1".into(),
            task:      "predict".into(),
            kind:      FailureKind::ModelBuildFailure,
            message:   "no training ratings".into(),
        };
        assert_eq!(
            record.to_string(),
            "ModelBuildFailure on ML100K-fold1/ItemKNN/predict: no training ratings"
        );
    }
}
