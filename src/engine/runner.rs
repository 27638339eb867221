// ============================================================
// Layer 5 — Task Runner
// ============================================================
// Executes exactly one WorkUnit:
//
//   1. obtain the trained model from the ModelCache
//      (built on a miss, shared with concurrent callers)
//   2. run the EvalTask against the model and the test data
//   3. check the task only reported metrics it declared
//
// Failures of the external collaborators are contained here and
// become a FailureRecord on the unit's UnitResult:
//
//   build error / panic        → ModelBuildFailure
//   evaluate error / panic     → TaskEvaluationFailure
//   undeclared metric reported → TaskEvaluationFailure
//
// Only an unwritable cache directory escapes as an Err, since it
// would fail every remaining unit the same way.

use std::time::Instant;

use crate::domain::error::ExperimentError;
use crate::domain::result::{FailureKind, FailureRecord, TaskOutput, UnitOutcome, UnitResult};
use crate::domain::work_unit::WorkUnit;
use crate::infra::model_cache::{guarded, CacheError, ModelCache};

/// Runs WorkUnits against a shared model cache.
pub struct TaskRunner<'a> {
    cache: &'a ModelCache,
}

impl<'a> TaskRunner<'a> {
    pub fn new(cache: &'a ModelCache) -> Self {
        Self { cache }
    }

    pub fn execute(&self, unit: &WorkUnit) -> Result<UnitResult, ExperimentError> {
        let started = Instant::now();
        let algorithm = unit.algorithm();
        let data_set  = unit.data_set();

        // ── Step 1: Model ─────────────────────────────────────────────────────
        // Freshness only matters for entries that outlive the run
        let freshness = if self.cache.is_persistent() {
            match data_set.training_fingerprint() {
                Ok(fingerprint) => fingerprint,
                Err(err) => {
                    return Ok(failed(unit, FailureKind::ModelBuildFailure, format!("{err:#}")));
                }
            }
        } else {
            String::new()
        };

        let model = match self.cache.get_or_build(
            unit.cache_key(),
            &freshness,
            algorithm.algorithm(),
            || algorithm.algorithm().build(data_set),
        ) {
            Ok(model) => model,
            Err(CacheError::Build(err)) => {
                tracing::warn!("Model build failed for {}: {:#}", unit, err);
                return Ok(failed(unit, FailureKind::ModelBuildFailure, format!("{err:#}")));
            }
            Err(CacheError::Storage { path, source }) => {
                return Err(ExperimentError::path("write model cache entry", &path, source));
            }
        };

        // ── Step 2: Evaluate ──────────────────────────────────────────────────
        let task = unit.task();
        let output = match guarded("task evaluation", || task.evaluate(model.as_ref(), data_set)) {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!("Evaluation failed for {}: {:#}", unit, err);
                return Ok(failed(unit, FailureKind::TaskEvaluationFailure, format!("{err:#}")));
            }
        };

        // ── Step 3: Declared metrics only ─────────────────────────────────────
        if let Some(message) = undeclared_metric(unit, &output) {
            tracing::warn!("Rejected output of {}: {}", unit, message);
            return Ok(failed(unit, FailureKind::TaskEvaluationFailure, message));
        }

        tracing::debug!("Completed {} in {:?}", unit, started.elapsed());
        Ok(UnitResult {
            unit:       unit.index(),
            pair:       unit.pair(),
            task_index: unit.task_index(),
            outcome:    UnitOutcome::Completed(output),
        })
    }
}

fn undeclared_metric(unit: &WorkUnit, output: &TaskOutput) -> Option<String> {
    let task = unit.task();

    let declared = task.metric_columns();
    if let Some(name) = output.metrics.names().find(|n| !declared.iter().any(|d| d == n)) {
        return Some(format!("task '{}' reported undeclared metric '{}'", task.name(), name));
    }

    let declared = task.entity_metric_columns();
    let entity_metrics = output.entities.iter().flatten().flat_map(|e| e.metrics.names());
    for name in entity_metrics {
        if !declared.iter().any(|d| d == name) {
            return Some(format!(
                "task '{}' reported undeclared entity metric '{}'",
                task.name(),
                name
            ));
        }
    }

    None
}

fn failed(unit: &WorkUnit, kind: FailureKind, message: String) -> UnitResult {
    UnitResult {
        unit:       unit.index(),
        pair:       unit.pair(),
        task_index: unit.task_index(),
        outcome:    UnitOutcome::Failed(FailureRecord {
            algorithm: unit.algorithm().name().to_string(),
            data_set:  unit.data_set().name().to_string(),
            task:      unit.task().name().to_string(),
            kind,
            message,
        }),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::algorithm::AlgorithmInstance;
    use crate::domain::traits::EvalTask;
    use crate::domain::work_unit::enumerate;
    use crate::test_utils::{algorithm, data_set, CountingAlgorithm, ScriptedTask};
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;

    fn single_unit(algorithm: Arc<AlgorithmInstance>, task: ScriptedTask) -> WorkUnit {
        let tasks: Vec<Arc<dyn EvalTask>> = vec![Arc::new(task)];
        enumerate(&[algorithm], &[data_set("d1")], &tasks).remove(0)
    }

    fn failure(result: &UnitResult) -> &FailureRecord {
        match &result.outcome {
            UnitOutcome::Failed(record) => record,
            UnitOutcome::Completed(_) => panic!("expected a failure"),
        }
    }

    #[test]
    fn completed_unit_carries_the_task_output() {
        let cache = ModelCache::in_memory();
        let unit = single_unit(algorithm("a1", 0.25), ScriptedTask::new("t", "RMSE"));

        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        match result.outcome {
            UnitOutcome::Completed(output) => assert_eq!(output.metrics.get("RMSE"), Some(0.25)),
            UnitOutcome::Failed(f) => panic!("unexpected failure: {f}"),
        }
    }

    #[test]
    fn build_errors_become_model_build_failures() {
        let cache = ModelCache::in_memory();
        let failing = Arc::new(AlgorithmInstance::new(
            "broken",
            json!({"fake": "broken"}),
            Arc::new(CountingAlgorithm::new(1.0).failing_on("d1")),
        ));
        let unit = single_unit(failing, ScriptedTask::new("t", "RMSE"));

        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        let record = failure(&result);
        assert_eq!(record.kind, FailureKind::ModelBuildFailure);
        assert_eq!(record.algorithm, "broken");
        assert_eq!(record.data_set, "d1");
        assert!(record.message.contains("d1"));
    }

    #[test]
    fn build_panics_are_contained() {
        let cache = ModelCache::in_memory();
        let panicking = Arc::new(AlgorithmInstance::new(
            "explodes",
            json!({"fake": "explodes"}),
            Arc::new(CountingAlgorithm::new(1.0).panicking_on("d1")),
        ));
        let unit = single_unit(panicking, ScriptedTask::new("t", "RMSE"));

        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        assert_eq!(failure(&result).kind, FailureKind::ModelBuildFailure);
        assert!(failure(&result).message.contains("panicked"));
    }

    #[test]
    fn evaluation_errors_and_panics_become_task_failures() {
        let cache = ModelCache::in_memory();

        let unit = single_unit(algorithm("a1", 1.0), ScriptedTask::new("t", "RMSE").failing_on("d1"));
        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        assert_eq!(failure(&result).kind, FailureKind::TaskEvaluationFailure);

        let unit = single_unit(algorithm("a1", 1.0), ScriptedTask::new("t", "RMSE").panicking_on("d1"));
        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        assert_eq!(failure(&result).kind, FailureKind::TaskEvaluationFailure);
        assert!(failure(&result).message.contains("panicked"));
    }

    #[test]
    fn undeclared_metrics_fail_the_unit() {
        let cache = ModelCache::in_memory();
        let unit = single_unit(
            algorithm("a1", 1.0),
            ScriptedTask::new("t", "RMSE").reporting_undeclared("Surprise"),
        );

        let result = TaskRunner::new(&cache).execute(&unit).unwrap();
        assert_eq!(failure(&result).kind, FailureKind::TaskEvaluationFailure);
        assert!(failure(&result).message.contains("Surprise"));
    }

    #[test]
    fn unwritable_cache_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let cache = ModelCache::persistent(&cache_dir).unwrap();
        fs::remove_dir_all(&cache_dir).unwrap();

        let unit = single_unit(algorithm("a1", 1.0), ScriptedTask::new("t", "RMSE"));
        let err = TaskRunner::new(&cache).execute(&unit).unwrap_err();
        assert!(err.is_resource());

        // The storage error itself is the cause, not a copy of its text
        let cause = std::error::Error::source(&err)
            .and_then(|e| e.downcast_ref::<Arc<std::io::Error>>())
            .expect("the original io::Error is the source");
        assert!(err.to_string().ends_with(&cause.to_string()));
        assert!(err.to_string().contains("write model cache entry"));
    }
}
