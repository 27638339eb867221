// ============================================================
// Layer 2 — TrainTestExperiment
// ============================================================
// The public entry point. An experiment is defined completely
// with ExperimentBuilder, frozen by build(), and then run:
//
//   ExperimentBuilder::new()
//       .add_algorithm(..)     one or more
//       .add_data_sets(..)     one or more
//       .add_task(..)          one or more
//       .output_file(..)       optional CSV sinks
//       .cache_directory(..)   optional persistent model cache
//       .build()
//       .run()
//
// A built TrainTestExperiment cannot be changed, so nothing can
// modify the work matrix while a run is in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::error::ExperimentError;
use crate::domain::result::ExperimentResult;
use crate::domain::traits::EvalTask;
use crate::domain::work_unit::WorkUnit;
use crate::engine::coordinator::{ExperimentCoordinator, RunConfig};

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Accumulates an experiment definition.
#[derive(Default)]
pub struct ExperimentBuilder {
    algorithms:       Vec<Arc<AlgorithmInstance>>,
    data_sets:        Vec<Arc<DataSet>>,
    tasks:            Vec<Arc<dyn EvalTask>>,
    output_file:      Option<PathBuf>,
    user_output_file: Option<PathBuf>,
    cache_directory:  Option<PathBuf>,
    threads:          Option<usize>,
}

impl ExperimentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the global table here as CSV.
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Write the per-entity table here as CSV.
    pub fn user_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_output_file = Some(path.into());
        self
    }

    /// Persist trained models here and reuse them across runs.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(path.into());
        self
    }

    /// Worker threads; defaults to the available parallelism.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn add_algorithm(mut self, algorithm: impl Into<Arc<AlgorithmInstance>>) -> Self {
        self.algorithms.push(algorithm.into());
        self
    }

    pub fn add_algorithms<I>(self, algorithms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arc<AlgorithmInstance>>,
    {
        algorithms.into_iter().fold(self, |b, a| b.add_algorithm(a))
    }

    pub fn add_data_set(mut self, data_set: impl Into<Arc<DataSet>>) -> Self {
        self.data_sets.push(data_set.into());
        self
    }

    pub fn add_data_sets<I>(self, data_sets: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arc<DataSet>>,
    {
        data_sets.into_iter().fold(self, |b, d| b.add_data_set(d))
    }

    pub fn add_task(mut self, task: impl EvalTask + 'static) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    /// Add an already shared task.
    pub fn add_shared_task(mut self, task: Arc<dyn EvalTask>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Freeze the definition. Validation happens when it runs.
    pub fn build(self) -> TrainTestExperiment {
        let mut config = RunConfig {
            cache_directory:  self.cache_directory,
            output_file:      self.output_file,
            user_output_file: self.user_output_file,
            ..RunConfig::default()
        };
        if let Some(threads) = self.threads {
            config.threads = threads.max(1);
        }

        TrainTestExperiment {
            algorithms: self.algorithms,
            data_sets:  self.data_sets,
            tasks:      self.tasks,
            config,
        }
    }
}

// ─── Experiment ───────────────────────────────────────────────────────────────

/// An immutable train-test experiment definition.
pub struct TrainTestExperiment {
    algorithms: Vec<Arc<AlgorithmInstance>>,
    data_sets:  Vec<Arc<DataSet>>,
    tasks:      Vec<Arc<dyn EvalTask>>,
    config:     RunConfig,
}

impl TrainTestExperiment {
    pub fn builder() -> ExperimentBuilder {
        ExperimentBuilder::new()
    }

    pub fn algorithms(&self) -> &[Arc<AlgorithmInstance>] {
        &self.algorithms
    }

    pub fn data_sets(&self) -> &[Arc<DataSet>] {
        &self.data_sets
    }

    pub fn tasks(&self) -> &[Arc<dyn EvalTask>] {
        &self.tasks
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.config.output_file.as_deref()
    }

    pub fn user_output_file(&self) -> Option<&Path> {
        self.config.user_output_file.as_deref()
    }

    pub fn cache_directory(&self) -> Option<&Path> {
        self.config.cache_directory.as_deref()
    }

    pub fn threads(&self) -> usize {
        self.config.threads
    }

    /// Execute every WorkUnit and return the aggregated result.
    ///
    /// Per-unit failures are reported inside the result; only an
    /// invalid definition or an unusable output or cache location
    /// is an `Err`.
    pub fn run(&self) -> Result<ExperimentResult, ExperimentError> {
        tracing::info!(
            "Starting experiment: {} algorithms, {} data sets, {} tasks",
            self.algorithms.len(),
            self.data_sets.len(),
            self.tasks.len()
        );
        self.coordinator().run(&self.algorithms, &self.data_sets, &self.tasks)
    }

    /// The WorkUnits a run would execute, in canonical order.
    pub fn plan(&self) -> Result<Vec<WorkUnit>, ExperimentError> {
        self.coordinator().plan(&self.algorithms, &self.data_sets, &self.tasks)
    }

    fn coordinator(&self) -> ExperimentCoordinator {
        ExperimentCoordinator::new(self.config.clone())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Cell;
    use crate::test_utils::{algorithm, data_set, ScriptedTask};

    #[test]
    fn builder_collects_the_definition() {
        let experiment = ExperimentBuilder::new()
            .add_algorithms(vec![algorithm("a1", 1.0), algorithm("a2", 2.0)])
            .add_data_set(data_set("d1"))
            .add_task(ScriptedTask::new("t", "RMSE"))
            .output_file("out/results.csv")
            .user_output_file("out/users.csv")
            .cache_directory("cache")
            .threads(0)
            .build();

        assert_eq!(experiment.algorithms().len(), 2);
        assert_eq!(experiment.data_sets()[0].name(), "d1");
        assert_eq!(experiment.tasks()[0].name(), "t");
        assert_eq!(experiment.output_file(), Some(Path::new("out/results.csv")));
        assert_eq!(experiment.user_output_file(), Some(Path::new("out/users.csv")));
        assert_eq!(experiment.cache_directory(), Some(Path::new("cache")));
        assert_eq!(experiment.threads(), 1);
    }

    #[test]
    fn run_returns_the_global_table() {
        let experiment = TrainTestExperiment::builder()
            .add_algorithm(algorithm("a1", 0.75))
            .add_data_sets(vec![data_set("d1"), data_set("d2")])
            .add_task(ScriptedTask::new("t", "RMSE"))
            .threads(2)
            .build();

        let result = experiment.run().unwrap();
        assert_eq!(result.global.len(), 2);
        assert_eq!(result.global.value(1, "RMSE"), Some(&Cell::Number(0.75)));
        assert!(result.per_entity.is_none());
    }

    #[test]
    fn empty_experiment_is_a_configuration_error() {
        let err = ExperimentBuilder::new().build().run().unwrap_err();
        assert!(err.is_configuration());
        assert!(ExperimentBuilder::new().build().plan().is_err());
    }

    #[test]
    fn plan_matches_the_work_matrix() {
        let experiment = ExperimentBuilder::new()
            .add_algorithms(vec![algorithm("a1", 1.0), algorithm("a2", 2.0)])
            .add_data_sets(vec![data_set("d1"), data_set("d2")])
            .add_task(ScriptedTask::new("t1", "RMSE"))
            .add_task(ScriptedTask::new("t2", "MAE"))
            .build();

        let units = experiment.plan().unwrap();
        assert_eq!(units.len(), 8);
        assert_eq!(units[0].cache_key(), units[1].cache_key());
        assert_ne!(units[0].cache_key(), units[2].cache_key());
    }
}
