// ============================================================
// Layer 5 — Experiment Coordinator
// ============================================================
// Drives one run of a train-test experiment:
//
//   1. Validate      → names unique, no empty dimension
//   2. Plan columns  → metric names unique across tasks
//   3. Enumerate     → data set × algorithm × task, canonical order
//   4. Open storage  → model cache directory + output sinks
//   5. Execute       → bounded rayon pool, one job per WorkUnit,
//                      results streamed back over a channel
//   6. Aggregate     → canonical-order tables, written to sinks
//
// Steps 1–4 fail before any model is trained. During step 5 a
// fatal error (unwritable cache) cancels every unit still
// Pending; units already Running finish but their results are
// discarded, and run() returns the fatal cause.

use std::collections::HashSet;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::error::ExperimentError;
use crate::domain::result::{ExperimentResult, RunSummary, UnitResult};
use crate::domain::traits::EvalTask;
use crate::domain::work_unit::{enumerate, WorkUnit};
use crate::engine::aggregator::{ColumnLayout, ResultAggregator};
use crate::engine::runner::TaskRunner;
use crate::engine::state::{UnitState, UnitTracker};
use crate::infra::model_cache::ModelCache;
use crate::infra::table_sink::{OutputSinks, TableSink};

/// Execution settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Worker threads; at least 1.
    pub threads:          usize,
    /// Persist trained models here and reuse them across runs.
    pub cache_directory:  Option<PathBuf>,
    /// Global results CSV.
    pub output_file:      Option<PathBuf>,
    /// Per-entity results CSV.
    pub user_output_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads:          default_threads(),
            cache_directory:  None,
            output_file:      None,
            user_output_file: None,
        }
    }
}

/// Available hardware parallelism, or 1 when it cannot be determined.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

pub struct ExperimentCoordinator {
    config: RunConfig,
}

impl ExperimentCoordinator {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate the definition and list its WorkUnits without running them.
    pub fn plan(
        &self,
        algorithms: &[Arc<AlgorithmInstance>],
        data_sets:  &[Arc<DataSet>],
        tasks:      &[Arc<dyn EvalTask>],
    ) -> Result<Vec<WorkUnit>, ExperimentError> {
        validate(algorithms, data_sets, tasks)?;
        ColumnLayout::plan(algorithms, data_sets, tasks)?;
        Ok(enumerate(algorithms, data_sets, tasks))
    }

    pub fn run(
        &self,
        algorithms: &[Arc<AlgorithmInstance>],
        data_sets:  &[Arc<DataSet>],
        tasks:      &[Arc<dyn EvalTask>],
    ) -> Result<ExperimentResult, ExperimentError> {
        let started = Instant::now();

        // ── Steps 1–3: Definition ─────────────────────────────────────────────
        validate(algorithms, data_sets, tasks)?;
        let layout = ColumnLayout::plan(algorithms, data_sets, tasks)?;
        let units = enumerate(algorithms, data_sets, tasks);

        // ── Step 4: Storage ───────────────────────────────────────────────────
        let cache = self.open_cache()?;
        let sinks = self.open_sinks()?;

        let threads = self.config.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rec-eval-worker-{i}"))
            .build()
            .map_err(|e| {
                ExperimentError::resource(
                    "cannot start worker pool",
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                )
            })?;

        tracing::info!(
            "Running {} units ({} data sets × {} algorithms × {} tasks) on {} threads",
            units.len(),
            data_sets.len(),
            algorithms.len(),
            tasks.len(),
            threads
        );

        // ── Step 5: Execute ───────────────────────────────────────────────────
        let tracker = UnitTracker::new(units.len());
        let runner = TaskRunner::new(&cache);
        let mut aggregator = ResultAggregator::new(layout, algorithms.to_vec(), data_sets.to_vec(), tasks.len());
        let mut fatal: Option<ExperimentError> = None;

        pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<Result<UnitResult, ExperimentError>>();

            for unit in &units {
                let tx = tx.clone();
                let tracker = &tracker;
                let runner = &runner;
                scope.spawn(move |_| {
                    // Cancelled before it could start
                    if !tracker.advance(unit.index(), UnitState::Running) {
                        return;
                    }

                    let outcome = runner.execute(unit);
                    let next = match &outcome {
                        Ok(result) if !result.is_failure() => UnitState::Completed,
                        _ => UnitState::Failed,
                    };
                    tracker.advance(unit.index(), next);
                    if let Err(err) = &outcome {
                        // Cancel before this worker dequeues another unit
                        let cancelled = tracker.cancel_pending();
                        tracing::error!("Fatal error in {}, {} pending units cancelled: {}", unit, cancelled, err);
                    }
                    // The receiver outlives every job in this scope
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);

            for outcome in rx {
                match outcome {
                    Ok(result) => {
                        if fatal.is_none() {
                            aggregator.record(result);
                        }
                    }
                    Err(err) => {
                        if fatal.is_none() {
                            tracing::error!("Aborting run: {}", err);
                            fatal = Some(err);
                        }
                    }
                }
            }
        });

        if let Some(err) = fatal {
            return Err(err);
        }

        // ── Step 6: Aggregate ─────────────────────────────────────────────────
        let aggregate = aggregator.finalize(sinks)?;

        let counts = tracker.counts();
        let stats = cache.stats();
        let summary = RunSummary {
            units:        units.len(),
            completed:    counts.completed,
            failed:       counts.failed,
            cancelled:    counts.cancelled,
            model_builds: stats.builds,
            cache_hits:   stats.hits + stats.loads,
        };

        tracing::info!(
            "Run finished in {:?}: {} completed, {} failed, {} models built, {} cache hits",
            started.elapsed(),
            summary.completed,
            summary.failed,
            summary.model_builds,
            summary.cache_hits
        );
        for failure in &aggregate.failures {
            tracing::warn!("{}", failure);
        }

        Ok(ExperimentResult {
            global:     aggregate.global,
            per_entity: aggregate.per_entity,
            failures:   aggregate.failures,
            summary,
        })
    }

    fn open_cache(&self) -> Result<ModelCache, ExperimentError> {
        match &self.config.cache_directory {
            Some(dir) => ModelCache::persistent(dir)
                .map_err(|e| ExperimentError::path("use cache directory", dir, e)),
            None => Ok(ModelCache::in_memory()),
        }
    }

    fn open_sinks(&self) -> Result<OutputSinks, ExperimentError> {
        let open = |path: &Option<PathBuf>| -> Result<Option<TableSink>, ExperimentError> {
            path.as_ref()
                .map(|p| TableSink::create(p).map_err(|e| ExperimentError::path("open output file", p, e)))
                .transpose()
        };

        Ok(OutputSinks {
            global:     open(&self.config.output_file)?,
            per_entity: open(&self.config.user_output_file)?,
        })
    }
}

/// Reject definitions that cannot produce a meaningful table.
fn validate(
    algorithms: &[Arc<AlgorithmInstance>],
    data_sets:  &[Arc<DataSet>],
    tasks:      &[Arc<dyn EvalTask>],
) -> Result<(), ExperimentError> {
    if algorithms.is_empty() {
        return Err(ExperimentError::configuration("experiment has no algorithms"));
    }
    if data_sets.is_empty() {
        return Err(ExperimentError::configuration("experiment has no data sets"));
    }
    if tasks.is_empty() {
        return Err(ExperimentError::configuration("experiment has no tasks"));
    }

    unique("algorithm", algorithms.iter().map(|a| a.name()))?;
    unique("data set", data_sets.iter().map(|d| d.name()))?;
    unique("task", tasks.iter().map(|t| t.name()))?;
    Ok(())
}

fn unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<(), ExperimentError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ExperimentError::configuration(format!("duplicate {what} name '{name}'")));
        }
    }
    Ok(())
}
