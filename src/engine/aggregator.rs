// ============================================================
// Layer 5 — Result Aggregator
// ============================================================
// Collects UnitResults (in any order) and produces the output
// tables in canonical order.
//
// Global table, one row per (data set, algorithm) pair:
//
//   dataset │ <data-set attrs> │ algorithm │ <algorithm attrs> │ <metrics…>
//
// Per-entity table, one row per (pair, entity):
//
//   algorithm │ dataset │ entity │ <entity metrics…>
//
// A pair's row is merged as soon as every task of that pair has
// reported. Rows are stored at the pair's canonical index, so
// arrival order never affects output order. A failed task leaves
// its metric cells Absent and adds an entry to the failure log.
//
// Column names are fixed before the run starts by ColumnLayout,
// which rejects two tasks declaring the same metric name.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::error::ExperimentError;
use crate::domain::result::{EntityMetrics, FailureRecord, TaskOutput, UnitOutcome, UnitResult};
use crate::domain::table::{Cell, OutputTable, TableBuilder};
use crate::domain::traits::EvalTask;
use crate::infra::table_sink::OutputSinks;

pub const DATA_SET_COLUMN:  &str = "dataset";
pub const ALGORITHM_COLUMN: &str = "algorithm";
pub const ENTITY_COLUMN:    &str = "entity";

// ─── Column layout ────────────────────────────────────────────────────────────

/// Output columns, decided from the experiment definition alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    data_set_attributes:   Vec<String>,
    algorithm_attributes:  Vec<String>,
    metrics:               Vec<String>,
    entity_metrics:        Vec<String>,
}

impl ColumnLayout {
    /// Derive the layout, failing when any two columns would share a name.
    pub fn plan(
        algorithms: &[Arc<AlgorithmInstance>],
        data_sets:  &[Arc<DataSet>],
        tasks:      &[Arc<dyn EvalTask>],
    ) -> Result<Self, ExperimentError> {
        let data_set_attributes = first_seen(
            data_sets.iter().flat_map(|d| d.attributes().iter().map(|(k, _)| k.as_str())),
        );
        let algorithm_attributes = first_seen(
            algorithms.iter().flat_map(|a| a.attributes().iter().map(|(k, _)| k.as_str())),
        );

        let mut taken: HashSet<String> = [DATA_SET_COLUMN, ALGORITHM_COLUMN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for attribute in data_set_attributes.iter().chain(&algorithm_attributes) {
            if !taken.insert(attribute.clone()) {
                return Err(ExperimentError::configuration(format!(
                    "attribute '{attribute}' collides with another output column"
                )));
            }
        }

        let mut metrics = Vec::new();
        for task in tasks {
            for name in task.metric_columns() {
                if !taken.insert(name.clone()) {
                    return Err(ExperimentError::configuration(format!(
                        "metric '{}' of task '{}' collides with another output column",
                        name,
                        task.name()
                    )));
                }
                metrics.push(name);
            }
        }

        let mut entity_taken: HashSet<String> = [ALGORITHM_COLUMN, DATA_SET_COLUMN, ENTITY_COLUMN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut entity_metrics = Vec::new();
        for task in tasks {
            for name in task.entity_metric_columns() {
                if !entity_taken.insert(name.clone()) {
                    return Err(ExperimentError::configuration(format!(
                        "entity metric '{}' of task '{}' collides with another entity column",
                        name,
                        task.name()
                    )));
                }
                entity_metrics.push(name);
            }
        }

        Ok(Self {
            data_set_attributes,
            algorithm_attributes,
            metrics,
            entity_metrics,
        })
    }

    pub fn global_columns(&self) -> Vec<String> {
        let mut columns = vec![DATA_SET_COLUMN.to_string()];
        columns.extend(self.data_set_attributes.iter().cloned());
        columns.push(ALGORITHM_COLUMN.to_string());
        columns.extend(self.algorithm_attributes.iter().cloned());
        columns.extend(self.metrics.iter().cloned());
        columns
    }

    pub fn entity_columns(&self) -> Vec<String> {
        let mut columns = vec![
            ALGORITHM_COLUMN.to_string(),
            DATA_SET_COLUMN.to_string(),
            ENTITY_COLUMN.to_string(),
        ];
        columns.extend(self.entity_metrics.iter().cloned());
        columns
    }

    /// Whether any task declares per-entity metrics.
    pub fn has_entity_table(&self) -> bool {
        !self.entity_metrics.is_empty()
    }
}

fn first_seen<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|n| seen.insert(*n))
        .map(str::to_string)
        .collect()
}

// ─── Aggregator ───────────────────────────────────────────────────────────────

/// Tables and failure log produced by [`ResultAggregator::finalize`].
#[derive(Debug)]
pub struct Aggregate {
    pub global:     OutputTable,
    pub per_entity: Option<OutputTable>,
    pub failures:   Vec<FailureRecord>,
}

struct PairBuffer {
    outcomes: Vec<Option<UnitOutcome>>,
    reported: usize,
}

/// Order-independent collector of UnitResults.
pub struct ResultAggregator {
    layout:      ColumnLayout,
    algorithms:  Vec<Arc<AlgorithmInstance>>,
    data_sets:   Vec<Arc<DataSet>>,
    tasks:       usize,
    recorded:    Vec<bool>,
    buffers:     HashMap<usize, PairBuffer>,
    rows:        Vec<Option<Vec<Cell>>>,
    entity_rows: Vec<Vec<Vec<Cell>>>,
    failures:    Vec<(usize, FailureRecord)>,
}

impl ResultAggregator {
    pub fn new(
        layout:     ColumnLayout,
        algorithms: Vec<Arc<AlgorithmInstance>>,
        data_sets:  Vec<Arc<DataSet>>,
        tasks:      usize,
    ) -> Self {
        let pairs = algorithms.len() * data_sets.len();
        Self {
            layout,
            algorithms,
            data_sets,
            tasks,
            recorded:    vec![false; pairs * tasks],
            buffers:     HashMap::new(),
            rows:        vec![None; pairs],
            entity_rows: vec![Vec::new(); pairs],
            failures:    Vec::new(),
        }
    }

    /// Accept one unit's result. Returns false, ignoring the result,
    /// when that unit was already recorded or is unknown.
    pub fn record(&mut self, result: UnitResult) -> bool {
        match self.recorded.get_mut(result.unit) {
            Some(done) if !*done => *done = true,
            _ => {
                tracing::warn!("Ignoring duplicate or unknown result for unit #{}", result.unit);
                return false;
            }
        }

        let UnitResult { unit, pair, task_index, outcome } = result;

        if let UnitOutcome::Failed(record) = &outcome {
            self.failures.push((unit, record.clone()));
        }

        let tasks = self.tasks;
        let buffer = self.buffers.entry(pair).or_insert_with(|| PairBuffer {
            outcomes: vec![None; tasks],
            reported: 0,
        });
        buffer.outcomes[task_index] = Some(outcome);
        buffer.reported += 1;

        if buffer.reported == tasks {
            if let Some(buffer) = self.buffers.remove(&pair) {
                self.merge_pair(pair, buffer);
            }
        }
        true
    }

    /// Number of pairs whose row has been merged.
    pub fn completed_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    fn identifiers(&self, pair: usize) -> (&DataSet, &AlgorithmInstance) {
        let per_data_set = self.algorithms.len();
        (&self.data_sets[pair / per_data_set], &self.algorithms[pair % per_data_set])
    }

    fn identifier_cells(&self, pair: usize) -> Vec<Cell> {
        let (data_set, algorithm) = self.identifiers(pair);

        let mut row = vec![Cell::from(data_set.name())];
        row.extend(self.layout.data_set_attributes.iter().map(|k| text_or_absent(data_set.attribute(k))));
        row.push(Cell::from(algorithm.name()));
        row.extend(self.layout.algorithm_attributes.iter().map(|k| text_or_absent(algorithm.attribute(k))));
        row
    }

    fn merge_pair(&mut self, pair: usize, buffer: PairBuffer) {
        let outputs: Vec<&TaskOutput> = buffer
            .outcomes
            .iter()
            .flatten()
            .filter_map(|outcome| match outcome {
                UnitOutcome::Completed(output) => Some(output),
                UnitOutcome::Failed(_) => None,
            })
            .collect();

        // Global row
        let mut row = self.identifier_cells(pair);
        for column in &self.layout.metrics {
            let value = outputs.iter().find_map(|o| o.metrics.get(column));
            row.push(Cell::from(value));
        }

        // Entity rows, merged by entity id in first-seen order
        let entities: Vec<&EntityMetrics> = outputs
            .iter()
            .filter_map(|o| o.entities.as_ref())
            .flatten()
            .collect();
        let mut order: Vec<&str> = Vec::new();
        let mut merged: HashMap<&str, Vec<&EntityMetrics>> = HashMap::new();
        for entity in entities {
            let slot = merged.entry(entity.entity.as_str()).or_default();
            if slot.is_empty() {
                order.push(entity.entity.as_str());
            }
            slot.push(entity);
        }

        let (data_set, algorithm) = self.identifiers(pair);
        let entity_rows: Vec<Vec<Cell>> = order
            .iter()
            .map(|id| {
                let parts = &merged[id];
                let mut cells = vec![
                    Cell::from(algorithm.name()),
                    Cell::from(data_set.name()),
                    Cell::from(*id),
                ];
                for column in &self.layout.entity_metrics {
                    cells.push(Cell::from(parts.iter().find_map(|p| p.metrics.get(column))));
                }
                cells
            })
            .collect();

        tracing::debug!(
            "Merged row for {}/{} ({} entities)",
            data_set.name(),
            algorithm.name(),
            entity_rows.len()
        );

        self.entity_rows[pair] = entity_rows;
        self.rows[pair] = Some(row);
    }

    /// Close the tables, write them to `sinks`, and return them.
    ///
    /// Pairs that never completed (only possible after an abort) get a
    /// row of absent metrics.
    pub fn finalize(mut self, sinks: OutputSinks) -> Result<Aggregate, ExperimentError> {
        let mut global = TableBuilder::new(self.layout.global_columns());
        for pair in 0..self.rows.len() {
            let row = match self.rows[pair].take() {
                Some(row) => row,
                None => self.identifier_cells(pair),
            };
            global.push(row);
        }
        let global = global.finish();

        let mut entity = TableBuilder::new(self.layout.entity_columns());
        for rows in self.entity_rows.drain(..) {
            for row in rows {
                entity.push(row);
            }
        }
        let entity = entity.finish();

        if let Some(sink) = sinks.global {
            let path = sink.path().to_path_buf();
            sink.write(&global)
                .map_err(|e| ExperimentError::path("write output table", &path, e))?;
        }
        if let Some(sink) = sinks.per_entity {
            let path = sink.path().to_path_buf();
            sink.write(&entity)
                .map_err(|e| ExperimentError::path("write per-entity table", &path, e))?;
        }

        self.failures.sort_by_key(|(unit, _)| *unit);

        Ok(Aggregate {
            global,
            per_entity: self.layout.has_entity_table().then_some(entity),
            failures:   self.failures.into_iter().map(|(_, f)| f).collect(),
        })
    }
}

fn text_or_absent(value: Option<&str>) -> Cell {
    value.map_or(Cell::Absent, Cell::from)
}
