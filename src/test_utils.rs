//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::data::source::InMemoryRatings;
use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::rating::Rating;
use crate::domain::result::{EntityMetrics, Metrics, TaskOutput};
use crate::domain::traits::{Algorithm, EvalTask, ModelHandle, TrainedModel};

/// Predicts the same value for every pair.
#[derive(Debug, Clone, Copy)]
pub struct FixedModel {
    value: f64,
}

impl FixedModel {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl TrainedModel for FixedModel {
    fn predict(&self, _user: u64, _item: u64) -> Option<f64> {
        Some(self.value)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.value)?)
    }
}

/// Builds FixedModels and counts how often it was asked to.
#[derive(Debug, Clone)]
pub struct CountingAlgorithm {
    value:    f64,
    builds:   Arc<AtomicUsize>,
    fail_on:  Option<String>,
    panic_on: Option<String>,
}

impl CountingAlgorithm {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            builds:   Arc::new(AtomicUsize::new(0)),
            fail_on:  None,
            panic_on: None,
        }
    }

    /// Share a build counter with the caller.
    pub fn with_counter(mut self, builds: Arc<AtomicUsize>) -> Self {
        self.builds = builds;
        self
    }

    /// Fail every build on the named data set.
    pub fn failing_on(mut self, data_set: &str) -> Self {
        self.fail_on = Some(data_set.to_string());
        self
    }

    /// Panic on every build on the named data set.
    pub fn panicking_on(mut self, data_set: &str) -> Self {
        self.panic_on = Some(data_set.to_string());
        self
    }
}

impl Algorithm for CountingAlgorithm {
    fn build(&self, data: &DataSet) -> Result<ModelHandle> {
        self.builds.fetch_add(1, Ordering::SeqCst);

        if self.panic_on.as_deref() == Some(data.name()) {
            panic!("model exploded on {}", data.name());
        }
        if self.fail_on.as_deref() == Some(data.name()) {
            bail!("cannot train on {}", data.name());
        }
        Ok(Arc::new(FixedModel::new(self.value)))
    }

    fn load(&self, bytes: &[u8]) -> Result<ModelHandle> {
        let value: f64 = serde_json::from_slice(bytes).context("not a fixed model")?;
        Ok(Arc::new(FixedModel::new(value)))
    }
}

/// An algorithm instance whose models predict `value` everywhere.
pub fn algorithm(name: &str, value: f64) -> Arc<AlgorithmInstance> {
    Arc::new(AlgorithmInstance::new(
        name,
        json!({"fake": name, "value": value}),
        Arc::new(CountingAlgorithm::new(value)),
    ))
}

/// A small in-memory data set.
pub fn data_set(name: &str) -> Arc<DataSet> {
    let train = vec![Rating::new(1, 1, 4.0), Rating::new(2, 1, 3.0), Rating::new(2, 2, 5.0)];
    let test = vec![Rating::new(1, 2, 4.5)];
    Arc::new(DataSet::new(
        name,
        Arc::new(InMemoryRatings::new(train)),
        Arc::new(InMemoryRatings::new(test)),
    ))
}

/// Reports one metric equal to the model's prediction, with
/// optional delays, failures and per-entity rows.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    name:       String,
    metric:     String,
    entities:   bool,
    delays:     Vec<(String, Duration)>,
    fail_on:    Option<String>,
    panic_on:   Option<String>,
    undeclared: Option<String>,
}

impl ScriptedTask {
    pub fn new(name: &str, metric: &str) -> Self {
        Self {
            name:       name.to_string(),
            metric:     metric.to_string(),
            entities:   false,
            delays:     Vec::new(),
            fail_on:    None,
            panic_on:   None,
            undeclared: None,
        }
    }

    /// Also report rows for entities "u1" (value) and "u2" (value + 0.5).
    pub fn with_entities(mut self) -> Self {
        self.entities = true;
        self
    }

    /// Sleep before evaluating on the named data set.
    pub fn with_delay_on(mut self, data_set: &str, delay: Duration) -> Self {
        self.delays.push((data_set.to_string(), delay));
        self
    }

    pub fn failing_on(mut self, data_set: &str) -> Self {
        self.fail_on = Some(data_set.to_string());
        self
    }

    pub fn panicking_on(mut self, data_set: &str) -> Self {
        self.panic_on = Some(data_set.to_string());
        self
    }

    /// Add a metric the task never declared.
    pub fn reporting_undeclared(mut self, metric: &str) -> Self {
        self.undeclared = Some(metric.to_string());
        self
    }
}

impl EvalTask for ScriptedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric_columns(&self) -> Vec<String> {
        vec![self.metric.clone()]
    }

    fn entity_metric_columns(&self) -> Vec<String> {
        if self.entities {
            vec![self.metric.clone()]
        } else {
            Vec::new()
        }
    }

    fn evaluate(&self, model: &dyn TrainedModel, data: &DataSet) -> Result<TaskOutput> {
        if let Some((_, delay)) = self.delays.iter().find(|(d, _)| d == data.name()) {
            thread::sleep(*delay);
        }
        if self.panic_on.as_deref() == Some(data.name()) {
            panic!("evaluation exploded on {}", data.name());
        }
        if self.fail_on.as_deref() == Some(data.name()) {
            bail!("cannot evaluate on {}", data.name());
        }

        let value = model.predict(0, 0).context("model gave no prediction")?;
        let mut metrics = Metrics::new().with(self.metric.clone(), value);
        if let Some(extra) = &self.undeclared {
            metrics.insert(extra.clone(), value);
        }

        let mut output = TaskOutput::new(metrics);
        if self.entities {
            output = output.with_entities(vec![
                EntityMetrics::new("u1", Metrics::new().with(self.metric.clone(), value)),
                EntityMetrics::new("u2", Metrics::new().with(self.metric.clone(), value + 0.5)),
            ]);
        }
        Ok(output)
    }
}
