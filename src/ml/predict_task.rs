// ============================================================
// Layer 5b — Rating Prediction Task
// ============================================================
// Scores every rating in the test partition and compares the
// prediction with the true value.
//
// Global metrics (one value per pair):
//   RMSE      √(mean squared error) over predicted ratings
//   MAE       mean absolute error over predicted ratings
//   Coverage  fraction of test ratings that got a prediction
//
// Per-user metrics (one row per test user):
//   RMSE, MAE, NPredicted
//
// An optional prefix namespaces the columns ("prefix.RMSE") so
// two predict tasks can share an experiment. Errors are omitted,
// not zero, when a model predicted nothing at all.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::domain::data_set::DataSet;
use crate::domain::result::{EntityMetrics, Metrics, TaskOutput};
use crate::domain::traits::{EvalTask, TrainedModel};

pub const RMSE:        &str = "RMSE";
pub const MAE:         &str = "MAE";
pub const COVERAGE:    &str = "Coverage";
pub const N_PREDICTED: &str = "NPredicted";

/// Running squared/absolute error totals.
#[derive(Debug, Default, Clone, Copy)]
struct ErrorAccumulator {
    squared:   f64,
    absolute:  f64,
    predicted: usize,
    total:     usize,
}

impl ErrorAccumulator {
    fn add(&mut self, truth: f64, prediction: Option<f64>) {
        self.total += 1;
        if let Some(p) = prediction.filter(|p| p.is_finite()) {
            let error = p - truth;
            self.squared += error * error;
            self.absolute += error.abs();
            self.predicted += 1;
        }
    }

    fn rmse(&self) -> Option<f64> {
        (self.predicted > 0).then(|| (self.squared / self.predicted as f64).sqrt())
    }

    fn mae(&self) -> Option<f64> {
        (self.predicted > 0).then(|| self.absolute / self.predicted as f64)
    }
}

/// Rating-prediction accuracy task.
#[derive(Debug, Clone)]
pub struct PredictTask {
    name:   String,
    prefix: Option<String>,
}

impl PredictTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), prefix: None }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn column(&self, metric: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{metric}"),
            None => metric.to_string(),
        }
    }
}

impl EvalTask for PredictTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric_columns(&self) -> Vec<String> {
        [RMSE, MAE, COVERAGE].iter().map(|m| self.column(m)).collect()
    }

    fn entity_metric_columns(&self) -> Vec<String> {
        [RMSE, MAE, N_PREDICTED].iter().map(|m| self.column(m)).collect()
    }

    fn evaluate(&self, model: &dyn TrainedModel, data: &DataSet) -> Result<TaskOutput> {
        let test = data
            .test()
            .ratings()
            .with_context(|| format!("Cannot read test data of '{}'", data.name()))?;
        if test.is_empty() {
            bail!("test partition of '{}' is empty", data.name());
        }

        let mut overall = ErrorAccumulator::default();
        let mut users: Vec<(u64, ErrorAccumulator)> = Vec::new();
        let mut positions: HashMap<u64, usize> = HashMap::new();

        for rating in test.iter() {
            let prediction = model.predict(rating.user, rating.item);
            overall.add(rating.value, prediction);

            let position = *positions.entry(rating.user).or_insert_with(|| {
                users.push((rating.user, ErrorAccumulator::default()));
                users.len() - 1
            });
            users[position].1.add(rating.value, prediction);
        }

        let mut metrics = Metrics::new();
        if let Some(rmse) = overall.rmse() {
            metrics.insert(self.column(RMSE), rmse);
        }
        if let Some(mae) = overall.mae() {
            metrics.insert(self.column(MAE), mae);
        }
        metrics.insert(self.column(COVERAGE), overall.predicted as f64 / overall.total as f64);

        let entities = users
            .iter()
            .map(|(user, acc)| {
                let mut m = Metrics::new();
                if let Some(rmse) = acc.rmse() {
                    m.insert(self.column(RMSE), rmse);
                }
                if let Some(mae) = acc.mae() {
                    m.insert(self.column(MAE), mae);
                }
                m.insert(self.column(N_PREDICTED), acc.predicted as f64);
                EntityMetrics::new(user.to_string(), m)
            })
            .collect();

        tracing::debug!(
            "Predicted {}/{} test ratings of '{}' for {} users",
            overall.predicted,
            overall.total,
            data.name(),
            users.len()
        );

        Ok(TaskOutput::new(metrics).with_entities(entities))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::InMemoryRatings;
    use crate::domain::rating::Rating;
    use crate::test_utils::FixedModel;
    use std::sync::Arc;

    /// Predicts only for items below 100.
    struct PartialModel;

    impl TrainedModel for PartialModel {
        fn predict(&self, _user: u64, item: u64) -> Option<f64> {
            (item < 100).then_some(3.0)
        }

        fn to_bytes(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn data(test: Vec<Rating>) -> DataSet {
        DataSet::new(
            "d",
            Arc::new(InMemoryRatings::new(vec![Rating::new(1, 1, 3.0)])),
            Arc::new(InMemoryRatings::new(test)),
        )
    }

    #[test]
    fn computes_global_errors() {
        let test = vec![Rating::new(1, 1, 4.0), Rating::new(2, 1, 1.0)];
        let output = PredictTask::new("predict").evaluate(&FixedModel::new(3.0), &data(test)).unwrap();

        // Errors are -1 and +2
        assert!((output.metrics.get("RMSE").unwrap() - (2.5f64).sqrt()).abs() < 1e-12);
        assert!((output.metrics.get("MAE").unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(output.metrics.get("Coverage"), Some(1.0));
    }

    #[test]
    fn reports_per_user_rows_in_first_seen_order() {
        let test = vec![Rating::new(7, 1, 4.0), Rating::new(2, 1, 1.0), Rating::new(7, 2, 3.0)];
        let output = PredictTask::new("predict").evaluate(&FixedModel::new(3.0), &data(test)).unwrap();

        let entities = output.entities.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity, "7");
        assert_eq!(entities[0].metrics.get("NPredicted"), Some(2.0));
        assert_eq!(entities[1].entity, "2");
        assert_eq!(entities[1].metrics.get("MAE"), Some(2.0));
    }

    #[test]
    fn missing_predictions_reduce_coverage() {
        let test = vec![Rating::new(1, 1, 3.0), Rating::new(1, 500, 3.0)];
        let output = PredictTask::new("predict").evaluate(&PartialModel, &data(test)).unwrap();
        assert_eq!(output.metrics.get("Coverage"), Some(0.5));
        assert_eq!(output.metrics.get("RMSE"), Some(0.0));

        let test = vec![Rating::new(1, 500, 3.0)];
        let output = PredictTask::new("predict").evaluate(&PartialModel, &data(test)).unwrap();
        assert_eq!(output.metrics.get("RMSE"), None);
        assert_eq!(output.metrics.get("Coverage"), Some(0.0));
    }

    #[test]
    fn prefix_namespaces_every_column() {
        let task = PredictTask::new("predict").with_prefix("holdout");
        assert_eq!(task.metric_columns(), ["holdout.RMSE", "holdout.MAE", "holdout.Coverage"]);
        assert_eq!(task.entity_metric_columns(), ["holdout.RMSE", "holdout.MAE", "holdout.NPredicted"]);

        let output = task.evaluate(&FixedModel::new(3.0), &data(vec![Rating::new(1, 1, 3.0)])).unwrap();
        assert!(output.metrics.names().all(|n| n.starts_with("holdout.")));
    }

    #[test]
    fn empty_test_partition_is_an_error() {
        assert!(PredictTask::new("predict").evaluate(&FixedModel::new(3.0), &data(Vec::new())).is_err());
    }
}
