// ============================================================
// rec-eval — Train-Test Recommender Evaluation
// ============================================================
// Runs every algorithm against every train/test data set with
// every evaluation task, training each (algorithm, data set)
// model once, and aggregates the metrics into ordered tables.
//
// Layers, outermost first:
//
//   cli          Layer 1   clap commands
//   application  Layer 2   experiment facade, JSON spec loader
//   domain       Layer 3   value types, traits, errors
//   data         Layer 4   rating files and splitters
//   engine       Layer 5   coordinator, runner, aggregator
//   ml           Layer 5b  built-in algorithms and tasks
//   infra        Layer 6   model cache, CSV sinks

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod ml;

#[cfg(test)]
mod test_utils;

pub use application::{ExperimentBuilder, ExperimentSpec, TrainTestExperiment};
pub use domain::{
    Algorithm, AlgorithmInstance, DataSet, EvalTask, ExperimentError, ExperimentResult, RatingSource,
    TrainedModel,
};
pub use engine::RunConfig;
