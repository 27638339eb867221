// ============================================================
// Layer 2 — Application
// ============================================================
// The surface callers use to define and run experiments:
//
//   experiment.rs  — ExperimentBuilder → TrainTestExperiment
//                    Immutable experiment definition with
//                    run() and plan().
//
//   spec_loader.rs — JSON experiment documents
//                    Maps algorithm, data-set and task
//                    entries onto the built-in providers.
//
// No scheduling, caching or metric code lives here; this layer
// only assembles inputs for the engine.

/// Experiment facade and builder
pub mod experiment;

/// JSON experiment spec loading
pub mod spec_loader;

pub use experiment::{ExperimentBuilder, TrainTestExperiment};
pub use spec_loader::{AlgorithmKind, AlgorithmSpec, DataSetSpec, ExperimentSpec, TaskSpec};
