// ============================================================
// Layer 5 — Execution Engine
// ============================================================
// Turns an experiment definition into output tables:
//
//   coordinator.rs → ExperimentCoordinator: validate, enumerate,
//                    schedule WorkUnits on a bounded pool,
//                    abort on fatal errors
//   runner.rs      → TaskRunner: model from the cache, then the
//                    task; per-unit failures contained here
//   aggregator.rs  → ResultAggregator: any-order results in,
//                    canonical-order tables out
//   state.rs       → per-unit state machine shared by workers
//
// The engine only sees algorithms, tasks and rating data through
// the domain traits; it never branches on a concrete variant.

/// Run orchestration and worker pool
pub mod coordinator;

/// Single WorkUnit execution
pub mod runner;

/// Canonical-order result tables
pub mod aggregator;

/// Per-unit state tracking
pub mod state;

pub use aggregator::{Aggregate, ColumnLayout, ResultAggregator};
pub use coordinator::{default_threads, ExperimentCoordinator, RunConfig};
pub use runner::TaskRunner;
pub use state::{StateCounts, UnitState, UnitTracker};
