// ============================================================
// Layer 5b — Built-in Recommenders and Tasks
// ============================================================
// Reference implementations of the pluggable parts, usable
// from experiment spec files:
//
//   baselines.rs    — global-mean, item-mean, user-item-bias
//                     Damped bias models sharing one
//                     serialisable BiasModel.
//
//   item_knn.rs     — item-item collaborative filtering
//                     Cosine similarity over baseline
//                     residuals, truncated neighbour lists.
//
//   predict_task.rs — rating prediction accuracy
//                     RMSE, MAE, Coverage per pair plus
//                     per-user rows.
//
// Every trained model serialises to JSON so the model cache can
// persist it between runs.

/// Damped bias baselines
pub mod baselines;

/// Item-item kNN collaborative filter
pub mod item_knn;

/// Rating-prediction evaluation task
pub mod predict_task;

pub use baselines::{BiasModel, GlobalMean, ItemMean, UserItemBias};
pub use item_knn::{ItemKnn, ItemKnnModel};
pub use predict_task::PredictTask;
