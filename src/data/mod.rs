// ============================================================
// Layer 4 — Data Access
// ============================================================
// Concrete rating sources and the splitter that turns a pool
// of ratings into train/test DataSets:
//
//   ratings file
//       │
//       ▼
//   RatingsLoader     → parses delimited user,item,rating lines
//       │
//       ▼
//   splitter          → holdout or K-fold partitions (seeded)
//       │
//       ▼
//   InMemoryRatings   → RatingSource handed to the engine
//
// Pre-split train/test files skip the splitter and are used
// directly through CsvRatingSource.

/// Delimited ratings reader and file-backed rating source
pub mod loader;

/// Seeded holdout and crossfold splitting
pub mod splitter;

/// In-memory rating source
pub mod source;

pub use loader::{CsvRatingSource, RatingsLoader};
pub use source::InMemoryRatings;
pub use splitter::{crossfold, crossfold_data_sets, holdout_data_set, split_train_test};
