// ============================================================
// Layer 3 — Rating Domain Type
// ============================================================
// The unit of data every built-in data source, algorithm and
// evaluation task works with. The engine itself never looks
// inside a Rating; it only moves DataSets around.

use serde::{Deserialize, Serialize};

/// One explicit preference: `user` rated `item` with `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user:  u64,
    pub item:  u64,
    pub value: f64,
}

impl Rating {
    pub fn new(user: u64, item: u64, value: f64) -> Self {
        Self { user, item, value }
    }
}
