// ============================================================
// Layer 5b — Bias Baselines
// ============================================================
// Three baseline scorers sharing one fitted model:
//
//   global-mean     → μ
//   item-mean       → μ + b_i
//   user-item-bias  → μ + b_i + b_u
//
// with damped offsets
//
//   b_i = Σ (r_ui − μ)       / (|U_i| + damping)
//   b_u = Σ (r_ui − μ − b_i) / (|I_u| + damping)
//
// Damping pulls offsets of rarely-rated items and users
// towards zero. Unknown users or items get a zero offset, so
// these models always produce a prediction.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::data_set::DataSet;
use crate::domain::rating::Rating;
use crate::domain::traits::{Algorithm, ModelHandle, TrainedModel};

/// Fitted global mean plus optional item and user offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasModel {
    pub global:       f64,
    pub item_offsets: HashMap<u64, f64>,
    pub user_offsets: HashMap<u64, f64>,
}

impl BiasModel {
    /// Fit on `ratings`. `None` damping disables that offset entirely.
    pub fn fit(ratings: &[Rating], item_damping: Option<f64>, user_damping: Option<f64>) -> Result<Self> {
        if ratings.is_empty() {
            bail!("cannot fit a baseline on zero ratings");
        }

        let global = ratings.iter().map(|r| r.value).sum::<f64>() / ratings.len() as f64;

        let item_offsets = match item_damping {
            Some(damping) => damped_means(ratings.iter().map(|r| (r.item, r.value - global)), damping),
            None => HashMap::new(),
        };

        let user_offsets = match user_damping {
            Some(damping) => damped_means(
                ratings.iter().map(|r| {
                    let item = item_offsets.get(&r.item).copied().unwrap_or(0.0);
                    (r.user, r.value - global - item)
                }),
                damping,
            ),
            None => HashMap::new(),
        };

        tracing::debug!(
            "Fitted baseline: μ={:.4}, {} item offsets, {} user offsets",
            global,
            item_offsets.len(),
            user_offsets.len()
        );

        Ok(Self { global, item_offsets, user_offsets })
    }

    pub fn baseline(&self, user: u64, item: u64) -> f64 {
        self.global
            + self.item_offsets.get(&item).copied().unwrap_or(0.0)
            + self.user_offsets.get(&user).copied().unwrap_or(0.0)
    }
}

impl TrainedModel for BiasModel {
    fn predict(&self, user: u64, item: u64) -> Option<f64> {
        Some(self.baseline(user, item))
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Cannot serialise baseline model")
    }
}

fn damped_means(values: impl Iterator<Item = (u64, f64)>, damping: f64) -> HashMap<u64, f64> {
    let mut sums: HashMap<u64, (f64, usize)> = HashMap::new();
    for (key, value) in values {
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / (n as f64 + damping)))
        .collect()
}

/// Training ratings of `data`, rejecting an empty partition.
pub(crate) fn training_ratings(data: &DataSet) -> Result<Arc<Vec<Rating>>> {
    let ratings = data
        .train()
        .ratings()
        .with_context(|| format!("Cannot read training data of '{}'", data.name()))?;
    if ratings.is_empty() {
        bail!("training partition of '{}' is empty", data.name());
    }
    Ok(ratings)
}

fn load_bias_model(bytes: &[u8]) -> Result<ModelHandle> {
    let model: BiasModel = serde_json::from_slice(bytes).context("Cannot decode baseline model")?;
    Ok(Arc::new(model))
}

// ─── Algorithms ───────────────────────────────────────────────────────────────

/// Predicts the global mean rating for every pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMean;

impl Algorithm for GlobalMean {
    fn build(&self, data: &DataSet) -> Result<ModelHandle> {
        let ratings = training_ratings(data)?;
        Ok(Arc::new(BiasModel::fit(&ratings, None, None)?))
    }

    fn load(&self, bytes: &[u8]) -> Result<ModelHandle> {
        load_bias_model(bytes)
    }
}

/// Global mean plus a damped per-item offset.
#[derive(Debug, Clone, Copy)]
pub struct ItemMean {
    pub damping: f64,
}

impl Algorithm for ItemMean {
    fn build(&self, data: &DataSet) -> Result<ModelHandle> {
        let ratings = training_ratings(data)?;
        Ok(Arc::new(BiasModel::fit(&ratings, Some(self.damping), None)?))
    }

    fn load(&self, bytes: &[u8]) -> Result<ModelHandle> {
        load_bias_model(bytes)
    }
}

/// Global mean plus damped item and user offsets.
#[derive(Debug, Clone, Copy)]
pub struct UserItemBias {
    pub damping: f64,
}

impl Algorithm for UserItemBias {
    fn build(&self, data: &DataSet) -> Result<ModelHandle> {
        let ratings = training_ratings(data)?;
        Ok(Arc::new(BiasModel::fit(&ratings, Some(self.damping), Some(self.damping))?))
    }

    fn load(&self, bytes: &[u8]) -> Result<ModelHandle> {
        load_bias_model(bytes)
    }
}
