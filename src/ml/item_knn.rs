// ============================================================
// Layer 5b — Item-Item kNN
// ============================================================
// Neighbourhood collaborative filtering over items.
//
// Training:
//   1. Fit a damped user-item bias baseline
//   2. Residual r̃_ui = r_ui − baseline(u, i)
//   3. Cosine similarity between item residual vectors,
//      accumulated over co-rating users
//   4. Keep the `model_size` most similar positive neighbours
//      of every item
//
// Scoring (u, i):
//   take the `neighbors` most similar items to i that u rated,
//   score = baseline(u, i) + Σ sim · r̃_uj / Σ |sim|
//
// Without any usable neighbour there is no prediction, which
// the predict task reports as reduced coverage.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::data_set::DataSet;
use crate::domain::traits::{Algorithm, ModelHandle, TrainedModel};
use crate::ml::baselines::{training_ratings, BiasModel};

/// Item-item collaborative filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemKnn {
    /// Neighbours used per prediction.
    pub neighbors:      usize,
    /// Neighbours retained per item in the trained model.
    pub model_size:     usize,
    /// Similarities at or below this are dropped.
    pub min_similarity: f64,
    /// Damping of the bias baseline.
    pub damping:        f64,
}

impl Default for ItemKnn {
    fn default() -> Self {
        Self {
            neighbors:      20,
            model_size:     200,
            min_similarity: 1e-6,
            damping:        5.0,
        }
    }
}

/// Trained neighbourhood model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemKnnModel {
    baseline:     BiasModel,
    neighbors:    usize,
    /// item → neighbours, most similar first
    similarities: HashMap<u64, Vec<(u64, f64)>>,
    /// user → item → residual
    residuals:    HashMap<u64, HashMap<u64, f64>>,
}

impl Algorithm for ItemKnn {
    fn build(&self, data: &DataSet) -> Result<ModelHandle> {
        let ratings = training_ratings(data)?;
        let baseline = BiasModel::fit(&ratings, Some(self.damping), Some(self.damping))?;

        // ── Residuals ─────────────────────────────────────────────────────────
        let mut residuals: HashMap<u64, HashMap<u64, f64>> = HashMap::new();
        let mut norms: HashMap<u64, f64> = HashMap::new();
        for r in ratings.iter() {
            let residual = r.value - baseline.baseline(r.user, r.item);
            residuals.entry(r.user).or_default().insert(r.item, residual);
            *norms.entry(r.item).or_default() += residual * residual;
        }

        // ── Co-rating dot products ────────────────────────────────────────────
        let mut dots: HashMap<(u64, u64), f64> = HashMap::new();
        for items in residuals.values() {
            let rated: Vec<(u64, f64)> = items.iter().map(|(i, r)| (*i, *r)).collect();
            for (a, &(i, ri)) in rated.iter().enumerate() {
                for &(j, rj) in &rated[a + 1..] {
                    let key = if i < j { (i, j) } else { (j, i) };
                    *dots.entry(key).or_default() += ri * rj;
                }
            }
        }

        // ── Truncated neighbour lists ─────────────────────────────────────────
        let mut similarities: HashMap<u64, Vec<(u64, f64)>> = HashMap::new();
        for ((i, j), dot) in dots {
            let denominator = (norms[&i] * norms[&j]).sqrt();
            if denominator <= 0.0 {
                continue;
            }
            let similarity = dot / denominator;
            if similarity > self.min_similarity {
                similarities.entry(i).or_default().push((j, similarity));
                similarities.entry(j).or_default().push((i, similarity));
            }
        }
        for neighbours in similarities.values_mut() {
            neighbours.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            neighbours.truncate(self.model_size);
        }

        tracing::debug!(
            "Item kNN on '{}': {} items with neighbours, {} users",
            data.name(),
            similarities.len(),
            residuals.len()
        );

        Ok(Arc::new(ItemKnnModel {
            baseline,
            neighbors: self.neighbors,
            similarities,
            residuals,
        }))
    }

    fn load(&self, bytes: &[u8]) -> Result<ModelHandle> {
        let model: ItemKnnModel = serde_json::from_slice(bytes).context("Cannot decode item kNN model")?;
        Ok(Arc::new(model))
    }
}

impl TrainedModel for ItemKnnModel {
    fn predict(&self, user: u64, item: u64) -> Option<f64> {
        let rated = self.residuals.get(&user)?;
        let neighbours = self.similarities.get(&item)?;

        let (weighted, total) = neighbours
            .iter()
            .filter_map(|(j, sim)| rated.get(j).map(|r| (sim, r)))
            .take(self.neighbors)
            .fold((0.0, 0.0), |(w, t), (sim, r)| (w + sim * r, t + sim.abs()));

        if total <= 0.0 {
            return None;
        }
        Some(self.baseline.baseline(user, item) + weighted / total)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Cannot serialise item kNN model")
    }
}
