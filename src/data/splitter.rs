// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Turns one pool of ratings into train/test DataSets:
//
//   holdout   → one shuffled split at a train fraction
//   crossfold → K disjoint test folds; each fold's training set
//               is every other fold
//
// Shuffles use a seeded StdRng so the same seed always yields
// the same partitions, which keeps data-set fingerprints (and
// therefore model-cache entries) stable across runs.

use std::sync::Arc;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::source::InMemoryRatings;
use crate::domain::data_set::DataSet;
use crate::domain::rating::Rating;

/// Shuffle `samples` with `seed` and split into (train, test).
///
/// `train_fraction` of the samples (rounded) go to training.
pub fn split_train_test<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let test = samples.split_off(split_at);

    tracing::debug!(
        "Holdout split: {} training, {} test",
        samples.len(),
        test.len(),
    );

    (samples, test)
}

/// Shuffle `samples` with `seed` and partition them into `folds`
/// (train, test) pairs. Test folds are disjoint and together cover
/// every sample exactly once.
pub fn crossfold<T: Clone>(mut samples: Vec<T>, folds: usize, seed: u64) -> Result<Vec<(Vec<T>, Vec<T>)>> {
    if folds < 2 {
        bail!("crossfold needs at least 2 folds, got {folds}");
    }
    if samples.len() < folds {
        bail!("cannot split {} samples into {folds} folds", samples.len());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let mut partitions: Vec<Vec<T>> = vec![Vec::new(); folds];
    for (i, sample) in samples.into_iter().enumerate() {
        partitions[i % folds].push(sample);
    }

    let splits = (0..folds)
        .map(|k| {
            let test = partitions[k].clone();
            let train = partitions
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, part)| part.iter().cloned())
                .collect();
            (train, test)
        })
        .collect();

    Ok(splits)
}

/// Crossfold `ratings` into data sets named `{name}-fold{k}` (k from 1),
/// each tagged with a `partition` attribute.
pub fn crossfold_data_sets(name: &str, ratings: Vec<Rating>, folds: usize, seed: u64) -> Result<Vec<DataSet>> {
    let data_sets: Vec<DataSet> = crossfold(ratings, folds, seed)?
        .into_iter()
        .enumerate()
        .map(|(k, (train, test))| {
            let fold = k + 1;
            DataSet::new(
                format!("{name}-fold{fold}"),
                Arc::new(InMemoryRatings::new(train)),
                Arc::new(InMemoryRatings::new(test)),
            )
            .with_attribute("partition", fold.to_string())
        })
        .collect();

    tracing::info!("Crossfolded '{}' into {} data sets", name, data_sets.len());
    Ok(data_sets)
}

/// A single holdout data set named `name`.
pub fn holdout_data_set(name: &str, ratings: Vec<Rating>, train_fraction: f64, seed: u64) -> DataSet {
    let (train, test) = split_train_test(ratings, train_fraction, seed);
    DataSet::new(
        name,
        Arc::new(InMemoryRatings::new(train)),
        Arc::new(InMemoryRatings::new(test)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::RatingSource;

    #[test]
    fn holdout_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, test) = split_train_test(items, 0.8, 1);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
    }

    #[test]
    fn holdout_is_reproducible_per_seed() {
        let items: Vec<usize> = (0..50).collect();
        let a = split_train_test(items.clone(), 0.7, 42);
        let b = split_train_test(items.clone(), 0.7, 42);
        let c = split_train_test(items, 0.7, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn holdout_edge_fractions() {
        let (train, test) = split_train_test(Vec::<usize>::new(), 0.8, 0);
        assert!(train.is_empty() && test.is_empty());

        let (train, test) = split_train_test((0..10).collect::<Vec<usize>>(), 1.0, 0);
        assert_eq!(train.len(), 10);
        assert!(test.is_empty());
    }

    #[test]
    fn crossfold_test_folds_cover_everything_once() {
        let items: Vec<usize> = (0..23).collect();
        let splits = crossfold(items, 5, 9).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|(_, test)| test.iter().copied()).collect();
        seen.sort();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), 23);
            assert!(test.iter().all(|t| !train.contains(t)));
        }
    }

    #[test]
    fn crossfold_rejects_bad_fold_counts() {
        assert!(crossfold(vec![1, 2, 3], 1, 0).is_err());
        assert!(crossfold(vec![1, 2], 3, 0).is_err());
    }

    #[test]
    fn crossfold_data_sets_are_named_and_tagged() {
        let ratings: Vec<Rating> = (0..10).map(|i| Rating::new(i, i % 3, 3.0)).collect();
        let sets = crossfold_data_sets("ML100K", ratings, 2, 7).unwrap();
        assert_eq!(sets[0].name(), "ML100K-fold1");
        assert_eq!(sets[1].name(), "ML100K-fold2");
        assert_eq!(sets[1].attribute("partition"), Some("2"));
        assert_eq!(sets[0].test().ratings().unwrap().len(), 5);
        assert_eq!(sets[0].train().ratings().unwrap().len(), 5);
    }
}
