// ============================================================
// Layer 3 — WorkUnit and CacheKey
// ============================================================
// A WorkUnit is one (algorithm, data set, task) triple. The
// full set of units is the Cartesian product of the experiment
// definition, enumerated once in canonical order:
//
//   for data set → for algorithm → for task
//
// That order is the output order of every table, whatever
// order the units actually finish in.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::fingerprint::Fingerprinter;
use crate::domain::traits::EvalTask;

/// Identity of one trained model: hash of the algorithm
/// configuration fingerprint and the data-set identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(algorithm: &AlgorithmInstance, data: &DataSet) -> Self {
        let digest = Fingerprinter::new()
            .str_field("algorithm", algorithm.fingerprint())
            .str_field("data-set", &data.identity())
            .finish();
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for log lines
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// One unit of work. Immutable once enumerated.
#[derive(Clone)]
pub struct WorkUnit {
    index:      usize,
    pair:       usize,
    task_index: usize,
    algorithm:  Arc<AlgorithmInstance>,
    data_set:   Arc<DataSet>,
    task:       Arc<dyn EvalTask>,
    cache_key:  CacheKey,
}

impl WorkUnit {
    /// Position in the canonical enumeration.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Canonical index of the (data set, algorithm) pair; one output row each.
    pub fn pair(&self) -> usize {
        self.pair
    }

    /// Position of this unit's task in the experiment's task list.
    pub fn task_index(&self) -> usize {
        self.task_index
    }

    pub fn algorithm(&self) -> &AlgorithmInstance {
        &self.algorithm
    }

    pub fn data_set(&self) -> &DataSet {
        &self.data_set
    }

    pub fn task(&self) -> &dyn EvalTask {
        self.task.as_ref()
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}/{}/{}",
            self.index,
            self.data_set.name(),
            self.algorithm.name(),
            self.task.name()
        )
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("index", &self.index)
            .field("pair", &self.pair)
            .field("algorithm", &self.algorithm.name())
            .field("data_set", &self.data_set.name())
            .field("task", &self.task.name())
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

/// Enumerate the full work matrix in canonical order.
pub fn enumerate(
    algorithms: &[Arc<AlgorithmInstance>],
    data_sets:  &[Arc<DataSet>],
    tasks:      &[Arc<dyn EvalTask>],
) -> Vec<WorkUnit> {
    let mut units = Vec::with_capacity(algorithms.len() * data_sets.len() * tasks.len());

    for (d, data_set) in data_sets.iter().enumerate() {
        for (a, algorithm) in algorithms.iter().enumerate() {
            let pair = d * algorithms.len() + a;
            let cache_key = CacheKey::derive(algorithm, data_set);

            for (t, task) in tasks.iter().enumerate() {
                units.push(WorkUnit {
                    index: units.len(),
                    pair,
                    task_index: t,
                    algorithm: Arc::clone(algorithm),
                    data_set: Arc::clone(data_set),
                    task: Arc::clone(task),
                    cache_key: cache_key.clone(),
                });
            }
        }
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{algorithm, data_set, ScriptedTask};

    #[test]
    fn enumerates_data_sets_then_algorithms_then_tasks() {
        let algorithms = vec![algorithm("Popular", 1.0), algorithm("ItemKNN", 2.0)];
        let data_sets = vec![data_set("fold1"), data_set("fold2")];
        let tasks: Vec<Arc<dyn EvalTask>> = vec![
            Arc::new(ScriptedTask::new("predict", "RMSE")),
            Arc::new(ScriptedTask::new("recommend", "nDCG")),
        ];

        let units = enumerate(&algorithms, &data_sets, &tasks);
        assert_eq!(units.len(), 8);

        let labels: Vec<String> = units
            .iter()
            .map(|u| format!("{}/{}/{}", u.data_set().name(), u.algorithm().name(), u.task().name()))
            .collect();
        assert_eq!(labels[0], "fold1/Popular/predict");
        assert_eq!(labels[1], "fold1/Popular/recommend");
        assert_eq!(labels[2], "fold1/ItemKNN/predict");
        assert_eq!(labels[4], "fold2/Popular/predict");
        assert_eq!(labels[7], "fold2/ItemKNN/recommend");

        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.index(), i);
            assert_eq!(unit.pair(), i / 2);
            assert_eq!(unit.task_index(), i % 2);
        }
    }

    #[test]
    fn tasks_of_one_pair_share_a_cache_key() {
        let algorithms = vec![algorithm("A", 1.0), algorithm("B", 2.0)];
        let data_sets = vec![data_set("d1"), data_set("d2")];
        let tasks: Vec<Arc<dyn EvalTask>> = vec![
            Arc::new(ScriptedTask::new("t1", "M1")),
            Arc::new(ScriptedTask::new("t2", "M2")),
        ];
        let units = enumerate(&algorithms, &data_sets, &tasks);

        assert_eq!(units[0].cache_key(), units[1].cache_key());
        let mut keys: Vec<&CacheKey> = units.iter().map(|u| u.cache_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn empty_dimension_yields_no_units() {
        let tasks: Vec<Arc<dyn EvalTask>> = vec![Arc::new(ScriptedTask::new("t", "M"))];
        assert!(enumerate(&[], &[data_set("d")], &tasks).is_empty());
    }
}
