// ============================================================
// Layer 2 — Experiment Spec Loader
// ============================================================
// Reads an experiment definition from JSON and turns it into an
// ExperimentBuilder using the built-in algorithms, data-set
// providers and tasks.
//
// Example:
//   {
//     "output_file": "results.csv",
//     "user_output_file": "users.csv",
//     "cache_directory": "models",
//     "algorithms": [
//       { "name": "Popular", "type": "item-mean", "damping": 5 },
//       { "name": "ItemKNN", "type": "item-knn", "neighbors": 30 }
//     ],
//     "data_sets": [
//       { "type": "crossfold", "name": "ML100K",
//         "source": "ml-100k/u.data", "delimiter": "\t", "folds": 5 }
//     ],
//     "tasks": [ { "type": "predict", "name": "predict-accuracy" } ]
//   }
//
// Relative paths in a file loaded with load() are resolved
// against the directory containing that file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::experiment::ExperimentBuilder;
use crate::data::loader::{CsvRatingSource, RatingsLoader};
use crate::data::splitter::{crossfold_data_sets, holdout_data_set};
use crate::domain::algorithm::AlgorithmInstance;
use crate::domain::data_set::DataSet;
use crate::domain::traits::Algorithm;
use crate::ml::baselines::{GlobalMean, ItemMean, UserItemBias};
use crate::ml::item_knn::ItemKnn;
use crate::ml::predict_task::PredictTask;

fn default_damping() -> f64 {
    5.0
}

fn default_delimiter() -> char {
    ','
}

fn default_train_fraction() -> f64 {
    0.8
}

fn default_predict_name() -> String {
    "predict".to_string()
}

// ─── Document types ───────────────────────────────────────────────────────────

/// A complete experiment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentSpec {
    #[serde(default)]
    pub output_file:      Option<PathBuf>,
    #[serde(default)]
    pub user_output_file: Option<PathBuf>,
    #[serde(default)]
    pub cache_directory:  Option<PathBuf>,
    #[serde(default)]
    pub threads:          Option<usize>,
    pub algorithms:       Vec<AlgorithmSpec>,
    pub data_sets:        Vec<DataSetSpec>,
    pub tasks:            Vec<TaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    pub name:       String,
    #[serde(flatten)]
    pub kind:       AlgorithmKind,
    #[serde(default)]
    pub seed:       Option<u64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Built-in algorithm and its hyperparameters. The serialised form
/// is the configuration descriptor that identifies cached models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AlgorithmKind {
    GlobalMean,
    ItemMean {
        #[serde(default = "default_damping")]
        damping: f64,
    },
    UserItemBias {
        #[serde(default = "default_damping")]
        damping: f64,
    },
    ItemKnn {
        #[serde(default)]
        neighbors:      Option<usize>,
        #[serde(default)]
        model_size:     Option<usize>,
        #[serde(default)]
        min_similarity: Option<f64>,
        #[serde(default)]
        damping:        Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DataSetSpec {
    /// K-fold partition of one ratings file.
    Crossfold {
        name:       String,
        source:     PathBuf,
        folds:      usize,
        #[serde(default = "default_delimiter")]
        delimiter:  char,
        #[serde(default)]
        seed:       u64,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
    /// Single random train/test split of one ratings file.
    Holdout {
        name:           String,
        source:         PathBuf,
        #[serde(default = "default_train_fraction")]
        train_fraction: f64,
        #[serde(default = "default_delimiter")]
        delimiter:      char,
        #[serde(default)]
        seed:           u64,
        #[serde(default)]
        attributes:     BTreeMap<String, String>,
    },
    /// Pre-split train and test files.
    Split {
        name:       String,
        train:      PathBuf,
        test:       PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter:  char,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskSpec {
    Predict {
        #[serde(default = "default_predict_name")]
        name:   String,
        #[serde(default)]
        prefix: Option<String>,
    },
}

// ─── Loading ──────────────────────────────────────────────────────────────────

impl ExperimentSpec {
    /// Read and parse a spec file, resolving relative paths against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read experiment spec '{}'", path.display()))?;
        let mut spec = Self::parse(&json)
            .with_context(|| format!("Invalid experiment spec '{}'", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        spec.resolve_paths(base);
        tracing::info!("Loaded experiment spec '{}'", path.display());
        Ok(spec)
    }

    /// Parse a spec from a JSON string. Paths are left as written.
    pub fn parse(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json).context("Cannot parse experiment spec")?;
        Ok(spec)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        self.output_file.iter_mut().for_each(resolve);
        self.user_output_file.iter_mut().for_each(resolve);
        self.cache_directory.iter_mut().for_each(resolve);

        for data_set in &mut self.data_sets {
            match data_set {
                DataSetSpec::Crossfold { source, .. } | DataSetSpec::Holdout { source, .. } => resolve(source),
                DataSetSpec::Split { train, test, .. } => {
                    resolve(train);
                    resolve(test);
                }
            }
        }
    }

    /// Instantiate every algorithm, data set and task.
    ///
    /// Crossfold and holdout sources are read and split here.
    pub fn into_builder(&self) -> Result<ExperimentBuilder> {
        let mut builder = ExperimentBuilder::new();

        if let Some(path) = &self.output_file {
            builder = builder.output_file(path);
        }
        if let Some(path) = &self.user_output_file {
            builder = builder.user_output_file(path);
        }
        if let Some(path) = &self.cache_directory {
            builder = builder.cache_directory(path);
        }
        if let Some(threads) = self.threads {
            builder = builder.threads(threads);
        }

        for spec in &self.algorithms {
            builder = builder.add_algorithm(spec.instantiate()?);
        }
        for spec in &self.data_sets {
            builder = builder.add_data_sets(spec.instantiate()?);
        }
        for spec in &self.tasks {
            builder = match spec {
                TaskSpec::Predict { name, prefix } => {
                    let task = PredictTask::new(name.as_str());
                    builder.add_task(match prefix {
                        Some(prefix) => task.with_prefix(prefix.as_str()),
                        None => task,
                    })
                }
            };
        }

        Ok(builder)
    }
}

impl AlgorithmSpec {
    pub fn instantiate(&self) -> Result<AlgorithmInstance> {
        if let Some(damping) = self.kind.damping() {
            // n + damping divides every damped mean
            if !(damping.is_finite() && damping >= 0.0) {
                bail!("damping of algorithm '{}' must be a non-negative number, got {damping}", self.name);
            }
        }

        let algorithm: Arc<dyn Algorithm> = match &self.kind {
            AlgorithmKind::GlobalMean => Arc::new(GlobalMean),
            AlgorithmKind::ItemMean { damping } => Arc::new(ItemMean { damping: *damping }),
            AlgorithmKind::UserItemBias { damping } => Arc::new(UserItemBias { damping: *damping }),
            AlgorithmKind::ItemKnn { neighbors, model_size, min_similarity, damping } => {
                let defaults = ItemKnn::default();
                Arc::new(ItemKnn {
                    neighbors:      neighbors.unwrap_or(defaults.neighbors),
                    model_size:     model_size.unwrap_or(defaults.model_size),
                    min_similarity: min_similarity.unwrap_or(defaults.min_similarity),
                    damping:        damping.unwrap_or(defaults.damping),
                })
            }
        };

        let descriptor = serde_json::to_value(&self.kind)
            .with_context(|| format!("Cannot describe algorithm '{}'", self.name))?;

        let mut instance = AlgorithmInstance::new(self.name.as_str(), descriptor, algorithm);
        if let Some(seed) = self.seed {
            instance = instance.with_seed(seed);
        }
        for (key, value) in &self.attributes {
            instance = instance.with_attribute(key.as_str(), value.as_str());
        }
        Ok(instance)
    }
}

impl AlgorithmKind {
    /// The configured damping term, if this kind has one.
    fn damping(&self) -> Option<f64> {
        match self {
            AlgorithmKind::GlobalMean => None,
            AlgorithmKind::ItemMean { damping } | AlgorithmKind::UserItemBias { damping } => Some(*damping),
            AlgorithmKind::ItemKnn { damping, .. } => *damping,
        }
    }
}

impl DataSetSpec {
    pub fn instantiate(&self) -> Result<Vec<DataSet>> {
        let data_sets = match self {
            DataSetSpec::Crossfold { name, source, folds, delimiter, seed, .. } => {
                let ratings = loader(*delimiter)?.load(source)?;
                crossfold_data_sets(name, ratings, *folds, *seed)
                    .with_context(|| format!("Cannot crossfold data set '{name}'"))?
            }
            DataSetSpec::Holdout { name, source, train_fraction, delimiter, seed, .. } => {
                if !(0.0..=1.0).contains(train_fraction) {
                    bail!("train_fraction of '{name}' must be between 0 and 1, got {train_fraction}");
                }
                let ratings = loader(*delimiter)?.load(source)?;
                vec![holdout_data_set(name, ratings, *train_fraction, *seed)]
            }
            DataSetSpec::Split { name, train, test, delimiter, .. } => {
                let loader = loader(*delimiter)?;
                vec![DataSet::new(
                    name.as_str(),
                    Arc::new(CsvRatingSource::new(train, loader)),
                    Arc::new(CsvRatingSource::new(test, loader)),
                )]
            }
        };

        let attributes = match self {
            DataSetSpec::Crossfold { attributes, .. }
            | DataSetSpec::Holdout { attributes, .. }
            | DataSetSpec::Split { attributes, .. } => attributes,
        };

        Ok(data_sets
            .into_iter()
            .map(|d| {
                attributes
                    .iter()
                    .fold(d, |d, (k, v)| d.with_attribute(k.as_str(), v.as_str()))
            })
            .collect())
    }
}

fn loader(delimiter: char) -> Result<RatingsLoader> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got '{delimiter}'");
    }
    Ok(RatingsLoader::new(delimiter as u8))
}
