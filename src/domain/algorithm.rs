// ============================================================
// Layer 3 — AlgorithmInstance
// ============================================================
// A named algorithm configuration. The descriptor is opaque to
// the engine; its fingerprint (plus the optional seed) is what
// identifies the configuration in cache keys.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::fingerprint::{self, Fingerprinter};
use crate::domain::traits::Algorithm;

/// An immutable, fully built algorithm configuration.
#[derive(Clone)]
pub struct AlgorithmInstance {
    name:        String,
    descriptor:  Value,
    seed:        Option<u64>,
    attributes:  Vec<(String, String)>,
    fingerprint: String,
    algorithm:   Arc<dyn Algorithm>,
}

impl AlgorithmInstance {
    /// Create an instance from its name, configuration descriptor and
    /// the algorithm that builds models for it.
    ///
    /// The descriptor must identify the configuration completely: two
    /// instances with equal descriptors and seeds share cached models.
    pub fn new(
        name:       impl Into<String>,
        descriptor: Value,
        algorithm:  Arc<dyn Algorithm>,
    ) -> Self {
        let fingerprint = compute_fingerprint(&descriptor, None);
        Self {
            name: name.into(),
            descriptor,
            seed: None,
            attributes: Vec::new(),
            fingerprint,
            algorithm,
        }
    }

    /// Pin the algorithm's internal randomness. The seed is part of the
    /// configuration fingerprint.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.fingerprint = compute_fingerprint(&self.descriptor, self.seed);
        self
    }

    /// Attach a descriptive attribute emitted in the output tables.
    /// Setting an existing key replaces its value.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Stable hash over the descriptor and seed.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn algorithm(&self) -> &dyn Algorithm {
        self.algorithm.as_ref()
    }
}

impl fmt::Debug for AlgorithmInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmInstance")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("seed", &self.seed)
            .field("attributes", &self.attributes)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

fn compute_fingerprint(descriptor: &Value, seed: Option<u64>) -> String {
    let seed = seed.map(|s| s.to_string()).unwrap_or_default();
    Fingerprinter::new()
        .str_field("descriptor", &fingerprint::of_json(descriptor))
        .str_field("seed", &seed)
        .finish()
}
