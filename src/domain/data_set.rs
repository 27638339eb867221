// ============================================================
// Layer 3 — DataSet Domain Type
// ============================================================
// A named train/test pair. The partitions are opaque sources
// owned by the data layer; the engine only asks for identity
// (name + attributes) and, for cache freshness, the training
// partition's content fingerprint.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::fingerprint::Fingerprinter;
use crate::domain::traits::RatingSource;

/// An immutable train/test data set.
#[derive(Clone)]
pub struct DataSet {
    name:       String,
    attributes: Vec<(String, String)>,
    train:      Arc<dyn RatingSource>,
    test:       Arc<dyn RatingSource>,
}

impl DataSet {
    pub fn new(
        name:  impl Into<String>,
        train: Arc<dyn RatingSource>,
        test:  Arc<dyn RatingSource>,
    ) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            train,
            test,
        }
    }

    /// Attach a descriptive attribute propagated into output rows.
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

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn train(&self) -> &dyn RatingSource {
        self.train.as_ref()
    }

    pub fn test(&self) -> &dyn RatingSource {
        self.test.as_ref()
    }

    /// Stable identity used in cache keys: a hash of the name and the
    /// descriptive attributes.
    pub fn identity(&self) -> String {
        let mut fp = Fingerprinter::new().str_field("name", &self.name);
        for (k, v) in &self.attributes {
            fp = fp.str_field("attr-key", k).str_field("attr-value", v);
        }
        fp.finish()
    }

    /// Freshness marker for models trained on this data set.
    pub fn training_fingerprint(&self) -> Result<String> {
        self.train.fingerprint()
    }
}

impl fmt::Debug for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSet")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("train", &self.train)
            .field("test", &self.test)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::InMemoryRatings;
    use crate::domain::rating::Rating;

    fn data_set(name: &str, ratings: Vec<Rating>) -> DataSet {
        let train = Arc::new(InMemoryRatings::new(ratings));
        let test = Arc::new(InMemoryRatings::new(vec![Rating::new(1, 1, 1.0)]));
        DataSet::new(name, train, test)
    }

    #[test]
    fn identity_depends_on_name_and_attributes_only() {
        let a = data_set("ML100K-fold1", vec![Rating::new(1, 2, 3.0)]);
        let b = data_set("ML100K-fold1", vec![Rating::new(5, 5, 5.0)]);
        assert_eq!(a.identity(), b.identity());

        let c = a.clone().with_attribute("partition", "1");
        assert_ne!(a.identity(), c.identity());
        assert_ne!(a.identity(), data_set("ML100K-fold2", vec![]).identity());
    }

    #[test]
    fn training_fingerprint_tracks_train_content() {
        let a = data_set("d", vec![Rating::new(1, 2, 3.0)]);
        let b = data_set("d", vec![Rating::new(1, 2, 4.0)]);
        assert_ne!(
            a.training_fingerprint().unwrap(),
            b.training_fingerprint().unwrap()
        );
    }
}
