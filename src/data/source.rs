// ============================================================
// Layer 4 — In-memory Rating Source
// ============================================================
// Partitions produced by the splitter live in memory. The
// fingerprint is computed once at construction so cache
// lookups never re-hash the ratings.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::fingerprint;
use crate::domain::rating::Rating;
use crate::domain::traits::RatingSource;

/// A rating partition held in memory.
#[derive(Clone)]
pub struct InMemoryRatings {
    ratings:     Arc<Vec<Rating>>,
    fingerprint: String,
}

impl InMemoryRatings {
    pub fn new(ratings: Vec<Rating>) -> Self {
        let fingerprint = fingerprint::of_ratings(&ratings);
        Self {
            ratings: Arc::new(ratings),
            fingerprint,
        }
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

impl RatingSource for InMemoryRatings {
    fn ratings(&self) -> Result<Arc<Vec<Rating>>> {
        Ok(Arc::clone(&self.ratings))
    }

    fn fingerprint(&self) -> Result<String> {
        Ok(self.fingerprint.clone())
    }
}

impl fmt::Debug for InMemoryRatings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRatings")
            .field("ratings", &self.ratings.len())
            .field("fingerprint", &&self.fingerprint[..12])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_the_same_ratings() {
        let source = InMemoryRatings::new(vec![Rating::new(1, 2, 3.0)]);
        let a = source.ratings().unwrap();
        let b = source.ratings().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.len(), 1);
        assert_eq!(source.fingerprint().unwrap().len(), 64);
    }
}
