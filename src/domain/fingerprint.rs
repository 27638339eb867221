//! Stable content fingerprints.
//!
//! Every field fed into a [`Fingerprinter`] is length-prefixed, so
//! `("ab", "c")` and `("a", "bc")` never collide.

use sha2::{Digest, Sha256};

use crate::domain::rating::Rating;

/// Incremental SHA-256 builder producing lowercase hex digests.
#[derive(Clone, Default)]
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one labelled field.
    pub fn field(mut self, label: &str, value: &[u8]) -> Self {
        self.push(label.as_bytes());
        self.push(value);
        self
    }

    pub fn str_field(self, label: &str, value: &str) -> Self {
        self.field(label, value.as_bytes())
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }

    fn push(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}

/// Fingerprint of a JSON descriptor.
///
/// `serde_json::Value` keeps object keys sorted, so two descriptors that
/// differ only in key order hash identically.
pub fn of_json(value: &serde_json::Value) -> String {
    Fingerprinter::new()
        .str_field("json", &value.to_string())
        .finish()
}

/// Fingerprint of raw bytes, e.g. a ratings file.
pub fn of_bytes(bytes: &[u8]) -> String {
    Fingerprinter::new().field("bytes", bytes).finish()
}

/// Order-sensitive fingerprint of a rating slice.
pub fn of_ratings(ratings: &[Rating]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((ratings.len() as u64).to_le_bytes());
    for r in ratings {
        hasher.update(r.user.to_le_bytes());
        hasher.update(r.item.to_le_bytes());
        hasher.update(r.value.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_are_length_prefixed() {
        let a = Fingerprinter::new().str_field("x", "ab").str_field("y", "c").finish();
        let b = Fingerprinter::new().str_field("x", "a").str_field("y", "bc").finish();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn json_fingerprint_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"k": 5, "type": "item-knn"}"#).unwrap();
        let b = json!({"type": "item-knn", "k": 5});
        assert_eq!(of_json(&a), of_json(&b));
        assert_ne!(of_json(&b), of_json(&json!({"type": "item-knn", "k": 6})));
    }

    #[test]
    fn rating_fingerprint_tracks_content() {
        let base = vec![Rating::new(1, 2, 3.0), Rating::new(2, 2, 4.0)];
        let mut edited = base.clone();
        edited[1].value = 4.5;
        assert_eq!(of_ratings(&base), of_ratings(&base.clone()));
        assert_ne!(of_ratings(&base), of_ratings(&edited));
    }
}
