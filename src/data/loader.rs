// ============================================================
// Layer 4 — Ratings Loader
// ============================================================
// Reads delimited rating files with the csv crate.
//
// Accepted layout (one rating per line):
//   user<delim>item<delim>rating[<delim>timestamp]
//
// A leading header line is detected and skipped when its first
// field is not an integer. MovieLens `u.data` files use a tab
// delimiter; most exported files use a comma.
//
// Malformed lines are an error, not a warning: silently dropped
// ratings would change what every algorithm is trained on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};

use crate::domain::fingerprint;
use crate::domain::rating::Rating;
use crate::domain::traits::RatingSource;

/// Parses delimited rating files.
#[derive(Debug, Clone, Copy)]
pub struct RatingsLoader {
    delimiter: u8,
}

impl Default for RatingsLoader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl RatingsLoader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read every rating from `path`.
    pub fn load(&self, path: &Path) -> Result<Vec<Rating>> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read ratings file '{}'", path.display()))?;
        self.parse(&bytes)
            .with_context(|| format!("Cannot parse ratings file '{}'", path.display()))
    }

    /// Parse ratings from raw file contents.
    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<Rating>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut ratings = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed record on line {}", line + 1))?;

            // Skip a header line like "user,item,rating"
            if line == 0 && record.get(0).is_some_and(|f| f.parse::<u64>().is_err()) {
                continue;
            }

            if record.len() < 3 {
                bail!(
                    "Line {} has {} fields; expected user, item, rating",
                    line + 1,
                    record.len()
                );
            }

            let user: u64 = record[0]
                .parse()
                .with_context(|| format!("Bad user id '{}' on line {}", &record[0], line + 1))?;
            let item: u64 = record[1]
                .parse()
                .with_context(|| format!("Bad item id '{}' on line {}", &record[1], line + 1))?;
            let value: f64 = record[2]
                .parse()
                .with_context(|| format!("Bad rating '{}' on line {}", &record[2], line + 1))?;

            if !value.is_finite() {
                bail!("Non-finite rating on line {}", line + 1);
            }

            ratings.push(Rating::new(user, item, value));
        }

        tracing::debug!("Parsed {} ratings", ratings.len());
        Ok(ratings)
    }
}

/// A ratings file used directly as a train or test partition.
///
/// The file is read on first use and kept for the life of the
/// source, so every task of a run sees the same ratings and the
/// same fingerprint. Failed reads are not remembered.
#[derive(Clone)]
pub struct CsvRatingSource {
    path:        PathBuf,
    loader:      RatingsLoader,
    ratings:     OnceLock<Arc<Vec<Rating>>>,
    fingerprint: OnceLock<String>,
}

impl CsvRatingSource {
    pub fn new(path: impl Into<PathBuf>, loader: RatingsLoader) -> Self {
        Self {
            path:        path.into(),
            loader,
            ratings:     OnceLock::new(),
            fingerprint: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RatingSource for CsvRatingSource {
    fn ratings(&self) -> Result<Arc<Vec<Rating>>> {
        if let Some(ratings) = self.ratings.get() {
            return Ok(Arc::clone(ratings));
        }
        let loaded = Arc::new(self.loader.load(&self.path)?);
        Ok(Arc::clone(self.ratings.get_or_init(|| loaded)))
    }

    fn fingerprint(&self) -> Result<String> {
        if let Some(fingerprint) = self.fingerprint.get() {
            return Ok(fingerprint.clone());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Cannot read ratings file '{}'", self.path.display()))?;
        Ok(self.fingerprint.get_or_init(|| fingerprint::of_bytes(&bytes)).clone())
    }
}

impl fmt::Debug for CsvRatingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvRatingSource")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_header() {
        let loader = RatingsLoader::default();
        let with_header = loader.parse(b"user,item,rating\n1,10,4.0\n2,10,3.5\n").unwrap();
        let without = loader.parse(b"1,10,4.0\n2,10,3.5\n").unwrap();
        assert_eq!(with_header, without);
        assert_eq!(with_header[1], Rating::new(2, 10, 3.5));
    }

    #[test]
    fn parses_tab_separated_with_timestamps() {
        let loader = RatingsLoader::new(b'\t');
        let ratings = loader.parse(b"196\t242\t3\t881250949\n186\t302\t3\t891717742\n").unwrap();
        assert_eq!(ratings, vec![Rating::new(196, 242, 3.0), Rating::new(186, 302, 3.0)]);
    }

    #[test]
    fn rejects_malformed_lines() {
        let loader = RatingsLoader::default();
        assert!(loader.parse(b"1,10,4.0\n2,oops,3.0\n").is_err());
        assert!(loader.parse(b"1,10\n").is_err());
        assert!(loader.parse(b"1,10,NaN\n").is_err());
    }

    #[test]
    fn csv_source_reads_and_fingerprints_the_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "1,10,4.0\n").unwrap();

        let source = CsvRatingSource::new(&path, RatingsLoader::default());
        let ratings = source.ratings().unwrap();
        assert_eq!(ratings.len(), 1);
        let before = source.fingerprint().unwrap();

        // The source keeps what it first read
        fs::write(&path, "1,10,5.0\n2,10,1.0\n").unwrap();
        assert!(Arc::ptr_eq(&ratings, &source.ratings().unwrap()));
        assert_eq!(before, source.fingerprint().unwrap());

        // A new source sees the edit
        let reopened = CsvRatingSource::new(&path, RatingsLoader::default());
        assert_eq!(reopened.ratings().unwrap().len(), 2);
        assert_ne!(before, reopened.fingerprint().unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let source = CsvRatingSource::new("/definitely/not/here.csv", RatingsLoader::default());
        assert!(source.ratings().is_err());
        assert!(source.fingerprint().is_err());
    }
}
