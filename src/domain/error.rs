//! Top-level error taxonomy.
//!
//! Only the two fatal classes cross the coordinator boundary. Per-unit
//! failures (model build, task evaluation) are recorded as
//! [`FailureRecord`](crate::domain::FailureRecord)s and never raised.

use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Failure of a whole experiment run.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Structurally invalid experiment definition. Detected before any
    /// unit runs; no output is produced.
    #[error("invalid experiment configuration: {0}")]
    Configuration(String),

    /// Environment failure: cache directory unusable, output sink
    /// unwritable, worker pool unavailable. Aborts the run.
    #[error("resource failure: {context}: {source}")]
    Resource {
        context: String,
        #[source]
        source:  Arc<io::Error>,
    },
}

impl ExperimentError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Takes an owned or an already shared `io::Error`; a shared one
    /// is kept as is so the original cause stays reachable.
    pub fn resource(context: impl Into<String>, source: impl Into<Arc<io::Error>>) -> Self {
        Self::Resource {
            context: context.into(),
            source:  source.into(),
        }
    }

    /// Resource failure attributed to a filesystem path.
    pub fn path(action: &str, path: &Path, source: impl Into<Arc<io::Error>>) -> Self {
        Self::resource(format!("cannot {action} '{}'", path.display()), source)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_cause() {
        let err = ExperimentError::configuration("no algorithms declared");
        assert_eq!(err.to_string(), "invalid experiment configuration: no algorithms declared");
        assert!(err.is_configuration());

        let err = ExperimentError::path(
            "create output file",
            Path::new("/out/results.csv"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_resource());
        assert_eq!(
            err.to_string(),
            "resource failure: cannot create output file '/out/results.csv': denied"
        );
    }
}
