//! Validated replacement of the watched resource.
//!
//! The writer never talks to the broadcaster. Persisting the file is
//! what makes the watcher emit `Modified`, so every client update still
//! flows through the single watch → parse → broadcast path.

use std::path::Path;

use crate::observe::PipelineObserver;
use crate::reading::is_valid_reading;

/// Format hint returned to callers whose submission had no valid entry.
pub const FORMAT_HINT: &str = "Format: 32C or 100F";

/// Errors from [`submit`].
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// No candidate matched the reading grammar. Nothing was written.
    #[error("No valid temperatures provided")]
    NoValidReadings,

    /// Writing the resource failed. Its previous content is left as is.
    #[error("failed to write temperature file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Outcome of a successful [`submit`].
///
/// The identities of rejected candidates are not retained, only how
/// many there were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Accepted tokens, trimmed, in submission order.
    pub accepted: Vec<String>,
    /// Number of candidates that failed validation.
    pub rejected_count: usize,
}

impl Submission {
    /// Number of accepted readings.
    pub fn count(&self) -> usize {
        self.accepted.len()
    }
}

/// Split candidates into the accepted (trimmed) tokens and a rejection count.
pub fn validate<S: AsRef<str>>(candidates: &[S]) -> Submission {
    let accepted: Vec<String> = candidates
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| is_valid_reading(c))
        .map(str::to_owned)
        .collect();
    let rejected_count = candidates.len().saturating_sub(accepted.len());
    Submission {
        accepted,
        rejected_count,
    }
}

/// Validate `candidates` and replace the resource with the valid subset.
///
/// Accepted tokens are written one per line with a trailing newline,
/// replacing the entire prior content in a single write.
pub async fn submit<S: AsRef<str>>(
    path: &Path,
    candidates: &[S],
    observer: &dyn PipelineObserver,
) -> Result<Submission, WriteError> {
    let submission = validate(candidates);
    if submission.accepted.is_empty() {
        return Err(WriteError::NoValidReadings);
    }

    let mut content = submission.accepted.join("\n");
    content.push('\n');
    tokio::fs::write(path, content).await?;

    observer.file_written(path, submission.count());
    Ok(submission)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::observe::{Diagnostic, RecordingObserver};

    #[tokio::test]
    async fn persists_only_the_valid_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        let observer = RecordingObserver::new();

        let submission = submit(&path, &["32C", "abc", "-5.5F"], &observer)
            .await
            .unwrap();

        assert_eq!(submission.count(), 2);
        assert_eq!(submission.accepted, vec!["32C", "-5.5F"]);
        assert_eq!(submission.rejected_count, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "32C\n-5.5F\n");
        assert_eq!(observer.entries(), vec![Diagnostic::FileWritten(2)]);
    }

    #[tokio::test]
    async fn invalid_unit_is_rejected_without_touching_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        std::fs::write(&path, "10C\n").unwrap();
        let observer = RecordingObserver::new();

        let err = submit(&path, &["200K"], &observer).await.unwrap_err();

        assert!(matches!(err, WriteError::NoValidReadings));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10C\n");
        assert!(observer.entries().is_empty());
    }

    #[tokio::test]
    async fn empty_submission_does_not_create_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        let observer = RecordingObserver::new();

        let empty: [&str; 0] = [];
        let err = submit(&path, &empty, &observer).await.unwrap_err();

        assert!(matches!(err, WriteError::NoValidReadings));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn replaces_the_entire_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        std::fs::write(&path, "1C\n2C\n3C\n4C\n").unwrap();
        let observer = RecordingObserver::new();

        submit(&path, &["  98.6f  "], &observer).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "98.6f\n");
    }

    #[tokio::test]
    async fn write_failure_surfaces_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("temperature.txt");
        let observer = RecordingObserver::new();

        let err = submit(&path, &["32C"], &observer).await.unwrap_err();

        assert!(matches!(err, WriteError::Io { .. }));
    }

    #[test]
    fn validation_counts_rejections() {
        let submission = validate(&["1C", "", "x", "2F", "3K"]);
        assert_eq!(submission.accepted, vec!["1C", "2F"]);
        assert_eq!(submission.rejected_count, 3);
    }
}
