//! Loading the watched resource from disk.
//!
//! [`read_and_parse`] never fails: a missing or unreadable file degrades
//! to an empty reading list and a `read_failed` report.

use std::path::Path;

use crate::observe::PipelineObserver;
use crate::reading::{Reading, parse_readings};

/// Read the resource and parse it into readings.
pub async fn read_and_parse(path: &Path, observer: &dyn PipelineObserver) -> Vec<Reading> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_readings(&content, observer),
        Err(e) => {
            observer.read_failed(path, &e);
            Vec::new()
        }
    }
}

/// Return the raw, unparsed lines of the resource.
///
/// The whole content is trimmed, split on `\n`, and blank lines are
/// removed. Individual lines are otherwise returned as stored.
pub async fn read_raw_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .trim()
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect())
}
