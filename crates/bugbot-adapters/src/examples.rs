//! Accepted reports stored one JSON object per line, used as prompt examples.

use bugbot_core::{CanonicalReport, ExampleSource};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonlExampleSource {
    path: PathBuf,
}

impl JsonlExampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExampleSource for JsonlExampleSource {
    /// A missing or unreadable file yields no examples; malformed lines are skipped.
    fn examples(&self, limit: usize) -> Vec<CanonicalReport> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "no example reports loaded");
                return Vec::new();
            }
        };

        let mut parsed = Vec::new();
        for (line_no, line) in content.lines().map(str::trim).enumerate() {
            if parsed.len() >= limit {
                break;
            }
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CanonicalReport>(line) {
                Ok(report) => parsed.push(report),
                Err(err) => {
                    tracing::debug!(line = line_no + 1, error = %err, "skipping malformed example line")
                }
            }
        }
        parsed
    }
}
