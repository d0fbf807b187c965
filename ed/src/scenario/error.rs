//! Scenario file error types

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::Floor;

/// Errors raised while reading, writing or generating a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scenario line {line} is corrupted: {reason}")]
    Corrupted { line: usize, reason: String },

    #[error("Scenario line {line} names floor {floor}, outside the building")]
    FloorOutOfRange { line: usize, floor: Floor },

    #[error("Scenario requirements cannot be enforced: {0}")]
    Requirements(String),
}

impl ScenarioError {
    /// Check if the scenario file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScenarioError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if the file exists but its content is unusable
    pub fn is_corrupted(&self) -> bool {
        matches!(
            self,
            ScenarioError::Corrupted { .. } | ScenarioError::FloorOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let missing = ScenarioError::Io {
            path: PathBuf::from("nope.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_corrupted());
        assert!(missing.to_string().contains("nope.txt"));

        let bad = ScenarioError::FloorOutOfRange { line: 3, floor: 40 };
        assert!(bad.is_corrupted());
        assert!(!bad.is_not_found());
    }
}
