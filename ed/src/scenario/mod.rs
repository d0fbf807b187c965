//! Passenger scenarios: the timed requests the floor stations replay

mod error;
mod file;
mod generate;

pub use error::ScenarioError;
pub use file::{format, load, parse, write};
pub use generate::{REQUIRED_PEOPLE, enforce_requirements, generate};

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;
use crate::domain::FloorRequest;

/// One passenger arriving `offset_ms` after the scenario starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioEntry {
    pub offset_ms: u64,
    pub request: FloorRequest,
}

/// Load `path`, falling back to a generated scenario
///
/// A missing file is generated and written so the next run replays it. A corrupted file is
/// left alone and a fresh scenario is used for this run only.
pub fn load_or_generate<R: Rng + ?Sized>(
    path: &Path,
    config: &Config,
    rng: &mut R,
) -> Result<Vec<ScenarioEntry>, ScenarioError> {
    match load(path, &config.building) {
        Ok(entries) => Ok(entries),
        Err(e) if e.is_not_found() => {
            warn!(path = %path.display(), "Scenario file not found, generating a new one");
            let entries = generate(config, rng);
            write(path, &entries)?;
            Ok(entries)
        }
        Err(e) if e.is_corrupted() => {
            warn!(
                path = %path.display(),
                error = %e,
                "Scenario file is corrupted; fix or delete it. Using a generated scenario for this run"
            );
            Ok(generate(config, rng))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_generated_and_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("InputFile.txt");
        let config = Config::default();

        let entries = load_or_generate(&path, &config, &mut StdRng::seed_from_u64(5)).unwrap();
        assert!(path.exists());
        assert_eq!(load(&path, &config.building).unwrap(), entries);
    }

    #[test]
    fn test_corrupted_file_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("InputFile.txt");
        std::fs::write(&path, "garbage\n").unwrap();
        let config = Config::default();

        let entries = load_or_generate(&path, &config, &mut StdRng::seed_from_u64(5)).unwrap();
        assert!(!entries.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage\n");
    }
}
