//! elevatord configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DispatcherConfig;
use crate::domain::{CarId, Floor};
use crate::scheduler::SchedulerConfig;

/// Main elevatord configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Building dimensions
    pub building: BuildingConfig,

    /// Simulated action durations
    pub timing: TimingConfig,

    /// Coordinator loop settings
    pub scheduler: SchedulerConfig,

    /// Transport settings
    pub dispatcher: DispatcherConfig,

    /// Scenario file and generation limits
    pub scenario: ScenarioConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.building.floors < 2 {
            return Err(eyre::eyre!(
                "building.floors must be at least 2 (got {})",
                self.building.floors
            ));
        }
        if self.building.elevators == 0 {
            return Err(eyre::eyre!("building.elevators must be at least 1"));
        }
        if self.timing.speed_factor == 0 {
            return Err(eyre::eyre!("timing.speed-factor must be at least 1"));
        }
        if self.scenario.min_people > self.scenario.max_people {
            return Err(eyre::eyre!(
                "scenario.min-people ({}) exceeds scenario.max-people ({})",
                self.scenario.min_people,
                self.scenario.max_people
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .elevatord.yml
        let local_config = PathBuf::from(".elevatord.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/elevatord/elevatord.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("elevatord").join("elevatord.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Building dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    /// Number of floors, numbered from 1
    pub floors: Floor,

    /// Number of cars, numbered from 1
    pub elevators: CarId,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            floors: 22,
            elevators: 4,
        }
    }
}

impl BuildingConfig {
    pub fn contains_floor(&self, floor: Floor) -> bool {
        (1..=self.floors).contains(&floor)
    }

    pub fn contains_car(&self, car_id: CarId) -> bool {
        (1..=self.elevators).contains(&car_id)
    }
}

/// Durations of car actions in abstract units (one unit is one simulated second)
///
/// The assignment algorithm estimates with the raw units; the car simulator sleeps for
/// `units / speed-factor` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub start: u64,
    pub idle: u64,

    /// Leaving a standstill, first floor of a trip
    pub moving: u64,

    /// Cruising, every further floor
    #[serde(rename = "moving-max")]
    pub moving_max: u64,

    /// One door operation (open or close)
    pub doors: u64,

    /// Decelerating into a floor
    pub stop: u64,

    pub reboot: u64,
    pub dead: u64,

    /// Divides every simulated duration
    #[serde(rename = "speed-factor")]
    pub speed_factor: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start: 1,
            idle: 0,
            moving: 5,
            moving_max: 3,
            doors: 3,
            stop: 7,
            reboot: 10,
            dead: 5,
            speed_factor: 10,
        }
    }
}

impl TimingConfig {
    /// Wall-clock duration of `units`, scaled by the speed factor
    pub fn scaled(&self, units: u64) -> Duration {
        Duration::from_millis(units * 1000 / self.speed_factor.max(1))
    }
}

/// Scenario input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Scenario file read by `run` when no file is given on the command line
    pub file: PathBuf,

    /// Upper bound on generated passengers
    #[serde(rename = "max-people")]
    pub max_people: usize,

    /// Lower bound on generated passengers
    #[serde(rename = "min-people")]
    pub min_people: usize,

    /// Latest request offset a generated scenario may use
    #[serde(rename = "max-duration-ms")]
    pub max_duration_ms: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("InputFile.txt"),
            max_people: 15,
            min_people: 10,
            max_duration_ms: 60_000,
        }
    }
}
