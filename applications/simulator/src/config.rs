/// Simulator configuration
use crate::error::{Result, SimError};
use pulse_playback::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "pulse.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default = "default_simulation")]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub library: LibrarySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Simulated run length in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Simulated seconds per real second
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Heart rate at the start of the run
    #[serde(default = "default_resting_heart_rate")]
    pub resting_heart_rate: u32,

    /// Heart rate once warmed up
    #[serde(default = "default_working_heart_rate")]
    pub working_heart_rate: u32,

    /// Simulated seconds to reach the working heart rate
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    /// Maximum random deviation per sample, in bpm
    #[serde(default = "default_noise_bpm")]
    pub noise_bpm: u32,

    /// Simulated seconds between samples
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Probability that a sample is replaced by a sensor error
    #[serde(default)]
    pub dropout_rate: f64,

    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// JSON track list; the built-in demo pool is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SimulationSettings {
    /// Convert simulated time to wall-clock time
    pub fn real(&self, simulated: Duration) -> Duration {
        simulated.div_f64(self.time_scale)
    }

    /// Wall-clock length of the whole run
    pub fn real_duration(&self) -> Duration {
        self.real(Duration::from_secs(self.duration_secs))
    }

    /// Wall-clock time between samples
    pub fn real_sample_interval(&self) -> Duration {
        self.real(Duration::from_secs(self.sample_interval_secs))
    }
}

impl SimulatorConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist. Without one, `pulse.toml` in the working
    /// directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(SimError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (PULSE_SESSION__HISTORY_SIZE=...)
        settings = settings.add_source(
            config::Environment::with_prefix("PULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| SimError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| SimError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;

        if !(sim.time_scale.is_finite() && sim.time_scale > 0.0) {
            return Err(SimError::Config(
                "simulation.time_scale must be a positive number".to_string(),
            ));
        }
        if sim.duration_secs == 0 || sim.sample_interval_secs == 0 {
            return Err(SimError::Config(
                "simulation.duration_secs and simulation.sample_interval_secs must be positive"
                    .to_string(),
            ));
        }
        if sim.working_heart_rate < sim.resting_heart_rate {
            return Err(SimError::Config(format!(
                "working heart rate {} is below resting heart rate {}",
                sim.working_heart_rate, sim.resting_heart_rate
            )));
        }
        if !(0.0..=1.0).contains(&sim.dropout_rate) {
            return Err(SimError::Config(
                "simulation.dropout_rate must be between 0 and 1".to_string(),
            ));
        }
        if self.session.history_size < 2 {
            return Err(SimError::Config(
                "session.history_size must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}

// Default values
fn default_simulation() -> SimulationSettings {
    SimulationSettings {
        duration_secs: default_duration_secs(),
        time_scale: default_time_scale(),
        resting_heart_rate: default_resting_heart_rate(),
        working_heart_rate: default_working_heart_rate(),
        warmup_secs: default_warmup_secs(),
        noise_bpm: default_noise_bpm(),
        sample_interval_secs: default_sample_interval_secs(),
        dropout_rate: 0.0,
        seed: None,
    }
}

fn default_duration_secs() -> u64 {
    1800
}

fn default_time_scale() -> f64 {
    30.0
}

fn default_resting_heart_rate() -> u32 {
    95
}

fn default_working_heart_rate() -> u32 {
    162
}

fn default_warmup_secs() -> u64 {
    480
}

fn default_noise_bpm() -> u32 {
    4
}

fn default_sample_interval_secs() -> u64 {
    5
}

impl Default for SimulationSettings {
    fn default() -> Self {
        default_simulation()
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            simulation: default_simulation(),
            library: LibrarySettings::default(),
        }
    }
}
