//! Simulator configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working setup against a local backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ApiConfig;
use crate::error::{FleetError, Result};
use crate::model::{DriverFallback, GenerateRequest};
use crate::segment::DEFAULT_STEPS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub api: ApiConfig,
    /// Bin refresh period while the view is open.
    pub bin_poll_ms: u64,
    /// Route refresh period while a run is active.
    pub route_poll_ms: u64,
    /// Simulation tick period.
    pub tick_ms: u64,
    /// Interpolation steps per segment.
    pub interpolation_steps: usize,
    pub driver_fallback: DriverFallback,
    /// Auto-generate parameters. The date is chosen per request.
    pub threshold: u8,
    pub max_stops: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        let generate = GenerateRequest::default();
        Self {
            api: ApiConfig::default(),
            bin_poll_ms: 3000,
            route_poll_ms: 2000,
            tick_ms: 1000,
            interpolation_steps: DEFAULT_STEPS,
            driver_fallback: DriverFallback::default(),
            threshold: generate.threshold,
            max_stops: generate.max_stops,
        }
    }
}

impl FleetConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 || self.bin_poll_ms == 0 || self.route_poll_ms == 0 {
            return Err(FleetError::Config("intervals must be greater than zero".to_string()));
        }
        if self.interpolation_steps == 0 {
            return Err(FleetError::Config(
                "interpolation_steps must be at least 1".to_string(),
            ));
        }
        if self.threshold > 100 {
            return Err(FleetError::Config(format!(
                "threshold {} is not a fill percentage",
                self.threshold
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn bin_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bin_poll_ms)
    }

    pub fn route_poll_interval(&self) -> Duration {
        Duration::from_millis(self.route_poll_ms)
    }
}
