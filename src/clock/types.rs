//! Clock data types

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Whether the epoch tracks the wall clock or is driven by `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    Live,
    Simulated,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Live => f.write_str("live"),
            ClockMode::Simulated => f.write_str("simulated"),
        }
    }
}

/// Tick-source state. Speed 0 while `Running` is not the same as `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Stopped => f.write_str("Stopped"),
            RunState::Running => f.write_str("Running"),
            RunState::Paused => f.write_str("Paused"),
        }
    }
}

/// A UTC instant together with the clock settings it was read under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationEpoch {
    pub instant: DateTime<Utc>,
    pub speed_multiplier: f64,
    pub mode: ClockMode,
}

impl SimulationEpoch {
    /// Simulated-mode epoch at `instant` with unit speed.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            speed_multiplier: 1.0,
            mode: ClockMode::Simulated,
        }
    }

    /// Signed distance `self - earlier`.
    pub fn since(&self, earlier: &SimulationEpoch) -> TimeDelta {
        self.instant.signed_duration_since(earlier.instant)
    }
}

impl From<DateTime<Utc>> for SimulationEpoch {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::at(instant)
    }
}
