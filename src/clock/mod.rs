//! Simulation clock
//!
//! The authoritative virtual time source. The clock holds no thread or timer of
//! its own: an external scheduler (the Bevy `Update` schedule in this crate)
//! calls [`SimulationClock::advance`] once per tick with the elapsed wall time.
//!
//! `SimulationClock` is a cheap-to-clone handle; every clone shares the same
//! state behind a single mutex that is held only for a read or a transition.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bevy::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::config::ClockConfig;
use crate::error::ClockError;
use crate::plugin::TickSet;

pub mod types;
pub mod wall;

pub use types::{ClockMode, RunState, SimulationEpoch};
pub use wall::{ManualWallClock, SystemWallClock, WallClock};

struct ClockState {
    epoch: DateTime<Utc>,
    speed: f64,
    mode: ClockMode,
    status: RunState,
}

/// Shared handle to the simulation clock
#[derive(Resource, Clone)]
pub struct SimulationClock {
    state: Arc<Mutex<ClockState>>,
    wall: Arc<dyn WallClock>,
    max_speed: f64,
}

impl SimulationClock {
    /// Clock starting at the wall clock's "now", in `Stopped` state.
    pub fn new(config: &ClockConfig, wall: Arc<dyn WallClock>) -> Self {
        let epoch = wall.wall_now();
        Self::build(config, wall, epoch, config.initial_mode)
    }

    /// Simulated-mode clock starting at `epoch`, in `Stopped` state.
    pub fn with_epoch(config: &ClockConfig, wall: Arc<dyn WallClock>, epoch: DateTime<Utc>) -> Self {
        Self::build(config, wall, epoch, ClockMode::Simulated)
    }

    fn build(
        config: &ClockConfig,
        wall: Arc<dyn WallClock>,
        epoch: DateTime<Utc>,
        mode: ClockMode,
    ) -> Self {
        let max_speed = if config.max_speed.is_finite() {
            config.max_speed.abs()
        } else {
            crate::config::DEFAULT_MAX_SPEED
        };
        let speed = if config.initial_speed.is_finite() {
            config.initial_speed.clamp(-max_speed, max_speed)
        } else {
            1.0_f64.min(max_speed)
        };
        Self {
            state: Arc::new(Mutex::new(ClockState {
                epoch,
                speed,
                mode,
                status: RunState::Stopped,
            })),
            wall,
            max_speed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(state: &ClockState) -> SimulationEpoch {
        SimulationEpoch {
            instant: state.epoch,
            speed_multiplier: state.speed,
            mode: state.mode,
        }
    }

    /// Current authoritative instant. Never blocks beyond the state lock.
    pub fn now(&self) -> SimulationEpoch {
        let mut state = self.lock();
        if state.mode == ClockMode::Live {
            state.epoch = self.wall.wall_now();
        }
        Self::snapshot(&state)
    }

    pub fn mode(&self) -> ClockMode {
        self.lock().mode
    }

    pub fn status(&self) -> RunState {
        self.lock().status
    }

    pub fn speed(&self) -> f64 {
        self.lock().speed
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Switching to `Live` snaps the epoch to wall time; switching to
    /// `Simulated` freezes it where it is.
    pub fn set_mode(&self, mode: ClockMode) {
        let mut state = self.lock();
        if mode == ClockMode::Live {
            state.epoch = self.wall.wall_now();
        }
        if state.mode != mode {
            debug!(from = %state.mode, to = %mode, "clock mode changed");
        }
        state.mode = mode;
    }

    /// Sets the speed multiplier, clamped to `[-max_speed, max_speed]`.
    /// Returns the speed actually applied.
    pub fn set_speed(&self, speed: f64) -> Result<f64, ClockError> {
        if !speed.is_finite() {
            return Err(ClockError::NonFiniteSpeed(speed));
        }
        let clamped = speed.clamp(-self.max_speed, self.max_speed);
        if clamped != speed {
            debug!(requested = speed, applied = clamped, "clock speed clamped");
        }
        self.lock().speed = clamped;
        Ok(clamped)
    }

    /// Jumps to `epoch`. Only valid in simulated mode.
    pub fn set_epoch(&self, epoch: DateTime<Utc>) -> Result<(), ClockError> {
        let mut state = self.lock();
        if state.mode != ClockMode::Simulated {
            return Err(ClockError::InvalidMode(state.mode));
        }
        state.epoch = epoch;
        Ok(())
    }

    /// One scheduler tick. In simulated mode the epoch moves by
    /// `wall_delta * speed` while running; in live mode it is re-read from the
    /// wall clock. Returns the epoch every consumer should use for this tick.
    pub fn advance(&self, wall_delta: Duration) -> SimulationEpoch {
        let mut state = self.lock();
        match state.mode {
            ClockMode::Live => {
                state.epoch = self.wall.wall_now();
            }
            ClockMode::Simulated if state.status == RunState::Running => {
                let step = scaled_delta(wall_delta, state.speed);
                match state.epoch.checked_add_signed(step) {
                    Some(next) => state.epoch = next,
                    None => warn!(epoch = %state.epoch, "simulation epoch out of range, not advanced"),
                }
            }
            ClockMode::Simulated => {}
        }
        Self::snapshot(&state)
    }

    fn transition(&self, from: &[RunState], to: RunState) -> bool {
        let mut state = self.lock();
        if !from.contains(&state.status) {
            return false;
        }
        debug!(from = %state.status, to = %to, "clock state changed");
        state.status = to;
        true
    }

    /// `Stopped -> Running`. Returns whether the transition applied.
    pub fn start(&self) -> bool {
        self.transition(&[RunState::Stopped], RunState::Running)
    }

    /// `Running | Paused -> Stopped`. The epoch is retained.
    pub fn stop(&self) -> bool {
        self.transition(&[RunState::Running, RunState::Paused], RunState::Stopped)
    }

    /// `Running -> Paused`. The epoch is retained.
    pub fn pause(&self) -> bool {
        self.transition(&[RunState::Running], RunState::Paused)
    }

    /// `Paused -> Running`.
    pub fn resume(&self) -> bool {
        self.transition(&[RunState::Paused], RunState::Running)
    }
}

fn scaled_delta(wall_delta: Duration, speed: f64) -> TimeDelta {
    let nanos = wall_delta.as_nanos() as f64 * speed;
    if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
        return TimeDelta::zero();
    }
    TimeDelta::nanoseconds(nanos.round() as i64)
}

/// The single clock reading shared by every system in the current tick
#[derive(Resource, Debug, Clone, Copy, Deref)]
pub struct TickEpoch(pub SimulationEpoch);

/// Plugin registering the clock resource and the per-tick advance system
pub struct ClockPlugin {
    pub config: ClockConfig,
}

impl Plugin for ClockPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<SimulationClock>() {
            let clock = SimulationClock::new(&self.config, Arc::new(SystemWallClock));
            app.insert_resource(clock);
        }
        let now = app.world().resource::<SimulationClock>().now();
        app.insert_resource(TickEpoch(now))
            .init_resource::<Time>()
            .add_systems(Update, advance_simulation_clock.in_set(TickSet::Clock));
    }
}

/// System to advance the simulation clock by the frame's wall delta
pub fn advance_simulation_clock(
    time: Res<Time>,
    clock: Res<SimulationClock>,
    mut tick: ResMut<TickEpoch>,
) {
    tick.0 = clock.advance(time.delta());
}
