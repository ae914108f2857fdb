//! Top-level Bevy wiring
//!
//! One tick runs, in order: advance the clock and record the tick's epoch,
//! apply finished fetches, place tracked objects, orient the Earth frame.
//! Every system of the tick reads the same [`TickEpoch`](crate::clock::TickEpoch).

use bevy::prelude::*;

use crate::clock::ClockPlugin;
use crate::config::CoreConfig;
use crate::orbital::OrbitalPlugin;
use crate::satellite::SatellitePlugin;
use crate::scene::ScenePlugin;
use crate::tle::TlePlugin;

/// Per-tick ordering of the core's `Update` systems.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum TickSet {
    Clock,
    Fetch,
    Geometry,
    Scene,
}

/// Clock, record store, geometry engine, scene graph and satellite registry.
///
/// Resources inserted before this plugin (a `SimulationClock`, a
/// `SharedRecordStore`, an `OrbitGeometryEngine`) are used instead of the
/// defaults built from `config`.
#[derive(Default)]
pub struct SatCorePlugin {
    pub config: CoreConfig,
}

impl Plugin for SatCorePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (TickSet::Clock, TickSet::Fetch, TickSet::Geometry, TickSet::Scene).chain(),
        );
        app.add_plugins((
            ClockPlugin {
                config: self.config.clock.clone(),
            },
            TlePlugin {
                config: self.config.store.clone(),
            },
            OrbitalPlugin {
                config: self.config.geometry.clone(),
            },
            ScenePlugin,
            SatellitePlugin,
        ));
    }
}
