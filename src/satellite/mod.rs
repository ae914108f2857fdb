//! Satellite tracking
//!
//! A tracked object pairs a catalog id (for the record store and geometry
//! engine) with a scene node (for placement). The registry updates every
//! node once per tick.

use bevy::prelude::*;
use tracing::debug;

use crate::clock::TickEpoch;
use crate::orbital::OrbitGeometryEngine;
use crate::plugin::TickSet;
use crate::scene::SceneGraph;

pub mod registry;

pub use registry::{SatelliteRegistry, TrackedObject, UpdateSummary};

/// Plugin for the satellite registry and its per-tick update
pub struct SatellitePlugin;

impl Plugin for SatellitePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SatelliteRegistry>()
            .add_systems(Update, update_tracked_objects_system.in_set(TickSet::Geometry));
    }
}

/// System to place every tracked object at the tick's epoch
pub fn update_tracked_objects_system(
    tick: Res<TickEpoch>,
    engine: Option<ResMut<OrbitGeometryEngine>>,
    mut registry: ResMut<SatelliteRegistry>,
    mut graph: ResMut<SceneGraph>,
) {
    let Some(mut engine) = engine else { return };
    if registry.is_empty() {
        return;
    }
    let summary = registry.update(&mut engine, &mut graph, tick.0);
    debug!(
        placed = summary.placed,
        waiting = summary.waiting,
        failed = summary.failed,
        "tracked objects updated"
    );
}
