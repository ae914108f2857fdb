//! Standard reference frames
//!
//! root -> inertial (ECI) -> Earth-fixed. Tracked objects hang off the
//! inertial frame; anything fixed to the ground hangs off the Earth frame,
//! which is spun about +Z by GMST.

use bevy::prelude::*;
use chrono::{DateTime, Utc};
use tracing::error;

use crate::clock::TickEpoch;
use crate::error::SceneError;
use crate::orbital::{Geodetic, earth_rotation};
use crate::scene::graph::{NodeId, SceneGraph};
use crate::scene::transform::LocalTransform;

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFrames {
    pub root: NodeId,
    pub inertial: NodeId,
    pub earth_fixed: NodeId,
}

impl StandardFrames {
    pub fn spawn(graph: &mut SceneGraph) -> Result<Self, SceneError> {
        let root = graph.spawn_root(LocalTransform::IDENTITY);
        let inertial = graph.spawn(LocalTransform::IDENTITY, Some(root))?;
        let earth_fixed = graph.spawn(LocalTransform::IDENTITY, Some(inertial))?;
        Ok(Self {
            root,
            inertial,
            earth_fixed,
        })
    }

    /// Orient the Earth-fixed frame for `at`.
    pub fn spin_earth(&self, graph: &mut SceneGraph, at: DateTime<Utc>) -> Result<(), SceneError> {
        graph.set_rotation(self.earth_fixed, earth_rotation(at))
    }

    /// Node for a ground site, fixed to the Earth frame.
    pub fn spawn_ground_point(&self, graph: &mut SceneGraph, site: &Geodetic) -> Result<NodeId, SceneError> {
        graph.spawn(
            LocalTransform::from_translation(site.to_ecef_km()),
            Some(self.earth_fixed),
        )
    }
}

/// System to rotate the Earth frame to the tick's epoch
pub fn spin_earth_system(
    tick: Res<TickEpoch>,
    frames: Option<Res<StandardFrames>>,
    mut graph: ResMut<SceneGraph>,
) {
    let Some(frames) = frames else { return };
    if let Err(err) = frames.spin_earth(&mut graph, tick.instant) {
        error!(error = %err, "standard frames missing from scene graph");
    }
}
