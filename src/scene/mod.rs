//! Scene graph: a transform hierarchy that knows nothing about what its
//! nodes represent.

use bevy::prelude::*;
use tracing::error;

use crate::plugin::TickSet;

pub mod frames;
pub mod graph;
pub mod transform;

pub use frames::{StandardFrames, spin_earth_system};
pub use graph::{NodeId, SceneGraph, Traverse};
pub use transform::{LocalTransform, WorldTransform};

/// Plugin for the scene graph and the standard reference frames
pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneGraph>();
        if !app.world().contains_resource::<StandardFrames>() {
            let spawned = {
                let mut graph = app.world_mut().resource_mut::<SceneGraph>();
                StandardFrames::spawn(&mut graph)
            };
            match spawned {
                Ok(frames) => {
                    app.insert_resource(frames);
                }
                Err(err) => error!(error = %err, "failed to create standard frames"),
            }
        }
        app.add_systems(Update, spin_earth_system.in_set(TickSet::Scene));
    }
}
