//! Orbital mechanics module
//!
//! Propagation, osculating elements, orbit path sampling, Earth rotation,
//! geodetic subpoints and the geometry engine that combines them with the
//! record store.

use std::sync::Arc;

use bevy::prelude::*;
use tracing::warn;

use crate::config::GeometryConfig;
use crate::tle::SharedRecordStore;

pub mod coordinates;
pub mod elements;
pub mod engine;
pub mod geodetic;
pub mod path;
pub mod propagation;

pub use coordinates::{earth_rotation, ecef_to_eci_km, eci_to_ecef_km, gmst_rad};
pub use elements::{MU_EARTH_KM3_S2, OsculatingElements};
pub use engine::{OrbitGeometryEngine, RenderState};
pub use geodetic::{Geodetic, WGS84_A_KM, WGS84_F};
pub use path::{perifocal_basis, sample_orbit_path};
pub use propagation::{Propagator, Sgp4Propagator, StateVector, minutes_since_epoch};

/// Plugin providing the [`OrbitGeometryEngine`] resource
///
/// Needs a [`SharedRecordStore`]; an engine inserted beforehand is kept.
pub struct OrbitalPlugin {
    pub config: GeometryConfig,
}

impl Plugin for OrbitalPlugin {
    fn build(&self, app: &mut App) {
        if app.world().contains_resource::<OrbitGeometryEngine>() {
            return;
        }
        let Some(store) = app.world().get_resource::<SharedRecordStore>() else {
            warn!("no orbital record store, geometry engine disabled");
            return;
        };
        let engine = OrbitGeometryEngine::new(
            &self.config,
            Arc::clone(&store.0),
            Arc::new(Sgp4Propagator::new()),
        );
        app.insert_resource(engine);
    }
}
