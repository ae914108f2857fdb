//! Orbit geometry engine
//!
//! Turns a catalog id and a simulation epoch into a [`RenderState`]: the
//! object's inertial position and a closed sampled path of its osculating
//! orbit, plus the geodetic point below it. Results are cached per id; the
//! position is refreshed on its own TTL and the path, which is far more
//! expensive, on a longer one.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::math::DVec3;
use bevy::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use crate::clock::SimulationEpoch;
use crate::config::GeometryConfig;
use crate::error::{GeometryError, PropagationError};
use crate::orbital::elements::{MU_EARTH_KM3_S2, OsculatingElements};
use crate::orbital::geodetic::Geodetic;
use crate::orbital::path::sample_orbit_path;
use crate::orbital::propagation::Propagator;
use crate::scene::{NodeId, SceneGraph};
use crate::tle::{CatalogId, OrbitalRecordStore};

/// Per-object geometry, in the inertial frame unless produced by
/// [`OrbitGeometryEngine::state_in_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub catalog_id: CatalogId,
    /// km
    pub position: DVec3,
    /// km/s
    pub velocity: DVec3,
    /// Ground point below `position` at `computed_at`. Frame independent.
    pub subpoint: Geodetic,
    /// Closed loop: the last vertex repeats the first.
    pub orbit_path_vertices: Arc<[DVec3]>,
    pub elements: OsculatingElements,
    pub computed_at: SimulationEpoch,
    pub path_computed_at: SimulationEpoch,
    pub record_generation: u64,
    pub element_epoch: DateTime<Utc>,
    /// The record was outside its validity margin at `computed_at`.
    pub stale: bool,
    pub cache_ttl: TimeDelta,
}

impl RenderState {
    fn position_fresh(&self, epoch: &SimulationEpoch) -> bool {
        let age = epoch.since(&self.computed_at).abs();
        age.is_zero() || age < self.cache_ttl
    }
}

#[derive(Resource)]
pub struct OrbitGeometryEngine {
    store: Arc<OrbitalRecordStore>,
    propagator: Arc<dyn Propagator>,
    samples: usize,
    position_ttl: TimeDelta,
    path_ttl: TimeDelta,
    cache: HashMap<CatalogId, RenderState>,
}

impl OrbitGeometryEngine {
    pub fn new(
        config: &GeometryConfig,
        store: Arc<OrbitalRecordStore>,
        propagator: Arc<dyn Propagator>,
    ) -> Self {
        Self {
            store,
            propagator,
            samples: config.samples(),
            position_ttl: config.position_ttl(),
            path_ttl: config.path_ttl(),
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<OrbitalRecordStore> {
        &self.store
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Geometry of `catalog_id` at `epoch` in the inertial frame.
    ///
    /// A cached state is reused while it is within TTL of `epoch` and was
    /// built from the current record generation. A propagation failure is
    /// returned for this call only; the next call tries again.
    pub fn state_at(
        &mut self,
        catalog_id: &CatalogId,
        epoch: SimulationEpoch,
    ) -> Result<RenderState, GeometryError> {
        let record = self.store.get(catalog_id, epoch.instant)?;
        let cached = self
            .cache
            .get(catalog_id)
            .filter(|c| c.record_generation == record.generation);

        if let Some(cached) = cached
            && cached.position_fresh(&epoch)
        {
            trace!(%catalog_id, "render state cache hit");
            return Ok(cached.clone());
        }

        let state = self.propagator.evaluate(&record, epoch.instant)?;
        let elements = OsculatingElements::from_state(&state, MU_EARTH_KM3_S2)
            .map_err(|diagnostic| PropagationError::new(catalog_id, diagnostic))?;

        let reusable_path = cached.filter(|c| epoch.since(&c.path_computed_at).abs() < self.path_ttl);
        let (orbit_path_vertices, path_computed_at) = match reusable_path {
            Some(c) => (Arc::clone(&c.orbit_path_vertices), c.path_computed_at),
            None => {
                debug!(%catalog_id, samples = self.samples, "sampling orbit path");
                let vertices: Arc<[DVec3]> = sample_orbit_path(&elements, self.samples).into();
                (vertices, epoch)
            }
        };

        let render = RenderState {
            catalog_id: catalog_id.clone(),
            position: state.position,
            velocity: state.velocity,
            subpoint: Geodetic::subpoint(state.position, epoch.instant),
            orbit_path_vertices,
            elements,
            computed_at: epoch,
            path_computed_at,
            record_generation: record.generation,
            element_epoch: record.element_epoch,
            stale: !record.is_valid_at(epoch.instant, self.store.validity_margin()),
            cache_ttl: self.position_ttl,
        };
        self.cache.insert(catalog_id.clone(), render.clone());
        Ok(render)
    }

    /// [`Self::state_at`] mapped through the world transform of `frame`, the
    /// node the inertial frame is attached as.
    pub fn state_in_frame(
        &mut self,
        catalog_id: &CatalogId,
        epoch: SimulationEpoch,
        graph: &SceneGraph,
        frame: NodeId,
    ) -> Result<RenderState, GeometryError> {
        let world = graph.world_transform(frame)?;
        let mut render = self.state_at(catalog_id, epoch)?;
        render.position = world.transform_point(render.position);
        render.velocity = world.transform_vector(render.velocity);
        render.orbit_path_vertices = render
            .orbit_path_vertices
            .iter()
            .map(|v| world.transform_point(*v))
            .collect();
        Ok(render)
    }

    /// Subpoints over one revolution centered on `epoch`: `samples + 1`
    /// points from half a period before to half a period after.
    ///
    /// Not cached; every call propagates each sample.
    pub fn ground_track(
        &mut self,
        catalog_id: &CatalogId,
        epoch: SimulationEpoch,
        samples: usize,
    ) -> Result<Vec<Geodetic>, GeometryError> {
        let current = self.state_at(catalog_id, epoch)?;
        let record = self.store.get(catalog_id, epoch.instant)?;
        let period = current.elements.period_secs(MU_EARTH_KM3_S2);
        if !period.is_finite() {
            return Err(PropagationError::new(catalog_id, "orbit is not closed").into());
        }

        let samples = samples.max(1);
        let step = period / samples as f64;
        debug!(%catalog_id, samples, period_secs = period, "sampling ground track");
        (0..=samples)
            .map(|k| -> Result<Geodetic, GeometryError> {
                let offset_secs = (k as f64 - samples as f64 / 2.0) * step;
                let at = epoch
                    .instant
                    .checked_add_signed(TimeDelta::milliseconds((offset_secs * 1000.0).round() as i64))
                    .ok_or_else(|| PropagationError::new(catalog_id, "ground track time out of range"))?;
                let state = self.propagator.evaluate(&record, at)?;
                Ok(Geodetic::subpoint(state.position, at))
            })
            .collect()
    }

    /// Last computed state without touching the store or the propagator.
    pub fn cached(&self, catalog_id: &CatalogId) -> Option<&RenderState> {
        self.cache.get(catalog_id)
    }

    /// Drop the cached state and any propagator model for `catalog_id`.
    pub fn evict(&mut self, catalog_id: &CatalogId) -> Option<RenderState> {
        self.propagator.forget(catalog_id);
        self.cache.remove(catalog_id)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
