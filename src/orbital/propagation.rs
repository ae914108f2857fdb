//! Orbit propagation
//!
//! The [`Propagator`] seam turns an orbital record and an instant into an
//! inertial state vector. [`Sgp4Propagator`] is the stock implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bevy::math::DVec3;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::PropagationError;
use crate::tle::{CatalogId, OrbitalRecord};

/// Inertial (TEME) position in km and velocity in km/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub position: DVec3,
    pub velocity: DVec3,
}

impl StateVector {
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

pub trait Propagator: Send + Sync + 'static {
    fn evaluate(
        &self,
        record: &OrbitalRecord,
        at: DateTime<Utc>,
    ) -> Result<StateVector, PropagationError>;

    /// Release anything held for `catalog_id`; called when it stops being tracked.
    fn forget(&self, _catalog_id: &CatalogId) {}
}

/// Minutes from `epoch` to `sim_utc`, negative when `sim_utc` is earlier
pub fn minutes_since_epoch(sim_utc: DateTime<Utc>, epoch: DateTime<Utc>) -> f64 {
    let delta = sim_utc - epoch;
    delta.num_seconds() as f64 / 60.0 + (delta.subsec_nanos() as f64) / 60.0 / 1.0e9
}

/// SGP4/SDP4 through the `sgp4` crate.
///
/// Initialized models are kept per catalog id and rebuilt only when the
/// record generation changes.
#[derive(Default)]
pub struct Sgp4Propagator {
    models: Mutex<HashMap<CatalogId, (u64, Arc<sgp4::Constants>)>>,
}

impl Sgp4Propagator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn model_count(&self) -> usize {
        self.models.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn constants_for(&self, record: &OrbitalRecord) -> Result<Arc<sgp4::Constants>, PropagationError> {
        let mut models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((generation, constants)) = models.get(&record.catalog_id)
            && *generation == record.generation
        {
            return Ok(Arc::clone(constants));
        }

        let elements = sgp4::Elements::from_tle(
            record.name.clone(),
            record.line1().as_bytes(),
            record.line2().as_bytes(),
        )
        .map_err(|e| PropagationError::new(&record.catalog_id, format!("elements error: {}", e)))?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| PropagationError::new(&record.catalog_id, format!("constants error: {}", e)))?;

        debug!(catalog_id = %record.catalog_id, generation = record.generation, "sgp4 model initialized");
        let constants = Arc::new(constants);
        models.insert(
            record.catalog_id.clone(),
            (record.generation, Arc::clone(&constants)),
        );
        Ok(constants)
    }
}

impl Propagator for Sgp4Propagator {
    fn evaluate(
        &self,
        record: &OrbitalRecord,
        at: DateTime<Utc>,
    ) -> Result<StateVector, PropagationError> {
        let constants = self.constants_for(record)?;
        let mins = minutes_since_epoch(at, record.element_epoch);
        let prediction = constants
            .propagate(sgp4::MinutesSinceEpoch(mins))
            .map_err(|e| PropagationError::new(&record.catalog_id, e.to_string()))?;

        let state = StateVector {
            position: DVec3::from_array(prediction.position),
            velocity: DVec3::from_array(prediction.velocity),
        };
        if !state.is_finite() {
            return Err(PropagationError::new(
                &record.catalog_id,
                format!("non-finite state {:.3} min from epoch", mins),
            ));
        }
        Ok(state)
    }

    fn forget(&self, catalog_id: &CatalogId) {
        let mut models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        if models.remove(catalog_id).is_some() {
            debug!(%catalog_id, "sgp4 model released");
        }
    }
}
