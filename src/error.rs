//! Error taxonomy shared by the clock, record store, geometry engine and scene graph.
//!
//! Misuse errors ([`ClockError`], [`SceneError`]) are programmer errors and are
//! never corrected silently. Data-availability errors ([`StoreError`],
//! [`FetchError`]) and [`PropagationError`] describe conditions the caller is
//! expected to degrade around (skip a draw, show a staleness badge).

use thiserror::Error;

use crate::clock::ClockMode;
use crate::scene::NodeId;
use crate::tle::CatalogId;

/// Misuse of the simulation clock.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("operation requires simulated mode, clock is in {0} mode")]
    InvalidMode(ClockMode),

    #[error("speed multiplier must be finite, got {0}")]
    NonFiniteSpeed(f64),
}

/// Misuse of the transform hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("attaching {node:?} under {parent:?} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("unknown or removed scene node {0:?}")]
    UnknownNode(NodeId),
}

/// Outcome of a failed call to an [`ElementFetcher`](crate::tle::ElementFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider confirmed that the catalog id (or group) does not exist.
    #[error("provider has no element data for {0}")]
    NotFound(String),

    /// Transient transport or payload failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Geodetic coordinates outside their valid ranges.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid latitude: {0} degrees")]
    InvalidLatitude(f64),

    #[error("invalid longitude: {0} degrees")]
    InvalidLongitude(f64),
}

/// Failure to produce an orbital record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Nothing cached and the fetch failed.
    #[error("no orbital data for {catalog_id}: {reason}")]
    NoData { catalog_id: CatalogId, reason: String },

    /// Sticky until [`OrbitalRecordStore::invalidate`](crate::tle::OrbitalRecordStore::invalidate).
    #[error("catalog id {0} does not exist at the provider")]
    NotFound(CatalogId),
}

/// The propagator could not produce a finite, bound orbit state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("propagation failed for {catalog_id}: {diagnostic}")]
pub struct PropagationError {
    pub catalog_id: CatalogId,
    pub diagnostic: String,
}

impl PropagationError {
    pub fn new(catalog_id: &CatalogId, diagnostic: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.clone(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Failure of [`OrbitGeometryEngine::state_at`](crate::orbital::OrbitGeometryEngine::state_at).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl GeometryError {
    /// True when the object should simply be skipped this frame.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeometryError::Propagation(_) | GeometryError::Store(StoreError::NoData { .. })
        )
    }
}
