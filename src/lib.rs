//! Non-visual core of a satellite visualizer: a simulation clock, a cache of
//! orbital element records, orbit geometry, and a transform scene graph,
//! wired together as Bevy plugins.

pub mod clock;
pub mod config;
pub mod error;
pub mod orbital;
pub mod plugin;
pub mod satellite;
pub mod scene;
pub mod tle;

pub use clock::{ClockMode, RunState, SimulationClock, SimulationEpoch, TickEpoch};
pub use config::CoreConfig;
pub use error::{ClockError, CoordError, FetchError, GeometryError, PropagationError, SceneError, StoreError};
pub use orbital::{OrbitGeometryEngine, RenderState};
pub use plugin::{SatCorePlugin, TickSet};
pub use satellite::{SatelliteRegistry, TrackedObject};
pub use scene::{NodeId, SceneGraph, StandardFrames};
pub use tle::{CatalogId, OrbitalRecord, OrbitalRecordStore, SharedRecordStore};
