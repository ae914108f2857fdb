//! Tracked objects and their registry

use std::collections::BTreeMap;

use bevy::prelude::*;
use tracing::{debug, info};

use crate::clock::SimulationEpoch;
use crate::error::{GeometryError, SceneError, StoreError};
use crate::orbital::{Geodetic, OrbitGeometryEngine};
use crate::scene::{LocalTransform, NodeId, SceneGraph};
use crate::tle::{CatalogId, OrbitalRecordStore};

/// An object drawn from orbital data: what to look up, and where in the
/// scene it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub catalog_id: CatalogId,
    pub node: NodeId,
    /// Set when the last update could not place the object.
    pub last_error: Option<String>,
    /// The record in use was outside its validity margin at the last update.
    pub stale: bool,
    /// Placed at least once.
    pub placed: bool,
    /// Ground point below the object at the last successful update.
    pub subpoint: Option<Geodetic>,
}

/// Outcome of one [`SatelliteRegistry::update`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub placed: usize,
    /// No record yet; a fetch is pending.
    pub waiting: usize,
    pub failed: usize,
}

#[derive(Resource, Debug, Default)]
pub struct SatelliteRegistry {
    objects: BTreeMap<CatalogId, TrackedObject>,
}

impl SatelliteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `catalog_id` under `parent` and pre-warm its record without
    /// blocking. Adding an id twice returns the existing node.
    pub fn add(
        &mut self,
        catalog_id: CatalogId,
        graph: &mut SceneGraph,
        parent: NodeId,
        store: &OrbitalRecordStore,
    ) -> Result<NodeId, SceneError> {
        if let Some(existing) = self.objects.get(&catalog_id) {
            return Ok(existing.node);
        }
        let node = graph.spawn(LocalTransform::IDENTITY, Some(parent))?;
        store.request(&catalog_id);
        info!(%catalog_id, ?node, "tracking object");
        self.objects.insert(
            catalog_id.clone(),
            TrackedObject {
                catalog_id,
                node,
                last_error: None,
                stale: false,
                placed: false,
                subpoint: None,
            },
        );
        Ok(node)
    }

    /// Stop tracking and remove the object's node along with anything
    /// attached to it. The engine's cached geometry for it goes too.
    pub fn remove(
        &mut self,
        catalog_id: &CatalogId,
        graph: &mut SceneGraph,
        engine: &mut OrbitGeometryEngine,
    ) -> Option<TrackedObject> {
        let object = self.objects.remove(catalog_id)?;
        engine.evict(catalog_id);
        if let Err(err) = graph.remove_subtree(object.node) {
            debug!(%catalog_id, error = %err, "tracked node already gone");
        }
        info!(%catalog_id, "stopped tracking object");
        Some(object)
    }

    pub fn get(&self, catalog_id: &CatalogId) -> Option<&TrackedObject> {
        self.objects.get(catalog_id)
    }

    pub fn contains(&self, catalog_id: &CatalogId) -> bool {
        self.objects.contains_key(catalog_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CatalogId> {
        self.objects.keys()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Place every tracked object at `epoch`, the one clock reading of this
    /// tick. Objects without a record yet are skipped rather than fetched, so
    /// this never waits on the network.
    pub fn update(
        &mut self,
        engine: &mut OrbitGeometryEngine,
        graph: &mut SceneGraph,
        epoch: SimulationEpoch,
    ) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        for object in self.objects.values_mut() {
            let id = &object.catalog_id;
            let store = engine.store();
            if store.peek(id).is_none() {
                if store.is_not_found(id) {
                    object.last_error = Some(StoreError::NotFound(id.clone()).to_string());
                    summary.failed += 1;
                } else {
                    store.request(id);
                    summary.waiting += 1;
                }
                continue;
            }

            let placed = engine
                .state_at(id, epoch)
                .and_then(|state| {
                    graph.set_translation(object.node, state.position)?;
                    Ok::<_, GeometryError>(state)
                });
            match placed {
                Ok(state) => {
                    object.last_error = None;
                    object.stale = state.stale;
                    object.placed = true;
                    object.subpoint = Some(state.subpoint);
                    summary.placed += 1;
                }
                Err(err) => {
                    debug!(catalog_id = %id, error = %err, transient = err.is_transient(), "object not placed");
                    object.last_error = Some(err.to_string());
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualWallClock;
    use crate::config::GeometryConfig;
    use crate::error::FetchError;
    use crate::orbital::Sgp4Propagator;
    use crate::scene::StandardFrames;
    use crate::tle::mock_data::ISS_2020_TLE;
    use crate::tle::store::tests::{ScriptedFetcher, iss_epoch, settle, test_config};
    use std::sync::Arc;

    struct Fixture {
        registry: SatelliteRegistry,
        engine: OrbitGeometryEngine,
        graph: SceneGraph,
        frames: StandardFrames,
    }

    fn fixture() -> Fixture {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        fetcher.respond("1", Err(FetchError::NotFound("1".into())));
        let wall = Arc::new(ManualWallClock::new(iss_epoch()));
        let store = Arc::new(OrbitalRecordStore::open(&test_config(None), fetcher, wall).unwrap());
        let engine = OrbitGeometryEngine::new(&GeometryConfig::default(), store, Arc::new(Sgp4Propagator::new()));
        let mut graph = SceneGraph::new();
        let frames = StandardFrames::spawn(&mut graph).unwrap();
        Fixture {
            registry: SatelliteRegistry::new(),
            engine,
            graph,
            frames,
        }
    }

    #[test]
    fn test_add_prewarms_and_update_places_node() {
        let mut f = fixture();
        let iss = CatalogId::from(25544u32);
        let node = f
            .registry
            .add(iss.clone(), &mut f.graph, f.frames.inertial, f.engine.store())
            .unwrap();
        settle(f.engine.store());

        let summary = f.registry.update(&mut f.engine, &mut f.graph, SimulationEpoch::at(iss_epoch()));
        assert_eq!(summary, UpdateSummary { placed: 1, waiting: 0, failed: 0 });

        let world = f.graph.world_transform(node).unwrap().translation();
        let expected = f.engine.cached(&iss).unwrap().position;
        assert!((world - expected).length() < 1e-9);
        let tracked = f.registry.get(&iss).unwrap();
        assert!(tracked.placed);
        assert_eq!(tracked.subpoint, Some(f.engine.cached(&iss).unwrap().subpoint));
    }

    #[test]
    fn test_update_skips_objects_without_records() {
        let mut f = fixture();
        let missing = CatalogId::from("1");
        f.registry
            .add(missing.clone(), &mut f.graph, f.frames.inertial, f.engine.store())
            .unwrap();
        settle(f.engine.store());

        let summary = f.registry.update(&mut f.engine, &mut f.graph, SimulationEpoch::at(iss_epoch()));
        assert_eq!(summary.failed, 1);
        assert!(f.registry.get(&missing).unwrap().last_error.is_some());
    }

    #[test]
    fn test_add_twice_and_remove() {
        let mut f = fixture();
        let iss = CatalogId::from(25544u32);
        let a = f.registry.add(iss.clone(), &mut f.graph, f.frames.inertial, f.engine.store()).unwrap();
        let b = f.registry.add(iss.clone(), &mut f.graph, f.frames.inertial, f.engine.store()).unwrap();
        assert_eq!(a, b);
        assert_eq!(f.registry.len(), 1);

        settle(f.engine.store());
        f.registry.update(&mut f.engine, &mut f.graph, SimulationEpoch::at(iss_epoch()));
        assert!(f.engine.cached(&iss).is_some());

        let label = f.graph.spawn(LocalTransform::IDENTITY, Some(a)).unwrap();
        let removed = f.registry.remove(&iss, &mut f.graph, &mut f.engine).unwrap();
        assert!(f.engine.cached(&iss).is_none());
        assert_eq!(removed.node, a);
        assert!(!f.graph.contains(a));
        assert!(!f.graph.contains(label));
        assert!(f.registry.is_empty());
        assert!(f.graph.contains(f.frames.inertial));
    }
}
