//! Orbital record management
//!
//! Fetching, parsing, caching and freshness tracking of two-line element sets
//! from external providers such as Celestrak.

use std::sync::Arc;

use bevy::prelude::*;
use tracing::{error, info};

use crate::clock::SystemWallClock;
use crate::config::StoreConfig;
use crate::plugin::TickSet;

pub mod cache;
pub mod fetcher;
#[cfg(test)]
pub(crate) mod mock_data;
pub mod parser;
pub mod store;
pub mod systems;
pub mod types;

pub use cache::{CachedRecord, TleCache};
pub use fetcher::{CelestrakFetcher, ElementFetcher, start_tle_worker};
pub use store::OrbitalRecordStore;
pub use systems::process_fetch_results_system;
pub use types::{CatalogId, FetchChannels, FetchCommand, FetchResultMsg, OrbitalRecord};

/// The record store as a Bevy resource
#[derive(Resource, Clone, Deref)]
pub struct SharedRecordStore(pub Arc<OrbitalRecordStore>);

/// Plugin for orbital record management
///
/// Opens a Celestrak-backed store unless a [`SharedRecordStore`] was inserted
/// beforehand, and drains fetch results once per tick.
pub struct TlePlugin {
    pub config: StoreConfig,
}

impl Plugin for TlePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<SharedRecordStore>() {
            match open_celestrak_store(&self.config) {
                Ok(store) => {
                    info!(
                        cached = store.list_cached().len(),
                        "orbital record store ready"
                    );
                    app.insert_resource(SharedRecordStore(Arc::new(store)));
                }
                Err(err) => error!(error = %err, "failed to open orbital record store"),
            }
        }
        app.add_systems(
            Update,
            process_fetch_results_system.in_set(TickSet::Fetch),
        );
    }
}

fn open_celestrak_store(config: &StoreConfig) -> anyhow::Result<OrbitalRecordStore> {
    let fetcher = CelestrakFetcher::new(config)?;
    OrbitalRecordStore::open(config, fetcher, Arc::new(SystemWallClock))
}
