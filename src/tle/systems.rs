//! Record store systems

use bevy::prelude::*;
use tracing::debug;

use crate::tle::SharedRecordStore;

/// System to apply finished background fetches once per tick
pub fn process_fetch_results_system(store: Option<Res<SharedRecordStore>>) {
    let Some(store) = store else { return };
    let applied = store.poll();
    if applied > 0 {
        debug!(applied, pending = store.pending_fetches(), "fetch results applied");
    }
}
