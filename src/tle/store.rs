//! Orbital record store
//!
//! In-memory map of catalog id to the latest [`OrbitalRecord`], written through
//! to the disk cache and refreshed by the background worker.
//!
//! Freshness policy for [`OrbitalRecordStore::get`]:
//! - cached and valid at the reference time: returned with no I/O;
//! - cached but stale (or invalidated): the cached record is returned and a
//!   background refresh is queued; a failed refresh keeps serving it;
//! - nothing cached: the caller blocks on one fetch (first use only);
//! - provider said "not found": sticky until [`OrbitalRecordStore::invalidate`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::clock::WallClock;
use crate::config::StoreConfig;
use crate::error::{FetchError, StoreError};
use crate::tle::cache::{CachedRecord, TleCache};
use crate::tle::fetcher::{ElementFetcher, start_tle_worker};
use crate::tle::parser::parse_tle_blocks;
use crate::tle::types::{CatalogId, FetchChannels, FetchCommand, FetchResultMsg, OrbitalRecord};

#[derive(Debug, Default, Clone)]
struct FetchStatus {
    in_flight: bool,
    not_found: bool,
    force_refresh: bool,
    last_failure: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

enum Lookup {
    Ready(Arc<OrbitalRecord>),
    Missing,
    NotFound,
    RecentlyFailed(String),
}

pub struct OrbitalRecordStore {
    validity_margin: TimeDelta,
    retry_interval: TimeDelta,
    records: RwLock<HashMap<CatalogId, Arc<OrbitalRecord>>>,
    status: Mutex<HashMap<CatalogId, FetchStatus>>,
    channels: FetchChannels,
    disk: Option<TleCache>,
    wall: Arc<dyn WallClock>,
    generation: AtomicU64,
}

impl OrbitalRecordStore {
    /// Starts the fetch worker for `fetcher` and loads the disk cache.
    pub fn open<F: ElementFetcher>(
        config: &StoreConfig,
        fetcher: F,
        wall: Arc<dyn WallClock>,
    ) -> anyhow::Result<Self> {
        let disk = if config.disk_cache {
            Some(match &config.cache_dir {
                Some(dir) => TleCache::new_in_dir(dir.clone())?,
                None => TleCache::new()?,
            })
        } else {
            None
        };
        let channels = start_tle_worker(fetcher)?;
        let store = Self {
            validity_margin: config.validity_margin(),
            retry_interval: config.retry_interval(),
            records: RwLock::new(HashMap::new()),
            status: Mutex::new(HashMap::new()),
            channels,
            disk,
            wall,
            generation: AtomicU64::new(1),
        };
        store.load_disk_cache();
        Ok(store)
    }

    fn load_disk_cache(&self) {
        let Some(disk) = &self.disk else { return };
        let entries = match disk.load_all() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %disk.dir().display(), error = %err, "disk cache unavailable");
                return;
            }
        };
        let mut records = self.records_mut();
        for entry in entries {
            let catalog_id = entry.catalog_id.clone();
            match entry.into_record(self.next_generation()) {
                Ok(record) => {
                    records.insert(catalog_id, Arc::new(record));
                }
                Err(err) => {
                    warn!(%catalog_id, error = %err, "discarding unparseable cache entry");
                    discard_entry(disk, &catalog_id);
                }
            }
        }
        info!(count = records.len(), "loaded orbital records from disk cache");
    }

    /// Picks up a disk entry written since open (e.g. by another instance).
    /// Returns whether a record was loaded.
    fn load_from_disk(&self, catalog_id: &CatalogId) -> bool {
        let Some(disk) = &self.disk else { return false };
        let entry = match disk.read(catalog_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(err) => {
                warn!(%catalog_id, error = %err, "unreadable cache entry");
                discard_entry(disk, catalog_id);
                return false;
            }
        };
        match entry.into_record(self.next_generation()) {
            Ok(record) => {
                debug!(%catalog_id, "orbital record loaded from disk cache");
                self.records_mut().insert(catalog_id.clone(), Arc::new(record));
                true
            }
            Err(err) => {
                warn!(%catalog_id, error = %err, "discarding unparseable cache entry");
                discard_entry(disk, catalog_id);
                false
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    fn records(&self) -> RwLockReadGuard<'_, HashMap<CatalogId, Arc<OrbitalRecord>>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn records_mut(&self) -> RwLockWriteGuard<'_, HashMap<CatalogId, Arc<OrbitalRecord>>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> MutexGuard<'_, HashMap<CatalogId, FetchStatus>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn validity_margin(&self) -> TimeDelta {
        self.validity_margin
    }

    /// Record for `catalog_id` usable at `at`.
    ///
    /// Blocks only when nothing is cached for the id; must not be called from
    /// inside an async runtime (use [`Self::get_async`] there).
    pub fn get(
        &self,
        catalog_id: &CatalogId,
        at: DateTime<Utc>,
    ) -> Result<Arc<OrbitalRecord>, StoreError> {
        self.poll();
        match self.lookup_or_disk(catalog_id, at) {
            Lookup::Ready(record) => Ok(record),
            Lookup::NotFound => Err(StoreError::NotFound(catalog_id.clone())),
            Lookup::RecentlyFailed(reason) => Err(no_data(catalog_id, reason)),
            Lookup::Missing => {
                let reply = self.send_with_reply(catalog_id)?;
                match reply.blocking_recv() {
                    Ok(msg) => self.apply(msg),
                    Err(_) => self.fetch_abandoned(catalog_id),
                }
                self.settle_first_use(catalog_id)
            }
        }
    }

    /// Async variant of [`Self::get`] for the first-use path.
    pub async fn get_async(
        &self,
        catalog_id: &CatalogId,
        at: DateTime<Utc>,
    ) -> Result<Arc<OrbitalRecord>, StoreError> {
        self.poll();
        match self.lookup_or_disk(catalog_id, at) {
            Lookup::Ready(record) => Ok(record),
            Lookup::NotFound => Err(StoreError::NotFound(catalog_id.clone())),
            Lookup::RecentlyFailed(reason) => Err(no_data(catalog_id, reason)),
            Lookup::Missing => {
                let reply = self.send_with_reply(catalog_id)?;
                match reply.await {
                    Ok(msg) => self.apply(msg),
                    Err(_) => self.fetch_abandoned(catalog_id),
                }
                self.settle_first_use(catalog_id)
            }
        }
    }

    fn lookup(&self, catalog_id: &CatalogId, at: DateTime<Utc>) -> Lookup {
        if let Some(record) = self.peek(catalog_id) {
            let force = self
                .status()
                .get(catalog_id)
                .is_some_and(|s| s.force_refresh);
            if force || !record.is_valid_at(at, self.validity_margin) {
                self.schedule_refresh(catalog_id, force);
            }
            return Lookup::Ready(record);
        }

        let now = self.wall.wall_now();
        let status = self.status();
        match status.get(catalog_id) {
            Some(s) if s.not_found => Lookup::NotFound,
            Some(s) if !s.force_refresh && self.within_retry_interval(s, now) => {
                Lookup::RecentlyFailed(s.last_error.clone().unwrap_or_default())
            }
            _ => Lookup::Missing,
        }
    }

    fn lookup_or_disk(&self, catalog_id: &CatalogId, at: DateTime<Utc>) -> Lookup {
        match self.lookup(catalog_id, at) {
            Lookup::Missing if self.load_from_disk(catalog_id) => self.lookup(catalog_id, at),
            other => other,
        }
    }

    fn within_retry_interval(&self, status: &FetchStatus, now: DateTime<Utc>) -> bool {
        status
            .last_failure
            .is_some_and(|failed| now.signed_duration_since(failed) < self.retry_interval)
    }

    fn send_with_reply(
        &self,
        catalog_id: &CatalogId,
    ) -> Result<oneshot::Receiver<FetchResultMsg>, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = FetchCommand::Fetch {
            catalog_id: catalog_id.clone(),
            reply: Some(reply_tx),
        };
        if self.channels.cmd_tx.send(cmd).is_err() {
            return Err(no_data(catalog_id, "fetch worker is not running"));
        }
        debug!(%catalog_id, "first-use fetch requested");
        self.status().entry(catalog_id.clone()).or_default().in_flight = true;
        Ok(reply_rx)
    }

    fn fetch_abandoned(&self, catalog_id: &CatalogId) {
        self.apply(FetchResultMsg::Failure {
            catalog_id: catalog_id.clone(),
            error: FetchError::Network("fetch worker dropped the request".into()),
        });
    }

    fn settle_first_use(&self, catalog_id: &CatalogId) -> Result<Arc<OrbitalRecord>, StoreError> {
        if let Some(record) = self.peek(catalog_id) {
            return Ok(record);
        }
        let status = self.status();
        match status.get(catalog_id) {
            Some(s) if s.not_found => Err(StoreError::NotFound(catalog_id.clone())),
            Some(s) => Err(no_data(
                catalog_id,
                s.last_error.clone().unwrap_or_else(|| "fetch failed".into()),
            )),
            None => Err(no_data(catalog_id, "fetch failed")),
        }
    }

    /// Queues a background fetch unless one is already in flight, the id is
    /// known not to exist, or the last failure is too recent. Returns whether
    /// a fetch was queued.
    fn schedule_refresh(&self, catalog_id: &CatalogId, force: bool) -> bool {
        let now = self.wall.wall_now();
        let mut status = self.status();
        let entry = status.entry(catalog_id.clone()).or_default();
        if entry.in_flight {
            return false;
        }
        if !force && (entry.not_found || self.within_retry_interval(entry, now)) {
            return false;
        }
        let cmd = FetchCommand::Fetch {
            catalog_id: catalog_id.clone(),
            reply: None,
        };
        if self.channels.cmd_tx.send(cmd).is_err() {
            warn!(%catalog_id, "fetch worker is not running, refresh skipped");
            return false;
        }
        debug!(%catalog_id, force, "background refresh queued");
        entry.in_flight = true;
        true
    }

    /// Pre-warms `catalog_id` without blocking: queues a fetch if nothing is
    /// cached for it yet.
    pub fn request(&self, catalog_id: &CatalogId) -> bool {
        if self.peek(catalog_id).is_some() {
            return false;
        }
        self.schedule_refresh(catalog_id, false)
    }

    /// Loads every record of a provider group in the background.
    pub fn request_group(&self, group: &str) -> bool {
        let cmd = FetchCommand::FetchGroup {
            group: group.to_string(),
        };
        self.channels.cmd_tx.send(cmd).is_ok()
    }

    /// Drains finished fetches from the worker and applies them. Never blocks
    /// on network I/O. Returns the number of results applied.
    pub fn poll(&self) -> usize {
        let drained: Vec<FetchResultMsg> = self
            .channels
            .res_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_iter()
            .collect();
        let count = drained.len();
        for msg in drained {
            self.apply(msg);
        }
        count
    }

    fn apply(&self, msg: FetchResultMsg) {
        match msg {
            FetchResultMsg::Success { catalog_id, raw } => self.accept(catalog_id, raw),
            FetchResultMsg::Failure { catalog_id, error } => self.reject(&catalog_id, error),
            FetchResultMsg::GroupSuccess { group, raw } => {
                let body = String::from_utf8_lossy(&raw);
                let blocks = parse_tle_blocks(&body);
                info!(%group, count = blocks.len(), "group elements received");
                for block in blocks {
                    let Some(field) = block.catalog_field() else { continue };
                    let catalog_id = CatalogId::new(field);
                    self.accept(catalog_id, block.to_text().into_bytes());
                }
            }
            FetchResultMsg::GroupFailure { group, error } => {
                warn!(%group, %error, "group fetch failed");
            }
        }
    }

    fn accept(&self, catalog_id: CatalogId, raw: Vec<u8>) {
        let fetched_at = self.wall.wall_now();
        let record = match OrbitalRecord::from_raw(
            catalog_id.clone(),
            raw,
            fetched_at,
            self.next_generation(),
        ) {
            Ok(record) => Arc::new(record),
            Err(err) => {
                let error = FetchError::Network(format!("malformed element payload: {:#}", err));
                self.reject(&catalog_id, error);
                return;
            }
        };

        debug!(
            %catalog_id,
            element_epoch = %record.element_epoch.to_rfc3339(),
            generation = record.generation,
            "orbital record replaced"
        );
        self.records_mut().insert(catalog_id.clone(), Arc::clone(&record));
        self.status().insert(catalog_id.clone(), FetchStatus::default());

        if let Some(disk) = &self.disk
            && let Err(err) = disk.write(&CachedRecord::from(record.as_ref()))
        {
            warn!(%catalog_id, error = %err, "failed to write record to disk cache");
        }
    }

    fn reject(&self, catalog_id: &CatalogId, error: FetchError) {
        let now = self.wall.wall_now();
        let mut status = self.status();
        let entry = status.entry(catalog_id.clone()).or_default();
        entry.in_flight = false;
        entry.force_refresh = false;
        entry.last_error = Some(error.to_string());
        match error {
            FetchError::NotFound(_) => {
                info!(%catalog_id, "provider has no such object, further fetches suspended");
                entry.not_found = true;
            }
            FetchError::Network(_) => {
                entry.last_failure = Some(now);
            }
        }
    }

    /// Forces the next `get` to re-fetch regardless of validity and lifts a
    /// sticky not-found.
    pub fn invalidate(&self, catalog_id: &CatalogId) {
        let mut status = self.status();
        let entry = status.entry(catalog_id.clone()).or_default();
        entry.not_found = false;
        entry.force_refresh = true;
        entry.last_failure = None;
    }

    /// Cached record without any freshness check or I/O.
    pub fn peek(&self, catalog_id: &CatalogId) -> Option<Arc<OrbitalRecord>> {
        self.records().get(catalog_id).cloned()
    }

    pub fn list_cached(&self) -> BTreeSet<CatalogId> {
        self.records().keys().cloned().collect()
    }

    pub fn last_error(&self, catalog_id: &CatalogId) -> Option<String> {
        self.status().get(catalog_id).and_then(|s| s.last_error.clone())
    }

    pub fn is_not_found(&self, catalog_id: &CatalogId) -> bool {
        self.status().get(catalog_id).is_some_and(|s| s.not_found)
    }

    pub fn pending_fetches(&self) -> usize {
        self.status().values().filter(|s| s.in_flight).count()
    }

    /// Evicts every record from memory and disk.
    pub fn clear(&self) -> anyhow::Result<()> {
        self.records_mut().clear();
        self.status().clear();
        if let Some(disk) = &self.disk {
            disk.clear()?;
        }
        Ok(())
    }
}

fn discard_entry(disk: &TleCache, catalog_id: &CatalogId) {
    if let Err(err) = disk.remove(catalog_id) {
        warn!(%catalog_id, error = %err, "failed to remove cache entry");
    }
}

fn no_data(catalog_id: &CatalogId, reason: impl Into<String>) -> StoreError {
    StoreError::NoData {
        catalog_id: catalog_id.clone(),
        reason: reason.into(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualWallClock;
    use crate::tle::mock_data::{GROUP_TLE, ISS_2008_TLE, ISS_2020_TLE, ISS_GARBLED_EPOCH_TLE};
    use chrono::TimeZone;
    use std::future::Future;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    /// Fetcher answering from a per-id script.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        responses: Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>,
        group: Mutex<Option<Result<Vec<u8>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub(crate) fn respond(&self, id: &str, response: Result<&str, FetchError>) {
            let response = response.map(|text| text.as_bytes().to_vec());
            self.responses.lock().unwrap().insert(id.to_string(), response);
        }

        pub(crate) fn respond_group(&self, response: Result<&str, FetchError>) {
            *self.group.lock().unwrap() = Some(response.map(|text| text.as_bytes().to_vec()));
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ElementFetcher for ScriptedFetcher {
        fn fetch_raw_elements(
            &self,
            catalog_id: &CatalogId,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self
                .responses
                .lock()
                .unwrap()
                .get(catalog_id.as_str())
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("unscripted".into())));
            async move { response }
        }

        fn fetch_group_elements(
            &self,
            group: &str,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            let response = self
                .group
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err(FetchError::NotFound(group.to_string())));
            async move { response }
        }
    }

    pub(crate) fn unique_temp_dir(test_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "satcore-store-{}-{}-{}",
            test_name,
            std::process::id(),
            nanos
        ))
    }

    pub(crate) fn test_config(cache_dir: Option<PathBuf>) -> StoreConfig {
        StoreConfig {
            disk_cache: cache_dir.is_some(),
            cache_dir,
            ..Default::default()
        }
    }

    pub(crate) fn iss_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 7, 12, 21, 16, 1).unwrap()
    }

    fn open_store(
        fetcher: &Arc<ScriptedFetcher>,
        cache_dir: Option<PathBuf>,
    ) -> (OrbitalRecordStore, Arc<ManualWallClock>) {
        let wall = Arc::new(ManualWallClock::new(iss_epoch()));
        let store = OrbitalRecordStore::open(&test_config(cache_dir), Arc::clone(fetcher), wall.clone())
            .expect("store should open");
        (store, wall)
    }

    /// Poll until no fetch is in flight.
    pub(crate) fn settle(store: &OrbitalRecordStore) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            store.poll();
            if store.pending_fetches() == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "background fetch did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn iss() -> CatalogId {
        CatalogId::from(25544u32)
    }

    #[test]
    fn test_first_use_fetches_synchronously() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);

        let record = store.get(&iss(), iss_epoch()).expect("first get should fetch");
        assert_eq!(record.raw(), ISS_2020_TLE);
        assert_eq!(fetcher.calls(), 1);
        assert!(store.list_cached().contains(&iss()));

        let again = store.get(&iss(), iss_epoch() + TimeDelta::days(3)).unwrap();
        assert!(Arc::ptr_eq(&record, &again));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.pending_fetches(), 0);
    }

    #[test]
    fn test_first_use_failure_is_no_data_and_throttled() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Err(FetchError::Network("timeout".into())));
        let (store, wall) = open_store(&fetcher, None);

        let err = store.get(&iss(), iss_epoch()).unwrap_err();
        assert!(matches!(err, StoreError::NoData { .. }));
        assert!(store.get(&iss(), iss_epoch()).is_err());
        assert_eq!(fetcher.calls(), 1);

        wall.advance(TimeDelta::seconds(61));
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        assert!(store.get(&iss(), iss_epoch()).is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_not_found_is_sticky_until_invalidate() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Err(FetchError::NotFound("25544".into())));
        let (store, _) = open_store(&fetcher, None);

        assert_eq!(store.get(&iss(), iss_epoch()), Err(StoreError::NotFound(iss())));
        assert_eq!(store.get(&iss(), iss_epoch()), Err(StoreError::NotFound(iss())));
        assert!(!store.request(&iss()));
        assert_eq!(fetcher.calls(), 1);
        assert!(store.is_not_found(&iss()));

        fetcher.respond("25544", Ok(ISS_2020_TLE));
        store.invalidate(&iss());
        assert!(store.get(&iss(), iss_epoch()).is_ok());
        assert_eq!(fetcher.calls(), 2);
        assert!(!store.is_not_found(&iss()));
    }

    #[test]
    fn test_stale_record_served_when_refresh_fails() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);
        let original = store.get(&iss(), iss_epoch()).unwrap();

        fetcher.respond("25544", Err(FetchError::Network("unreachable".into())));
        let later = iss_epoch() + TimeDelta::days(30);
        for _ in 0..20 {
            let record = store.get(&iss(), later).expect("stale record must be served");
            assert_eq!(record.generation, original.generation);
            settle(&store);
        }
        assert!(store.last_error(&iss()).is_some());
        // One first-use fetch plus one refresh; retries wait out the interval.
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_stale_record_replaced_after_refresh() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2008_TLE));
        let (store, _) = open_store(&fetcher, None);
        let old = store.get(&iss(), iss_epoch()).unwrap();
        assert!(!old.is_valid_at(iss_epoch(), store.validity_margin()));

        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let served = store.get(&iss(), iss_epoch()).unwrap();
        assert_eq!(served.generation, old.generation);
        settle(&store);

        let fresh = store.get(&iss(), iss_epoch()).unwrap();
        assert!(fresh.generation > old.generation);
        assert!(fresh.is_valid_at(iss_epoch(), store.validity_margin()));
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_invalidate_refetches_valid_record() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);
        let first = store.get(&iss(), iss_epoch()).unwrap();

        store.invalidate(&iss());
        let served = store.get(&iss(), iss_epoch()).unwrap();
        assert_eq!(served.generation, first.generation);
        settle(&store);
        assert_eq!(fetcher.calls(), 2);
        assert!(store.peek(&iss()).unwrap().generation > first.generation);
    }

    #[test]
    fn test_disk_round_trip_serves_cold_start() {
        let dir = unique_temp_dir("cold_start");
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        {
            let (store, _) = open_store(&fetcher, Some(dir.clone()));
            store.get(&iss(), iss_epoch()).unwrap();
        }

        let offline = Arc::new(ScriptedFetcher::default());
        let (store, _) = open_store(&offline, Some(dir));
        assert!(store.list_cached().contains(&iss()));
        let record = store.get(&iss(), iss_epoch()).unwrap();
        assert_eq!(record.raw_bytes(), ISS_2020_TLE.as_bytes());
        assert_eq!(offline.calls(), 0);
    }

    #[test]
    fn test_request_prewarms_in_background() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);

        assert!(store.request(&iss()));
        assert!(!store.request(&iss()));
        settle(&store);
        assert!(store.peek(&iss()).is_some());
        assert!(!store.request(&iss()));
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_group_request_loads_every_record() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond_group(Ok(GROUP_TLE));
        let (store, _) = open_store(&fetcher, None);

        assert!(store.request_group("stations"));
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.list_cached().len() < 2 {
            store.poll();
            assert!(Instant::now() < deadline, "group results did not arrive");
            std::thread::sleep(Duration::from_millis(5));
        }
        let curtis = store.peek(&CatalogId::from("59507")).unwrap();
        assert_eq!(curtis.name.as_deref(), Some("CURTIS"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_clear_evicts_memory_and_disk() {
        let dir = unique_temp_dir("clear");
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, Some(dir.clone()));
        store.get(&iss(), iss_epoch()).unwrap();

        store.clear().unwrap();
        assert!(store.list_cached().is_empty());
        assert!(TleCache::new_in_dir(dir).unwrap().load_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_no_data_and_throttled() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_GARBLED_EPOCH_TLE));
        let (store, wall) = open_store(&fetcher, None);

        let err = store.get(&iss(), iss_epoch()).unwrap_err();
        assert!(matches!(err, StoreError::NoData { .. }));
        assert!(store.last_error(&iss()).unwrap().contains("malformed"));
        assert!(!store.is_not_found(&iss()));
        assert!(store.get(&iss(), iss_epoch()).is_err());
        assert_eq!(fetcher.calls(), 1);

        wall.advance(TimeDelta::seconds(61));
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        assert!(store.get(&iss(), iss_epoch()).is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_wrong_object_payload_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("12345", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);
        let other = CatalogId::from(12345u32);

        let err = store.get(&other, iss_epoch()).unwrap_err();
        assert!(matches!(err, StoreError::NoData { .. }));
        assert!(store.peek(&other).is_none());
        assert!(store.peek(&iss()).is_none());
    }

    #[test]
    fn test_stale_cold_start_serves_record_and_refreshes_once() {
        let dir = unique_temp_dir("stale_cold_start");
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2008_TLE));
        {
            let (store, _) = open_store(&fetcher, Some(dir.clone()));
            store.get(&iss(), iss_epoch()).unwrap();
        }

        let offline = Arc::new(ScriptedFetcher::default());
        offline.respond("25544", Err(FetchError::Network("offline".into())));
        let (store, _) = open_store(&offline, Some(dir));
        let cached = store.peek(&iss()).unwrap();
        assert!(!cached.is_valid_at(iss_epoch(), store.validity_margin()));

        for _ in 0..10 {
            let served = store.get(&iss(), iss_epoch()).expect("stale disk record must be served");
            assert_eq!(served.raw(), ISS_2008_TLE);
            settle(&store);
        }
        assert_eq!(offline.calls(), 1);
        assert!(store.last_error(&iss()).is_some());
    }

    #[test]
    fn test_corrupt_disk_entry_is_discarded_on_open() {
        let dir = unique_temp_dir("corrupt_entry");
        let disk = TleCache::new_in_dir(dir.clone()).unwrap();
        disk.write(&CachedRecord {
            catalog_id: iss(),
            name: Some("ISS (ZARYA)".into()),
            raw_elements: ISS_GARBLED_EPOCH_TLE.into(),
            element_epoch: iss_epoch(),
            fetched_at: iss_epoch(),
        })
        .unwrap();

        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, Some(dir));
        assert!(store.list_cached().is_empty());
        assert!(disk.read(&iss()).unwrap().is_none());

        let record = store.get(&iss(), iss_epoch()).unwrap();
        assert_eq!(record.raw(), ISS_2020_TLE);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_disk_entry_written_after_open_is_used() {
        let dir = unique_temp_dir("late_entry");
        let offline = Arc::new(ScriptedFetcher::default());
        let (store, _) = open_store(&offline, Some(dir.clone()));
        assert!(store.list_cached().is_empty());

        let record = OrbitalRecord::from_raw(iss(), ISS_2020_TLE.as_bytes().to_vec(), iss_epoch(), 1).unwrap();
        TleCache::new_in_dir(dir).unwrap().write(&CachedRecord::from(&record)).unwrap();

        let loaded = store.get(&iss(), iss_epoch()).unwrap();
        assert_eq!(loaded.raw(), ISS_2020_TLE);
        assert_eq!(offline.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_async_first_use() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond("25544", Ok(ISS_2020_TLE));
        let (store, _) = open_store(&fetcher, None);

        let record = store.get_async(&iss(), iss_epoch()).await.unwrap();
        assert_eq!(record.catalog_id, iss());
        assert_eq!(store.pending_fetches(), 0);
    }
}
