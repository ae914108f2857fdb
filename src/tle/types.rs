//! Orbital record types and worker communication structures

use std::fmt;
use std::sync::{
    Arc, Mutex,
    mpsc::{Receiver, Sender},
};

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::FetchError;
use crate::tle::parser::{extract_tle_block, parse_tle_epoch_to_utc};

/// Catalog identifier, e.g. a NORAD number. Format is caller-defined.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(String);

impl CatalogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric NORAD number when the id is purely numeric.
    pub fn norad_number(&self) -> Option<u32> {
        self.0.parse().ok()
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatalogId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CatalogId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u32> for CatalogId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

/// Immutable snapshot of one object's element set.
///
/// Records are replaced wholesale on re-fetch and shared as `Arc`s, so a
/// reader never observes a partially updated record.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalRecord {
    pub catalog_id: CatalogId,
    pub name: Option<String>,
    /// Provider text exactly as received.
    raw: String,
    line1: String,
    line2: String,
    /// Instant the elements are most accurate for.
    pub element_epoch: DateTime<Utc>,
    /// Local wall-clock time of the fetch that produced this record.
    pub fetched_at: DateTime<Utc>,
    /// Monotonic per-store counter, bumped on every replacement.
    pub generation: u64,
}

impl OrbitalRecord {
    /// Builds a record from a provider payload for `catalog_id`.
    pub fn from_raw(
        catalog_id: CatalogId,
        raw: Vec<u8>,
        fetched_at: DateTime<Utc>,
        generation: u64,
    ) -> anyhow::Result<Self> {
        let raw = String::from_utf8(raw).context("element payload is not UTF-8")?;
        let block = extract_tle_block(&raw, &catalog_id)?;
        let element_epoch = parse_tle_epoch_to_utc(&block.line1)
            .with_context(|| format!("unparseable epoch in line 1 for {}", catalog_id))?;
        Ok(Self {
            catalog_id,
            name: block.name,
            raw,
            line1: block.line1,
            line2: block.line2,
            element_epoch,
            fetched_at,
            generation,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn raw_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    /// `|at - element_epoch| <= margin`, boundary inclusive.
    pub fn is_valid_at(&self, at: DateTime<Utc>, margin: TimeDelta) -> bool {
        at.signed_duration_since(self.element_epoch).abs() <= margin
    }
}

/// Commands for the element fetcher worker thread
#[derive(Debug)]
pub enum FetchCommand {
    Fetch {
        catalog_id: CatalogId,
        /// Present when a caller is waiting on this particular fetch.
        reply: Option<oneshot::Sender<FetchResultMsg>>,
    },
    FetchGroup {
        group: String,
    },
}

/// Results from the element fetcher worker thread
#[derive(Debug, Clone)]
pub enum FetchResultMsg {
    Success {
        catalog_id: CatalogId,
        raw: Vec<u8>,
    },
    Failure {
        catalog_id: CatalogId,
        error: FetchError,
    },
    GroupSuccess {
        group: String,
        raw: Vec<u8>,
    },
    GroupFailure {
        group: String,
        error: FetchError,
    },
}

/// Channels for communicating with the element fetcher worker thread
pub struct FetchChannels {
    pub cmd_tx: Sender<FetchCommand>,
    pub res_rx: Arc<Mutex<Receiver<FetchResultMsg>>>,
}
