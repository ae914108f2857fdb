//! Element fetching: the provider collaborator and the background worker

use std::future::Future;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::FetchError;
use crate::tle::parser::is_no_data_body;
use crate::tle::types::{CatalogId, FetchChannels, FetchCommand, FetchResultMsg};

/// Source of raw element text, e.g. an HTTP client against a celestial-data provider.
pub trait ElementFetcher: Send + Sync + 'static {
    fn fetch_raw_elements(
        &self,
        catalog_id: &CatalogId,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;

    /// Every element set in a named provider group.
    fn fetch_group_elements(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let group = group.to_string();
        async move { Err(FetchError::NotFound(format!("group {}", group))) }
    }
}

impl<T: ElementFetcher> ElementFetcher for Arc<T> {
    fn fetch_raw_elements(
        &self,
        catalog_id: &CatalogId,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        (**self).fetch_raw_elements(catalog_id)
    }

    fn fetch_group_elements(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        (**self).fetch_group_elements(group)
    }
}

/// Celestrak GP endpoint client
#[derive(Debug, Clone)]
pub struct CelestrakFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CelestrakFetcher {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("satcore/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    async fn fetch_body(&self, query: &str, what: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}?{}&FORMAT=TLE", self.base_url, query);
        let resp = self
            .client
            .get(&url)
            .header("accept", "text/plain")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(%url, %status, bytes = body.len(), "element fetch response");

        if status == reqwest::StatusCode::NOT_FOUND
            || is_no_data_body(&String::from_utf8_lossy(&body))
        {
            return Err(FetchError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {} for {}", status, url)));
        }
        Ok(body.to_vec())
    }
}

impl ElementFetcher for CelestrakFetcher {
    fn fetch_raw_elements(
        &self,
        catalog_id: &CatalogId,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let query = format!("CATNR={}", catalog_id);
        let what = catalog_id.to_string();
        async move { self.fetch_body(&query, &what).await }
    }

    fn fetch_group_elements(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let query = format!("GROUP={}", group);
        let what = format!("group {}", group);
        async move { self.fetch_body(&query, &what).await }
    }
}

/// Start the background element worker thread
///
/// The thread owns a tokio runtime and spawns one task per command, so a slow
/// request never holds up the rest of the queue. Results travel back over a
/// std channel; a command carrying a `reply` sender gets its result there
/// instead.
pub fn start_tle_worker<F: ElementFetcher>(fetcher: F) -> anyhow::Result<FetchChannels> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<FetchCommand>();
    let (res_tx, res_rx) = mpsc::channel::<FetchResultMsg>();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("satcore-fetch")
        .enable_all()
        .build()
        .context("build fetch runtime")?;
    let fetcher = Arc::new(fetcher);

    thread::Builder::new()
        .name("satcore-fetch-dispatch".into())
        .spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                let fetcher = Arc::clone(&fetcher);
                let res_tx = res_tx.clone();
                rt.spawn(async move {
                    match cmd {
                        FetchCommand::Fetch { catalog_id, reply } => {
                            let msg = match fetcher.fetch_raw_elements(&catalog_id).await {
                                Ok(raw) => {
                                    info!(catalog_id = %catalog_id, bytes = raw.len(), "element fetch succeeded");
                                    FetchResultMsg::Success { catalog_id, raw }
                                }
                                Err(error) => {
                                    warn!(catalog_id = %catalog_id, %error, "element fetch failed");
                                    FetchResultMsg::Failure { catalog_id, error }
                                }
                            };
                            let undelivered = match reply {
                                Some(reply) => reply.send(msg).err(),
                                None => Some(msg),
                            };
                            // A dropped waiter still gets its result applied on the next poll.
                            if let Some(msg) = undelivered {
                                let _ = res_tx.send(msg);
                            }
                        }
                        FetchCommand::FetchGroup { group } => {
                            let msg = match fetcher.fetch_group_elements(&group).await {
                                Ok(raw) => {
                                    info!(%group, bytes = raw.len(), "group fetch succeeded");
                                    FetchResultMsg::GroupSuccess { group, raw }
                                }
                                Err(error) => {
                                    warn!(%group, %error, "group fetch failed");
                                    FetchResultMsg::GroupFailure { group, error }
                                }
                            };
                            let _ = res_tx.send(msg);
                        }
                    }
                });
            }
            debug!("element worker command channel closed");
            rt.shutdown_timeout(Duration::from_secs(1));
        })
        .context("spawn fetch worker thread")?;

    info!("element fetch worker started");
    Ok(FetchChannels {
        cmd_tx,
        res_rx: Arc::new(Mutex::new(res_rx)),
    })
}
