//! Catalog resolution with cache fallback.
//!
//! `resolve` never fails: a degraded catalog (cache, then empty) keeps
//! the manual channels usable fully offline. Provenance is always
//! reported through [`CatalogSource`] so callers know when a refresh
//! fell back.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::InstallerConfig;
use crate::core::catalog::{CatalogDocument, CatalogSource, VersionCatalog};

struct CachedCatalog {
    catalog: VersionCatalog,
    fetched_at: Instant,
}

/// Resolves the version catalog: remote endpoint first, then the disk
/// cache of the last successful fetch, then an empty catalog.
pub struct VersionCatalogResolver {
    client: Client,
    catalog_url: String,
    cache_file: PathBuf,
    timeout: Duration,
    freshness: Duration,
    memory: Mutex<Option<CachedCatalog>>,
}

impl std::fmt::Debug for VersionCatalogResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionCatalogResolver")
            .field("catalog_url", &self.catalog_url)
            .field("cache_file", &self.cache_file)
            .finish_non_exhaustive()
    }
}

impl VersionCatalogResolver {
    pub fn new(client: Client, config: &InstallerConfig) -> Self {
        Self {
            client,
            catalog_url: config.catalog_url.clone(),
            cache_file: config.cache_file.clone(),
            timeout: config.catalog_timeout,
            freshness: config.cache_freshness,
            memory: Mutex::new(None),
        }
    }

    /// Resolve the catalog. Infallible by construction.
    ///
    /// `force_refresh` purges the in-memory copy before fetching, so a
    /// failed refresh visibly degrades to `LocalCache`/`Empty` instead
    /// of resurrecting stale data as fresh. Without it, a copy inside
    /// the freshness window is served directly (re-tagged `LocalCache`:
    /// `Remote` strictly means the fetch succeeded in this call).
    pub async fn resolve(&self, force_refresh: bool) -> VersionCatalog {
        if force_refresh {
            self.purge_memory();
        } else if let Some(cached) = self.fresh_from_memory() {
            debug!("serving catalog from memory cache");
            return cached.with_source(CatalogSource::LocalCache);
        }

        match self.fetch_remote().await {
            Ok(doc) => {
                let catalog = doc.into_catalog(CatalogSource::Remote);
                info!(
                    releases = catalog.releases.len(),
                    prereleases = catalog.prereleases.len(),
                    "fetched version catalog"
                );
                self.store_disk(&catalog);
                self.store_memory(&catalog);
                catalog
            }
            Err(err) => {
                warn!("catalog fetch failed, falling back to cache: {err}");
                // Degraded results are never memory-cached: the next
                // resolve retries the endpoint instead of serving the
                // fallback for the whole freshness window.
                let catalog = self.load_disk().unwrap_or_else(VersionCatalog::empty);
                if catalog.data_source == CatalogSource::Empty {
                    warn!("no cached catalog available, only manual channels usable");
                }
                catalog
            }
        }
    }

    /// Purge the in-memory and on-disk cache without refetching.
    /// The next `resolve` call performs the fetch.
    pub fn refresh_cache(&self) {
        self.purge_memory();
        if self.cache_file.exists() {
            if let Err(err) = std::fs::remove_file(&self.cache_file) {
                warn!("could not remove catalog cache file: {err}");
            }
        }
    }

    async fn fetch_remote(&self) -> Result<CatalogDocument, reqwest::Error> {
        let doc = self
            .client
            .get(&self.catalog_url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<CatalogDocument>()
            .await?;
        Ok(doc)
    }

    fn fresh_from_memory(&self) -> Option<VersionCatalog> {
        let guard = self.memory.lock().ok()?;
        let cached = guard.as_ref()?;
        (cached.fetched_at.elapsed() < self.freshness).then(|| cached.catalog.clone())
    }

    fn store_memory(&self, catalog: &VersionCatalog) {
        if let Ok(mut guard) = self.memory.lock() {
            *guard = Some(CachedCatalog {
                catalog: catalog.clone(),
                fetched_at: Instant::now(),
            });
        }
    }

    fn purge_memory(&self) {
        if let Ok(mut guard) = self.memory.lock() {
            *guard = None;
        }
    }

    /// Overwritten only on a successful remote fetch.
    fn store_disk(&self, catalog: &VersionCatalog) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.cache_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let doc = CatalogDocument::from(catalog);
            let json = serde_json::to_string_pretty(&doc)?;
            std::fs::write(&self.cache_file, json)
        };
        if let Err(err) = write() {
            warn!("could not persist catalog cache: {err}");
        }
    }

    fn load_disk(&self) -> Option<VersionCatalog> {
        let data = std::fs::read_to_string(&self.cache_file).ok()?;
        match serde_json::from_str::<CatalogDocument>(&data) {
            Ok(doc) => Some(doc.into_catalog(CatalogSource::LocalCache)),
            Err(err) => {
                warn!("catalog cache file is unreadable, ignoring it: {err}");
                None
            }
        }
    }
}
