//! Sitemap collection
//!
//! Resolves seed sitemap URLs into page URL lists, recursing through
//! nested sitemap indexes. A shared visited set guards against cycles and
//! duplicate fetches across seeds; it is reset at the start of each pass.

mod fetch;
mod parser;

pub use fetch::fetch_bytes;
pub use parser::{parse_sitemap, SitemapPayload};

use crate::config::HttpConfig;
use crate::load::LoadGate;
use crate::storage::WarmStore;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Recursively resolves sitemaps into page URLs
pub struct SitemapCollector {
    client: Client,
    http: HttpConfig,
    gate: Arc<LoadGate>,
    store: Arc<WarmStore>,
    visited: Mutex<HashSet<String>>,
}

impl SitemapCollector {
    pub fn new(
        client: Client,
        http: HttpConfig,
        gate: Arc<LoadGate>,
        store: Arc<WarmStore>,
    ) -> Self {
        Self {
            client,
            http,
            gate,
            store,
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// Clears the visited set ahead of a new pass
    pub fn reset(&self) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Collects every page URL reachable from `seed`
    ///
    /// Fetch and parse failures are recorded against the sitemap in the
    /// store and yield an empty list; a failing child never aborts its
    /// siblings. Already-visited sitemaps return empty immediately.
    pub async fn collect(&self, seed: &str, cancel: &CancellationToken) -> Vec<String> {
        {
            let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
            if !visited.insert(seed.to_string()) {
                return Vec::new();
            }
        }

        tracing::info!("Fetching sitemap: {}", seed);

        let data =
            match fetch_bytes(&self.client, seed, &self.http, &self.gate, cancel).await {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!("Failed to fetch sitemap {}: {}", seed, err);
                    if let Err(db_err) = self.store.mark_sitemap(seed, &err.to_string()) {
                        tracing::error!("Failed to record sitemap error for {}: {}", seed, db_err);
                    }
                    return Vec::new();
                }
            };

        let payload = parse_sitemap(&data);
        if let Err(db_err) = self.store.mark_sitemap(seed, "") {
            tracing::error!("Failed to record sitemap fetch for {}: {}", seed, db_err);
        }

        let mut collected = payload.pages;
        for child in &payload.children {
            if cancel.is_cancelled() {
                break;
            }
            let child_urls = Box::pin(self.collect(child, cancel)).await;
            collected.extend(child_urls);
        }

        collected
    }
}
