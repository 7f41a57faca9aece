//! Run orchestration
//!
//! `CacheWarmer` owns the pass lifecycle: resolve sitemaps, de-duplicate,
//! filter through the staleness oracle, fan the survivors out to warming
//! workers, and wait for all of them. `run_loop` repeats passes on the
//! configured interval until cancelled.

use crate::config::Config;
use crate::limiter::AdaptiveLimiter;
use crate::load::LoadGate;
use crate::sitemap::SitemapCollector;
use crate::storage::WarmStore;
use crate::warmer::client::build_http_client;
use crate::warmer::worker::warm_one;
use crate::{Cancelled, Result, WarmerError};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Counts from one completed pass
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub ok: u64,
    pub fail: u64,
}

/// Drives warming passes over the configured sitemaps
pub struct CacheWarmer {
    config: Config,
    store: Arc<WarmStore>,
    client: Client,
    limiter: Arc<AdaptiveLimiter>,
    gate: Arc<LoadGate>,
    collector: SitemapCollector,
}

impl CacheWarmer {
    /// Creates a warmer with the default `/proc/loadavg` load gate
    pub fn new(config: Config, store: Arc<WarmStore>) -> Result<Self> {
        let gate = Arc::new(LoadGate::new(&config.load));
        Self::with_gate(config, store, gate)
    }

    /// Creates a warmer with a caller-supplied load gate (used by tests)
    pub fn with_gate(config: Config, store: Arc<WarmStore>, gate: Arc<LoadGate>) -> Result<Self> {
        let client = build_http_client(&config.http)?;
        let limiter = Arc::new(AdaptiveLimiter::new(
            config.http.concurrency,
            Duration::from_secs(config.http.rate_limit_cooldown_seconds),
            config.http.rate_limit_recover_after,
        ));
        let collector = SitemapCollector::new(
            client.clone(),
            config.http.clone(),
            Arc::clone(&gate),
            Arc::clone(&store),
        );

        Ok(Self {
            config,
            store,
            client,
            limiter,
            gate,
            collector,
        })
    }

    /// The limiter driving admission for this warmer
    pub fn limiter(&self) -> &Arc<AdaptiveLimiter> {
        &self.limiter
    }

    /// Runs a single warming pass
    ///
    /// Sitemap collection completes before any page warming begins. Every
    /// stale URL gets exactly one outcome record; URLs skipped because the
    /// pool was shutting down record nothing and are re-evaluated next pass.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        self.collector.reset();

        let mut all_urls = Vec::new();
        for seed in &self.config.sitemaps.urls {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            all_urls.extend(self.collector.collect(seed, cancel).await);
        }

        // De-duplicate preserving discovery order
        let mut seen = HashSet::new();
        let unique: Vec<String> = all_urls
            .into_iter()
            .filter(|u| !u.is_empty() && seen.insert(u.clone()))
            .collect();
        tracing::info!("Collected {} unique URLs from sitemaps", unique.len());

        let rewarm_after = chrono::Duration::hours(i64::from(self.config.app.rewarm_after_hours));
        let mut to_warm = Vec::new();
        for url in unique {
            match self.store.should_warm(&url, rewarm_after) {
                Ok(true) => to_warm.push(url),
                Ok(false) => {}
                Err(err) => tracing::error!("Staleness check failed for {}: {}", url, err),
            }
        }
        tracing::info!(
            "Need to warm {} URLs (rewarm_after={}h)",
            to_warm.len(),
            self.config.app.rewarm_after_hours
        );

        let mut workers = JoinSet::new();
        for url in to_warm {
            if cancel.is_cancelled() {
                break;
            }

            let client = self.client.clone();
            let http = self.config.http.clone();
            let gate = Arc::clone(&self.gate);
            let limiter = Arc::clone(&self.limiter);
            let store = Arc::clone(&self.store);
            let cancel = cancel.clone();

            workers.spawn(async move {
                if limiter.acquire(&cancel).await.is_err() {
                    tracing::debug!("WARM SKIP {} (shutting down)", url);
                    return None;
                }

                let outcome = warm_one(&client, &http, &gate, &limiter, &url, &cancel).await;

                if let Err(err) =
                    store.mark_warmed(&url, outcome.status, outcome.error.as_deref().unwrap_or(""))
                {
                    tracing::error!("Failed to record outcome for {}: {}", url, err);
                }
                if !outcome.slot_released {
                    limiter.release();
                }

                match &outcome.error {
                    None => {
                        tracing::info!("WARM OK   {} status={}", url, outcome.status);
                        Some(true)
                    }
                    Some(err) => {
                        tracing::warn!("WARM FAIL {} error={}", url, err);
                        Some(false)
                    }
                }
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(true)) => summary.ok += 1,
                Ok(Some(false)) => summary.fail += 1,
                Ok(None) => {}
                Err(err) => tracing::error!("Warm worker panicked: {}", err),
            }
        }

        tracing::info!("Run complete. ok={} fail={}", summary.ok, summary.fail);
        Ok(summary)
    }

    /// Runs passes until cancelled (or once, when looping is disabled)
    pub async fn run_loop(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.run_once(cancel).await {
                Ok(_) => {}
                Err(WarmerError::Cancelled(_)) => return Ok(()),
                Err(err) => tracing::error!("Error during run: {}", err),
            }

            if !self.config.app.loop_enabled {
                return Ok(());
            }

            tracing::info!(
                "Sleeping for {} seconds before next run...",
                self.config.app.loop_interval_seconds
            );
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_secs(self.config.app.loop_interval_seconds)) => {}
            }
        }
    }
}
