//! Host load gating
//!
//! Warming pauses while the host's 1-minute load average sits above the
//! configured ceiling. Gating is advisory: when no load reading is
//! available (non-Linux hosts, unreadable procfs) the gate opens
//! immediately.

use crate::config::LoadConfig;
use crate::Cancelled;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Producer of 1-minute load average readings; `None` means unavailable
pub type LoadSource = Box<dyn Fn() -> Option<f64> + Send + Sync>;

/// Blocks callers while the host load average exceeds the configured ceiling
pub struct LoadGate {
    max_load: f64,
    check_interval: Duration,
    source: LoadSource,
}

impl LoadGate {
    /// Creates a gate reading from `/proc/loadavg`
    pub fn new(config: &LoadConfig) -> Self {
        Self::with_source(config, Box::new(read_load_1m))
    }

    /// Creates a gate with a custom load source (used by tests)
    pub fn with_source(config: &LoadConfig, source: LoadSource) -> Self {
        Self {
            max_load: config.max_load,
            check_interval: Duration::from_secs(config.check_interval_seconds),
            source,
        }
    }

    /// Returns once load is at or below the ceiling
    ///
    /// Re-checks every `check_interval_seconds` while over the ceiling.
    /// Returns `Err(Cancelled)` if the token fires during a sleep.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            // Cannot measure load: don't block
            let Some(load) = (self.source)() else {
                return Ok(());
            };

            if load <= self.max_load {
                return Ok(());
            }

            tracing::info!(
                "Load too high (1m={:.2} > max={:.2}). Sleeping {}s...",
                load,
                self.max_load,
                self.check_interval.as_secs()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }
    }
}

/// Reads the 1-minute load average from `/proc/loadavg`
fn read_load_1m() -> Option<f64> {
    let data = std::fs::read_to_string("/proc/loadavg").ok()?;
    data.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_config(max_load: f64) -> LoadConfig {
        LoadConfig {
            max_load,
            check_interval_seconds: 1,
        }
    }

    #[tokio::test]
    async fn test_passes_when_load_below_ceiling() {
        let gate = LoadGate::with_source(&gate_config(2.0), Box::new(|| Some(0.5)));
        let cancel = CancellationToken::new();
        assert!(gate.wait_until_ready(&cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_passes_when_load_unavailable() {
        let gate = LoadGate::with_source(&gate_config(2.0), Box::new(|| None));
        let cancel = CancellationToken::new();
        assert!(gate.wait_until_ready(&cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_while_load_high() {
        let gate = LoadGate::with_source(&gate_config(1.0), Box::new(|| Some(9.9)));
        let cancel = CancellationToken::new();

        let wait = gate.wait_until_ready(&cancel);
        let timed_out = tokio::time::timeout(Duration::from_secs(10), wait)
            .await
            .is_err();
        assert!(timed_out, "gate should still be blocking after 10s of high load");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let gate = LoadGate::with_source(&gate_config(1.0), Box::new(|| Some(9.9)));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        assert_eq!(gate.wait_until_ready(&cancel).await, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_recovers_once_load_drops() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_source = Arc::clone(&calls);
        // High for the first two readings, then low
        let source: LoadSource = Box::new(move || {
            let n = calls_in_source.fetch_add(1, Ordering::SeqCst);
            Some(if n < 2 { 5.0 } else { 0.1 })
        });

        let gate = LoadGate::with_source(&gate_config(1.0), source);
        let cancel = CancellationToken::new();
        tokio::time::pause();
        assert!(gate.wait_until_ready(&cancel).await.is_ok());
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }
}
