//! Single-URL warming
//!
//! A worker drives one URL through the pacing floor, the load gate and a
//! retry loop, draining every response body to end-of-stream so upstream
//! caches actually populate. HTTP 429 takes a special path: the limiter
//! is told to back off, the worker gives up its slot for the duration of
//! the cooldown, then re-acquires and starts its attempts over.

use crate::config::HttpConfig;
use crate::limiter::AdaptiveLimiter;
use crate::load::LoadGate;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Terminal state of one warming attempt
#[derive(Debug)]
pub struct WarmOutcome {
    /// HTTP status of the final response; 0 when no response was received
    pub status: u16,

    /// `None` on success, otherwise a failure description
    pub error: Option<String>,

    /// True when the worker already gave its limiter slot back (the 429
    /// cooldown path); the caller must not release again.
    pub slot_released: bool,
}

impl WarmOutcome {
    fn ok(status: u16) -> Self {
        Self {
            status,
            error: None,
            slot_released: false,
        }
    }

    fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            slot_released: false,
        }
    }

    fn cancelled(slot_released: bool) -> Self {
        Self {
            status: 0,
            error: Some("cancelled".to_string()),
            slot_released,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Warms a single URL; the caller must already hold a limiter slot
///
/// Returns the outcome to record. When `slot_released` is set on the
/// returned outcome, the slot was already given back mid-flight and the
/// caller must not release it a second time.
pub async fn warm_one(
    client: &Client,
    http: &HttpConfig,
    gate: &LoadGate,
    limiter: &AdaptiveLimiter,
    url: &str,
    cancel: &CancellationToken,
) -> WarmOutcome {
    if http.min_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(http.min_delay_ms)).await;
    }

    if gate.wait_until_ready(cancel).await.is_err() {
        return WarmOutcome::cancelled(false);
    }

    let attempts = http.retries + 1;
    let cooldown_default = Duration::from_secs(http.rate_limit_cooldown_seconds);
    let mut rate_limit_hits = 0u32;

    // Outer loop starts the attempts over after each 429 cooldown.
    loop {
        if cancel.is_cancelled() {
            return WarmOutcome::cancelled(false);
        }

        let mut last_err: Option<String> = None;
        let mut got_429: Option<Duration> = None;

        let mut attempt = 1;
        while attempt <= attempts {
            match fetch_and_drain(client, url).await {
                Err(err) => {
                    last_err = Some(err);
                }
                Ok((status, retry_after_header)) => {
                    if status == 429 {
                        let retry_after =
                            parse_retry_after(retry_after_header.as_deref(), cooldown_default);
                        limiter.on_429(retry_after);
                        got_429 = Some(retry_after);
                        break;
                    }
                    if status >= 400 {
                        let err = format!("HTTP {}", status);
                        if attempt >= attempts {
                            return WarmOutcome::failed(status, err);
                        }
                        last_err = Some(err);
                    } else {
                        limiter.on_success();
                        return WarmOutcome::ok(status);
                    }
                }
            }

            if attempt >= attempts {
                break;
            }
            let backoff =
                Duration::from_secs_f64(f64::from(attempt) * http.retry_backoff_seconds);
            tracing::debug!(
                "Warm attempt {}/{} failed for {}; sleeping {:.1}s",
                attempt,
                attempts,
                url,
                backoff.as_secs_f64()
            );
            tokio::select! {
                _ = cancel.cancelled() => return WarmOutcome::cancelled(false),
                _ = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
        }

        if let Some(retry_after) = got_429 {
            rate_limit_hits += 1;
            if rate_limit_hits > http.rate_limit_max_429_retries {
                return WarmOutcome::failed(429, "max 429 retries exceeded");
            }

            tracing::warn!(
                "429 Too Many Requests for {} -- cooling down {:.0}s; will retry",
                url,
                retry_after.as_secs_f64()
            );

            // Give the slot back before sleeping out the cooldown. The cap
            // just dropped, and a sleeping worker holding a slot would keep
            // active_workers above it, starving the whole pool.
            limiter.release();
            tokio::select! {
                _ = cancel.cancelled() => return WarmOutcome::cancelled(true),
                _ = tokio::time::sleep(retry_after) => {}
            }
            if limiter.acquire(cancel).await.is_err() {
                return WarmOutcome::cancelled(true);
            }
            continue;
        }

        if let Some(err) = last_err {
            return WarmOutcome::failed(0, err);
        }
        return WarmOutcome::failed(0, "unreachable");
    }
}

/// Issues the GET and drains the body to end-of-stream
///
/// Returns the status and the raw Retry-After header (captured before the
/// body is consumed). A body read error counts as a transport error even
/// when the status line arrived.
async fn fetch_and_drain(client: &Client, url: &str) -> Result<(u16, Option<String>), String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Read the full body so intermediate caches get populated.
    response.bytes().await.map_err(|e| e.to_string())?;

    Ok((status, retry_after))
}

/// Parses a Retry-After header value
///
/// Accepts a non-negative decimal seconds value or an HTTP-date. Absent,
/// unparseable, negative or in-the-past values all fall back to `default`.
pub fn parse_retry_after(header: Option<&str>, default: Duration) -> Duration {
    let Some(raw) = header else {
        return default;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return default;
    }

    if let Ok(seconds) = raw.parse::<i64>() {
        if seconds >= 0 {
            return Duration::from_secs(seconds as u64);
        }
        return default;
    }

    // HTTP-date form (RFC 1123 is the datetime profile RFC 2822 parses)
    if let Ok(when) = DateTime::parse_from_rfc2822(raw) {
        let delta = when.with_timezone(&Utc) - Utc::now();
        if let Ok(wait) = delta.to_std() {
            return wait;
        }
    }

    default
}
