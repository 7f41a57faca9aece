//! Adaptive concurrency limiter
//!
//! A semaphore whose capacity varies at runtime in response to origin
//! rate-limiting:
//!
//! - An HTTP 429 halves the admission cap (never below one worker) and
//!   opens a cooldown window during which nothing is admitted.
//! - After a configurable streak of successful warms the cap recovers by
//!   one, up to the configured ceiling.
//!
//! All state sits behind one mutex; wakeups are broadcast so that every
//! state change that could admit a waiter re-evaluates all waiters.

use crate::Cancelled;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lower bound of the admission cap; sustained 429s force single-file warming.
const MIN_CONCURRENCY: usize = 1;

#[derive(Debug)]
struct LimiterState {
    /// Current admission cap, within `[MIN_CONCURRENCY, max_concurrency]`
    current_concurrency: usize,

    /// Workers currently holding a slot
    active_workers: usize,

    /// No acquisitions succeed before this instant
    cooldown_until: Option<Instant>,

    /// Successful warms since the last 429 or recovery step
    consecutive_ok: u32,
}

/// Admission-control semaphore with adaptive capacity
pub struct AdaptiveLimiter {
    state: Mutex<LimiterState>,
    notify: Notify,
    max_concurrency: usize,
    recover_after: u32,
    cooldown_floor: Duration,
}

impl AdaptiveLimiter {
    /// Creates a limiter admitting up to `concurrency` workers
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Initial cap and recovery ceiling
    /// * `cooldown_floor` - Minimum cooldown imposed on 429, regardless of Retry-After
    /// * `recover_after` - Consecutive successes required per recovery step
    pub fn new(concurrency: usize, cooldown_floor: Duration, recover_after: u32) -> Self {
        let concurrency = concurrency.max(MIN_CONCURRENCY);
        Self {
            state: Mutex::new(LimiterState {
                current_concurrency: concurrency,
                active_workers: 0,
                cooldown_until: None,
                consecutive_ok: 0,
            }),
            notify: Notify::new(),
            max_concurrency: concurrency,
            recover_after,
            cooldown_floor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a slot is granted or the token fires
    ///
    /// A successful return increments the active-worker count; the caller
    /// owns the slot until it calls [`release`](Self::release). Waiting is
    /// responsive to cancellation even while sleeping out a cooldown.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            // Register for wakeups before inspecting state, so a broadcast
            // between the unlock and the await below cannot be missed.
            let notified = self.notify.notified();

            let cooldown_left = {
                let mut state = self.lock();
                let now = Instant::now();
                match state.cooldown_until {
                    Some(until) if now < until => Some(until - now),
                    _ => {
                        if state.active_workers < state.current_concurrency {
                            state.active_workers += 1;
                            return Ok(());
                        }
                        None
                    }
                }
            };

            if let Some(remaining) = cooldown_left {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Cancelled),
                    _ = tokio::time::sleep(remaining) => {}
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = notified => {}
            }
        }
    }

    /// Returns a slot to the pool and wakes all waiters
    pub fn release(&self) {
        {
            let mut state = self.lock();
            state.active_workers = state.active_workers.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Reacts to an HTTP 429: halve the cap and open a cooldown window
    ///
    /// The cooldown lasts `max(retry_after, cooldown_floor)`. The success
    /// streak resets. Waiters are woken so they observe the new window.
    pub fn on_429(&self, retry_after: Duration) {
        let cooldown = retry_after.max(self.cooldown_floor);
        {
            let mut state = self.lock();
            let old = state.current_concurrency;
            state.current_concurrency = (old / 2).max(MIN_CONCURRENCY);
            state.consecutive_ok = 0;
            state.cooldown_until = Some(Instant::now() + cooldown);

            tracing::warn!(
                "429 rate limit: concurrency reduced {} -> {}, cooldown {}s",
                old,
                state.current_concurrency,
                cooldown.as_secs()
            );
            if state.current_concurrency == MIN_CONCURRENCY {
                tracing::warn!(
                    "429 rate limit: concurrency at minimum ({} worker); warming at slowest pace",
                    MIN_CONCURRENCY
                );
            }
        }
        self.notify.notify_waiters();
    }

    /// Counts a successful warm toward capacity recovery
    pub fn on_success(&self) {
        let recovered = {
            let mut state = self.lock();
            state.consecutive_ok += 1;
            if state.consecutive_ok >= self.recover_after
                && state.current_concurrency < self.max_concurrency
            {
                let old = state.current_concurrency;
                state.current_concurrency += 1;
                state.consecutive_ok = 0;
                tracing::info!(
                    "429 rate limit: concurrency recovered {} -> {}",
                    old,
                    state.current_concurrency
                );
                true
            } else {
                false
            }
        };
        if recovered {
            self.notify.notify_waiters();
        }
    }

    /// Current admission cap
    pub fn current_concurrency(&self) -> usize {
        self.lock().current_concurrency
    }

    /// Workers currently holding slots
    pub fn active_workers(&self) -> usize {
        self.lock().active_workers
    }
}
