//! The warming engine
//!
//! This module contains the pieces that turn a stale URL list into HTTP
//! traffic:
//! - Building the shared HTTP client
//! - Per-URL warming with retry, body draining and 429 handling
//! - Pass orchestration and the run loop

mod client;
mod coordinator;
mod worker;

pub use client::build_http_client;
pub use coordinator::{CacheWarmer, RunSummary};
pub use worker::{parse_retry_after, warm_one, WarmOutcome};
