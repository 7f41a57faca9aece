//! Cache Warmer: a sitemap-driven HTTP cache warming daemon
//!
//! This crate implements a long-running warmer that resolves a site's
//! sitemaps (including nested indexes and gzip variants) into a URL set,
//! decides which URLs have gone stale, and re-fetches them with adaptive
//! concurrency that backs off on rate-limiting signals.

pub mod config;
pub mod limiter;
pub mod load;
pub mod output;
pub mod sitemap;
pub mod storage;
pub mod warmer;

use thiserror::Error;

/// Sentinel returned from suspension points when the shutdown token fires.
///
/// Cancellation is not a failure: callers unwind cleanly and the run
/// returns without surfacing an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Main error type for cache warmer operations
#[derive(Debug, Error)]
pub enum WarmerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("gzip decompress: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled(#[from] Cancelled),
}

impl WarmerError {
    /// True when the error is the shutdown sentinel rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WarmerError::Cancelled(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {0} (tip: run `cache-warmer init`)")]
    NotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for warmer operations
pub type Result<T> = std::result::Result<T, WarmerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use limiter::AdaptiveLimiter;
pub use load::LoadGate;
pub use storage::WarmStore;
pub use warmer::{CacheWarmer, RunSummary};
