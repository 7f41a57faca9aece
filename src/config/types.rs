use serde::Deserialize;

/// Main configuration structure for the cache warmer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub http: HttpConfig,
    pub load: LoadConfig,
    pub sitemaps: SitemapsConfig,
}

/// Application-level behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database file (relative paths resolve against the config file)
    pub db_path: String,

    /// Optional log file; empty disables file logging
    #[serde(default)]
    pub log_file: String,

    /// Log verbosity: ERROR, WARN, INFO, DEBUG or TRACE
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Rewarm a URL once its last warm is older than this many hours
    pub rewarm_after_hours: u32,

    /// When true, keep running and re-process sitemaps every `loop_interval_seconds`
    #[serde(rename = "loop")]
    pub loop_enabled: bool,

    /// Seconds to sleep between passes when looping
    #[serde(default)]
    pub loop_interval_seconds: u64,
}

/// HTTP client, pacing and rate-limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent on every request
    pub user_agent: String,

    /// Total per-request timeout in seconds
    pub timeout_seconds: u64,

    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,

    /// Maximum redirects to follow
    pub max_redirects: u32,

    /// Worker-pool admission cap; also the limiter's recovery ceiling
    pub concurrency: usize,

    /// Fixed pacing floor slept by every worker before its first request
    pub min_delay_ms: u64,

    /// Extra attempts after the first failed request
    pub retries: u32,

    /// Backoff between attempts is `attempt * retry_backoff_seconds`
    pub retry_backoff_seconds: f64,

    /// Cooldown floor applied on HTTP 429 when Retry-After is smaller or absent
    #[serde(default = "default_cooldown_seconds")]
    pub rate_limit_cooldown_seconds: u64,

    /// Consecutive successful warms required before the cap recovers by one
    #[serde(default = "default_recover_after")]
    pub rate_limit_recover_after: u32,

    /// Per-URL cap on 429 cooldown cycles before the URL is recorded as failed
    #[serde(default = "default_max_429_retries")]
    pub rate_limit_max_429_retries: u32,
}

/// Host load gating configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// 1-minute load average ceiling; warming pauses above it
    pub max_load: f64,

    /// Seconds between load re-checks while paused
    pub check_interval_seconds: u64,
}

/// Seed sitemap configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SitemapsConfig {
    /// Absolute http/https sitemap URLs to resolve each pass
    pub urls: Vec<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_cooldown_seconds() -> u64 {
    120
}

fn default_recover_after() -> u32 {
    50
}

fn default_max_429_retries() -> u32 {
    10
}
