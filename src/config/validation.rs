//! Configuration validation
//!
//! Every check returns a descriptive `ConfigError::Validation` so that a
//! bad config fails fast at startup instead of misbehaving mid-run.

use crate::config::Config;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid
/// * `Err(ConfigError)` - Validation failed with a descriptive message
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.http.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "http.concurrency must be >= 1, got {}",
            config.http.concurrency
        )));
    }
    if config.http.timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "http.timeout_seconds must be > 0, got {}",
            config.http.timeout_seconds
        )));
    }
    if config.http.connect_timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "http.connect_timeout_seconds must be > 0, got {}",
            config.http.connect_timeout_seconds
        )));
    }
    if config.http.retry_backoff_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "http.retry_backoff_seconds must be >= 0, got {}",
            config.http.retry_backoff_seconds
        )));
    }

    if config.app.rewarm_after_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "app.rewarm_after_hours must be >= 1, got {}",
            config.app.rewarm_after_hours
        )));
    }
    if config.app.loop_enabled && config.app.loop_interval_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "app.loop_interval_seconds must be >= 1 when loop=true, got {}",
            config.app.loop_interval_seconds
        )));
    }

    if config.load.max_load < 0.0 {
        return Err(ConfigError::Validation(format!(
            "load.max_load must be >= 0, got {}",
            config.load.max_load
        )));
    }
    if config.load.check_interval_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "load.check_interval_seconds must be >= 1, got {}",
            config.load.check_interval_seconds
        )));
    }

    if config.sitemaps.urls.is_empty() {
        return Err(ConfigError::Validation(
            "no sitemaps configured. Add [sitemaps].urls in config.toml".to_string(),
        ));
    }
    for (i, raw) in config.sitemaps.urls.iter().enumerate() {
        let parsed = Url::parse(raw).map_err(|e| {
            ConfigError::Validation(format!("sitemaps.urls[{}] invalid URL {:?}: {}", i, raw, e))
        })?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::Validation(format!(
                "sitemaps.urls[{}] must have a host: {:?}",
                i, raw
            )));
        }
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "sitemaps.urls[{}] scheme must be http or https: {:?}",
                i, raw
            )));
        }
    }

    Ok(())
}
