use crate::config::validation::validate;
use crate::config::Config;
use crate::ConfigError;
use std::path::Path;

/// Default configuration written by `cache-warmer init`.
///
/// The `max_load` line is substituted at init time based on the host CPU
/// count; see [`default_config_template`].
pub const DEFAULT_CONFIG_TOML: &str = r#"[app]
# Paths are resolved relative to this config file location.
db_path = "warmer.db"
log_file = "logs/cache_warmer.log"
log_level = "INFO"

# Rewarm URLs if last warm is older than this many hours (unless a flush happened after that warm).
rewarm_after_hours = 24

# If loop=true, keeps running and re-processes sitemaps every loop_interval_seconds
loop = true
loop_interval_seconds = 900

[http]
user_agent = "CacheWarmer/1.0 (+cachewarmer)"
timeout_seconds = 20
connect_timeout_seconds = 10
max_redirects = 5

# Concurrency / pacing
concurrency = 8
min_delay_ms = 50

# Retries
retries = 2
retry_backoff_seconds = 1.0

# 429 rate limit handling
rate_limit_cooldown_seconds = 120
rate_limit_recover_after = 50
rate_limit_max_429_retries = 10

[load]
# 1-minute load average limit. For 4 CPUs and "must not exceed 3", use 2.0.
max_load = 2.0
check_interval_seconds = 2

[sitemaps]
urls = [
  "https://www.demoshop.nl/sitemap.xml"
]
"#;

/// Renders the default config template with a host-appropriate `max_load`
pub fn default_config_template(max_load: f64) -> String {
    DEFAULT_CONFIG_TOML.replacen("max_load = 2.0", &format!("max_load = {:.1}", max_load), 1)
}

/// Loads, validates and resolves a configuration file
///
/// Relative `app.db_path` and `app.log_file` values are resolved against
/// the directory containing the config file, so the warmer behaves the
/// same regardless of the working directory it is launched from.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Missing file, parse failure or validation failure
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    validate(&config)?;

    // Resolve paths relative to the config file
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !Path::new(&config.app.db_path).is_absolute() {
        config.app.db_path = config_dir.join(&config.app.db_path).display().to_string();
    }
    if !config.app.log_file.is_empty() && !Path::new(&config.app.log_file).is_absolute() {
        config.app.log_file = config_dir.join(&config.app.log_file).display().to_string();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_template_parses_and_validates() {
        let file = create_temp_config(DEFAULT_CONFIG_TOML);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.http.concurrency, 8);
        assert_eq!(config.app.rewarm_after_hours, 24);
        assert!(config.app.loop_enabled);
        assert_eq!(config.http.rate_limit_max_429_retries, 10);
        assert_eq!(config.sitemaps.urls.len(), 1);
    }

    #[test]
    fn test_template_substitutes_max_load() {
        let rendered = default_config_template(7.0);
        assert!(rendered.contains("max_load = 7.0"));
        assert!(!rendered.contains("max_load = 2.0"));
    }

    #[test]
    fn test_missing_config_reports_init_hint() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("cache-warmer init"));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let file = create_temp_config(DEFAULT_CONFIG_TOML);
        let config = load_config(file.path()).unwrap();

        let config_dir = file.path().parent().unwrap();
        assert!(Path::new(&config.app.db_path).starts_with(config_dir));
        assert!(Path::new(&config.app.log_file).starts_with(config_dir));
    }

    #[test]
    fn test_absolute_db_path_untouched() {
        let content = DEFAULT_CONFIG_TOML.replace(
            "db_path = \"warmer.db\"",
            "db_path = \"/var/lib/warmer/warmer.db\"",
        );
        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.app.db_path, "/var/lib/warmer/warmer.db");
    }

    #[test]
    fn test_rate_limit_defaults_applied() {
        let content = r#"
[app]
db_path = "warmer.db"
rewarm_after_hours = 24
loop = false

[http]
user_agent = "Test/1.0"
timeout_seconds = 20
connect_timeout_seconds = 10
max_redirects = 5
concurrency = 4
min_delay_ms = 0
retries = 2
retry_backoff_seconds = 1.0

[load]
max_load = 2.0
check_interval_seconds = 2

[sitemaps]
urls = ["https://example.com/sitemap.xml"]
"#;
        let file = create_temp_config(content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.http.rate_limit_cooldown_seconds, 120);
        assert_eq!(config.http.rate_limit_recover_after, 50);
        assert_eq!(config.http.rate_limit_max_429_retries, 10);
        assert_eq!(config.app.log_level, "INFO");
        assert!(config.app.log_file.is_empty());
    }

    #[test]
    fn test_validation_error_surfaces() {
        let content = DEFAULT_CONFIG_TOML.replace("concurrency = 8", "concurrency = 0");
        let file = create_temp_config(&content);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }
}
