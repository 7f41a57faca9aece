//! Configuration loading, types, and validation
//!
//! Configuration is a TOML file with `[app]`, `[http]`, `[load]` and
//! `[sitemaps]` sections. Relative paths are resolved against the config
//! file's own directory.

mod parser;
mod types;
mod validation;

pub use parser::{default_config_template, load_config, DEFAULT_CONFIG_TOML};
pub use types::{AppConfig, Config, HttpConfig, LoadConfig, SitemapsConfig};
pub use validation::validate;
