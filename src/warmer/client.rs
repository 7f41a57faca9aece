//! HTTP client construction

use crate::config::HttpConfig;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

/// Builds the shared HTTP client from config
///
/// One client serves both sitemap fetching and page warming: it carries
/// the configured User-Agent, timeouts, and redirect limit, and reuses
/// connections across workers.
pub fn build_http_client(http: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(http.user_agent.clone())
        .timeout(Duration::from_secs(http.timeout_seconds))
        .connect_timeout(Duration::from_secs(http.connect_timeout_seconds))
        .redirect(Policy::limited(http.max_redirects as usize))
        .build()
}
