//! Retry-wrapped sitemap fetching
//!
//! Returns the raw bytes of a sitemap URL, decompressing payloads whose
//! URL path ends in `.gz`. Every attempt waits on the load gate first;
//! transport errors, HTTP status >= 400 and gzip failures are all
//! retryable with a linear backoff of `attempt * retry_backoff_seconds`.
//!
//! Sitemap traffic is a handful of requests per pass and does not pass
//! through the adaptive limiter.

use crate::config::HttpConfig;
use crate::load::LoadGate;
use crate::{Cancelled, WarmerError};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::Read;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetches the body bytes of `url`, retrying per the HTTP config
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - Body bytes, gzip-decompressed for `.gz` URLs
/// * `Err(WarmerError)` - The last attempt's error, or `Cancelled`
pub async fn fetch_bytes(
    client: &Client,
    url: &str,
    http: &HttpConfig,
    gate: &LoadGate,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, WarmerError> {
    let attempts = http.retries + 1;
    let mut attempt = 1;

    loop {
        gate.wait_until_ready(cancel).await?;

        let err = match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        if attempt >= attempts {
            return Err(err);
        }

        let backoff = Duration::from_secs_f64(f64::from(attempt) * http.retry_backoff_seconds);
        tracing::debug!(
            "Fetch failed ({}) attempt {}/{} for {}; sleeping {:.1}s",
            err,
            attempt,
            attempts,
            url,
            backoff.as_secs_f64()
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            _ = tokio::time::sleep(backoff) => {}
        }
        attempt += 1;
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<Vec<u8>, WarmerError> {
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    if status >= 400 {
        return Err(WarmerError::HttpStatus(status));
    }

    let body = response.bytes().await?;

    if url.to_ascii_lowercase().ends_with(".gz") {
        return gunzip(&body).map_err(WarmerError::Gzip);
    }
    Ok(body.to_vec())
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_gunzip_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<urlset></urlset>").unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = gunzip(&compressed).unwrap();
        assert_eq!(decompressed, b"<urlset></urlset>");
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        assert!(gunzip(b"definitely not a gzip stream").is_err());
    }
}
