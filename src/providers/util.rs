use crate::core::model::ProviderId;
use crate::core::provider::{ProviderError, ProviderResult};
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Retries an async provider call while it fails with a retryable error
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
/// - `cancel`: No further attempt is started once this fires
///
/// # Returns
/// Either the successful result or the last error. Non-retryable errors
/// (rate limits, unknown symbols) are returned at once.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
    cancel: &CancellationToken,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !err.is_retryable() || cancel.is_cancelled() {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Retry abandoned, cancelled");
                        return Err(err);
                    }
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                }
            }
        }
    }
}

/// Unix seconds `(from, to)` spanning `years` back from now. Years count as
/// 366 days so leap days never cut the start short; callers trim to the
/// exact window.
pub fn history_window(years: u32) -> (i64, i64) {
    let to = Utc::now();
    let from = to - chrono::Duration::days(366 * i64::from(years));
    (from.timestamp(), to.timestamp())
}

pub fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .user_agent("stockboard/0.1")
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Sends `request` and returns the body, classifying HTTP failures.
pub async fn send_request(
    provider: ProviderId,
    symbol: &str,
    request: RequestBuilder,
) -> ProviderResult<String> {
    let response = request.send().await.map_err(|e| ProviderError::Transient {
        provider,
        message: if e.is_timeout() {
            format!("Request timed out for {symbol}")
        } else {
            format!("Request error for {symbol}: {e}")
        },
    })?;

    let status = response.status();
    debug!(%status, %provider, symbol, "Received response");
    match status {
        StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited { provider }),
        StatusCode::NOT_FOUND => {
            return Err(ProviderError::NotFound {
                provider,
                symbol: symbol.to_string(),
            });
        }
        s if !s.is_success() => {
            return Err(ProviderError::Transient {
                provider,
                message: format!("HTTP error: {s} for {symbol}"),
            });
        }
        _ => {}
    }

    response.text().await.map_err(|e| ProviderError::Transient {
        provider,
        message: format!("Failed to read response for {symbol}: {e}"),
    })
}

pub fn parse_json<T: DeserializeOwned>(
    provider: ProviderId,
    symbol: &str,
    text: &str,
) -> ProviderResult<T> {
    serde_json::from_str(text).map_err(|e| ProviderError::Validation {
        provider,
        message: format!("Failed to parse JSON response for {symbol}: {e}"),
    })
}
