//! Resilient HTTP fetcher
//!
//! One GET with the full survival kit: retry with exponential backoff and
//! jitter, `Retry-After`-aware rate-limit handling that does not burn the
//! retry budget, manual redirect following with loop detection, and
//! per-host plus process-wide rate limiting. Redirects are followed by an
//! explicit loop with an owned visited-set, so pathological chains cannot
//! grow the call stack.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::infrastructure::config::FetcherConfig;
use crate::infrastructure::rate_limiter::HostRateLimiter;

/// Fetch failure taxonomy. Only status/network errors are retryable;
/// 403/404 and redirect loops fail immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("404 Not Found: {0}")]
    NotFound(String),

    #[error("403 Forbidden: {0}")]
    Forbidden(String),

    #[error("HTTP error {status} for {url}")]
    Status { status: u16, url: String },

    #[error("redirect loop detected: {0}")]
    RedirectLoop(String),

    #[error("redirect from {0} carried no Location header")]
    MissingLocation(String),

    #[error("request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request cancelled for {0}")]
    Cancelled(String),

    #[error("failed to fetch {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Status { .. } | FetchError::Network { .. })
    }
}

/// A fetched page body with its status and the URL that finally served it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub status: u16,
    pub final_url: String,
}

/// Per-call fetch options. Everything defaults to the fetcher config.
#[derive(Default)]
pub struct FetchOptions<'a> {
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub headers: Option<HeaderMap>,
    /// Per-host limiter, awaited before every attempt (not just the first).
    pub limiter: Option<&'a HostRateLimiter>,
}

/// HTTP client with retry, backoff, and rate limiting for respectful
/// crawling. Cheap to share behind an `Arc`.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    global_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            // redirects are followed manually for loop protection
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            config,
            global_limiter: RateLimiter::direct(quota),
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch a URL, retrying transient failures and following redirects.
    ///
    /// Budget accounting: redirects and failed attempts share the retry
    /// budget; 429 waits do not consume it.
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions<'_>,
    ) -> Result<FetchedPage, FetchError> {
        if url.is_empty() {
            return Err(FetchError::InvalidUrl(String::new()));
        }
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries).max(1);
        let mut current = url.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current.clone());
        let mut backoff = Duration::from_millis(self.config.backoff_base_ms);
        let mut attempts_used = 0u32;
        let mut last_error: Option<FetchError> = None;

        while attempts_used < max_retries {
            self.global_limiter.until_ready().await;
            if let Some(limiter) = options.limiter {
                limiter.wait().await;
            }

            debug!(
                "HTTP GET (attempt {}/{}): {}",
                attempts_used + 1,
                max_retries,
                current
            );
            let mut request = self.client.get(&current);
            if let Some(timeout) = options.timeout {
                request = request.timeout(timeout);
            }
            if let Some(headers) = &options.headers {
                request = request.headers(headers.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = retry_after(&response).unwrap_or(backoff * 5);
                        warn!("rate limited (429) for {}, waiting {:?}", current, wait);
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if status.is_success() {
                        let final_url = current.clone();
                        let body = response.text().await.map_err(|source| {
                            FetchError::Network {
                                url: final_url.clone(),
                                source,
                            }
                        })?;
                        debug!("fetched {} ({} chars)", final_url, body.len());
                        return Ok(FetchedPage {
                            body,
                            status: status.as_u16(),
                            final_url,
                        });
                    }

                    if matches!(status.as_u16(), 301 | 302 | 307 | 308) {
                        attempts_used += 1;
                        let location = response
                            .headers()
                            .get(LOCATION)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_string);
                        let Some(location) = location else {
                            return Err(FetchError::MissingLocation(current));
                        };
                        let target = resolve_redirect(&current, &location)?;
                        info!("following redirect: {} -> {}", current, target);
                        if !visited.insert(target.clone()) {
                            return Err(FetchError::RedirectLoop(target));
                        }
                        current = target;
                        continue;
                    }

                    if status == StatusCode::NOT_FOUND {
                        warn!("404 Not Found: {}. Stopping retries.", current);
                        return Err(FetchError::NotFound(current));
                    }
                    if status == StatusCode::FORBIDDEN {
                        return Err(FetchError::Forbidden(current));
                    }

                    last_error = Some(FetchError::Status {
                        status: status.as_u16(),
                        url: current.clone(),
                    });
                }
                Err(source) => {
                    last_error = Some(FetchError::Network {
                        url: current.clone(),
                        source,
                    });
                }
            }

            attempts_used += 1;
            if attempts_used >= max_retries {
                break;
            }
            // exponential backoff with +-50% jitter
            let wait = backoff.mul_f64(0.5 + fastrand::f64());
            warn!(
                "retry {}/{} for {}: {}; waiting {:?}",
                attempts_used,
                max_retries,
                current,
                last_error.as_ref().map_or_else(String::new, ToString::to_string),
                wait
            );
            tokio::time::sleep(wait).await;
            backoff *= 2;
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_retries,
            last: last_error.map_or_else(
                || "retry budget exhausted following redirects".to_string(),
                |e| e.to_string(),
            ),
        })
    }

    /// Fetch and return the body text.
    pub async fn fetch_text(
        &self,
        url: &str,
        options: &FetchOptions<'_>,
    ) -> Result<String, FetchError> {
        Ok(self.fetch(url, options).await?.body)
    }

    /// Fetch with cooperative cancellation.
    pub async fn fetch_with_cancellation(
        &self,
        url: &str,
        options: &FetchOptions<'_>,
        token: CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        if token.is_cancelled() {
            return Err(FetchError::Cancelled(url.to_string()));
        }
        tokio::select! {
            result = self.fetch(url, options) => result,
            () = token.cancelled() => {
                warn!("fetch cancelled for {}", url);
                Err(FetchError::Cancelled(url.to_string()))
            }
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn resolve_redirect(current: &str, location: &str) -> Result<String, FetchError> {
    let base = Url::parse(current).map_err(|_| FetchError::InvalidUrl(current.to_string()))?;
    let target = base
        .join(location)
        .map_err(|_| FetchError::InvalidUrl(location.to_string()))?;
    Ok(target.to_string())
}
