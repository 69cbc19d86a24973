//! Per-host request rate limiting
//!
//! Each host gets one limiter enforcing a minimum interval between
//! requests, with a little random jitter so concurrent workers hitting the
//! same host do not synchronize into bursts. The limiter is a shared
//! single-writer resource: callers queue on one mutex, so the interval
//! holds across however many tasks share it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::utils::domain_of;

/// Minimum-interval limiter for a single host.
#[derive(Debug)]
pub struct HostRateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HostRateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let requests_per_second = requests_per_second.max(0.001);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request slot for this host is available.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                // jitter avoids thundering-herd alignment across workers
                let jitter = Duration::from_millis(fastrand::u64(0..100));
                tokio::time::sleep(self.min_interval - elapsed + jitter).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Registry handing out one shared limiter per host.
#[derive(Debug)]
pub struct HostLimiters {
    requests_per_second: f64,
    limiters: Mutex<HashMap<String, Arc<HostRateLimiter>>>,
}

impl HostLimiters {
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            requests_per_second,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// The limiter for the host of the given URL. URLs that fail to parse
    /// share a catch-all limiter rather than escaping rate control.
    pub async fn for_url(&self, url: &str) -> Arc<HostRateLimiter> {
        let host = domain_of(url).unwrap_or_else(|| "unknown".to_string());
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(host)
            .or_insert_with(|| Arc::new(HostRateLimiter::new(self.requests_per_second)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let limiter = HostRateLimiter::new(1.0);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_request_waits_for_the_interval() {
        let limiter = HostRateLimiter::new(10.0); // 100ms interval
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn same_host_shares_a_limiter() {
        let limiters = HostLimiters::new(2.0);
        let a = limiters.for_url("https://www.example.com/a").await;
        let b = limiters.for_url("https://example.com/b").await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = limiters.for_url("https://other.example.org").await;
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
