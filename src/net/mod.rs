//! HTTP plumbing for the remote catalog index and package downloads.
//!
//! - **HTTP Client**: A global, configured HTTP client with connection pooling
//! - **Rate Limiting**: Per-host rate limiting so index refreshes and package downloads
//!   don't hammer the repository
//! - **Retry Logic**: Automatic retries with exponential backoff
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::net::HttpClient;
//!
//! # async fn example() -> hondana::Result<()> {
//! let client = HttpClient::new("tachiyomi.kanade.eu")
//!     .with_rate_limit(500);  // 500ms between requests
//!
//! let index = client
//!     .get("https://tachiyomi.kanade.eu/repo/index.min.json")
//!     .await?;
//! println!("{} bytes", index.len());
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Global HTTP client instance.
///
/// - 60-second timeout, packages can be large
/// - Connection pooling (10 idle connections per host)
/// - Compression support (gzip, brotli)
///
/// Created lazily on first use and shared by every [`HttpClient`].
static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("hondana/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to build HTTP client")
});

/// Per-key rate limiter enforcing a minimum delay between requests.
///
/// # Thread Safety
///
/// The rate limiter uses a `Mutex` internally and is safe to use across multiple
/// threads and async tasks.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<HashMap<String, Instant>>,
    default_delay: Duration,
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
            default_delay: self.default_delay,
        }
    }
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified delay in milliseconds.
    ///
    /// ```rust
    /// use hondana::net::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(500);
    /// ```
    pub fn new(delay_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
            default_delay: Duration::from_millis(delay_ms),
        }
    }

    /// Waits if the previous request for `key` was less than the delay ago.
    pub async fn wait(&self, key: &str) {
        let now = Instant::now();
        let wait_duration = {
            let last_map = self.last_request.lock();
            last_map
                .get(key)
                .map(|&last| now.duration_since(last))
                .filter(|elapsed| *elapsed < self.default_delay)
                .map(|elapsed| self.default_delay - elapsed)
        };

        if let Some(duration) = wait_duration {
            tokio::time::sleep(duration).await;
        }

        self.last_request
            .lock()
            .insert(key.to_string(), Instant::now());
    }
}

/// HTTP client wrapper with built-in rate limiting and retry logic.
///
/// Each client is bound to a key (usually the repository host) that rate limiting and
/// error messages refer to.
///
/// # Examples
///
/// ```rust,no_run
/// use hondana::net::HttpClient;
///
/// # async fn example() -> hondana::Result<()> {
/// let client = HttpClient::new("repo").with_rate_limit(1000);
///
/// let blob = client.get("https://tachiyomi.kanade.eu/repo/apk/example.apk").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    key: String,
    rate_limiter: RateLimiter,
    max_retries: u32,
}

impl HttpClient {
    /// Creates a client with a 200ms rate limit and 3 retries.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rate_limiter: RateLimiter::new(200),
            max_retries: 3,
        }
    }

    /// Sets the minimum delay between requests in milliseconds.
    pub fn with_rate_limit(mut self, delay_ms: u64) -> Self {
        self.rate_limiter = RateLimiter::new(delay_ms);
        self
    }

    /// Performs a GET request with automatic retry logic and rate limiting.
    ///
    /// 429 responses are retried with exponential backoff, then reported with the
    /// server's `Retry-After` value.
    ///
    /// # Errors
    ///
    /// * [`Error::RateLimit`](crate::Error::RateLimit) - If rate limited after retries
    /// * [`Error::Source`](crate::Error::Source) - For HTTP errors (4xx, 5xx)
    /// * [`Error::Network`](crate::Error::Network) - For network/connection errors
    pub async fn get(&self, url: &str) -> crate::Result<Bytes> {
        let mut attempts = 0;

        loop {
            self.rate_limiter.wait(&self.key).await;
            debug!(url, attempt = attempts, "GET");

            match CLIENT.get(url).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response.bytes().await?);
                    }

                    if response.status() == 429 {
                        if attempts < self.max_retries {
                            attempts += 1;
                            let delay = Duration::from_secs(2_u64.pow(attempts));
                            warn!(url, ?delay, "Rate limited, backing off");
                            tokio::time::sleep(delay).await;
                            continue;
                        }

                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());

                        return Err(crate::Error::rate_limit(retry_after));
                    }

                    return Err(crate::Error::source(
                        &self.key,
                        format!("HTTP {} for {}", response.status(), url),
                    ));
                }
                Err(e) => {
                    if attempts < self.max_retries {
                        attempts += 1;
                        warn!(url, error = %e, "Request failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

}
