//! Handler of requests, in charge of retrying transient failures and
//! delegating single attempts to the per-host state.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use log::debug;
use typed_builder::TypedBuilder;
use url::Url;

use crate::config::ClientConfig;
use crate::ratelimit::{HostKey, HostPool, HostStats, HostStatsMap};
use crate::retry::{RetryExt, RetryPolicy};
use crate::types::{ApiResponse, ErrorKind, RequestSpec, Result};

/// Default user agent, `courier/x.y.z`
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// All fields are optional; `ClientBuilder::default().client()` yields a
/// client with the default configuration.
///
/// # Examples
///
/// ```
/// use courier::{ClientBuilder, ClientConfig};
///
/// let mut config = ClientConfig::default();
/// config.retry.max_attempts = 5;
///
/// let client = ClientBuilder::builder()
///     .config(config)
///     .build()
///     .client()
///     .unwrap();
/// # let _ = client;
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
pub struct ClientBuilder {
    /// Configuration for rate limiting, pooling, retries and timeouts
    config: ClientConfig,

    /// User agent sent with every request
    #[builder(default_code = "DEFAULT_USER_AGENT.to_string()")]
    user_agent: String,

    /// Headers sent with every request, on top of which per-host headers
    /// and per-request headers are layered
    custom_headers: HeaderMap,

    /// Accept invalid TLS certificates (for hosts with self-signed certs)
    allow_insecure: bool,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiate a [`Client`]
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent cannot be encoded as a header
    /// value
    pub fn client(self) -> Result<Client> {
        let user_agent = HeaderValue::from_str(&self.user_agent)?;
        let retry = RetryPolicy::from(&self.config.retry);
        let pool = HostPool::new(self.config, self.custom_headers, user_agent, self.allow_insecure);

        Ok(Client { pool, retry })
    }
}

/// Handles outbound API requests.
///
/// A `Client` is cheap to clone and safe to share across tasks; clones share
/// the per-host buckets, pools and statistics.
#[derive(Debug, Clone)]
pub struct Client {
    /// Per-host buckets, pools and statistics
    pool: HostPool,

    /// How transient failures are retried
    retry: RetryPolicy,
}

impl Client {
    /// Send the request described by `spec`, retrying transient failures.
    ///
    /// Network errors, 429 and 5xx responses are retried with exponential
    /// backoff until the attempt budget is spent; a `Retry-After` header on
    /// a 429 overrides the computed backoff. Any other failure is returned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RetryExhausted`] wrapping the final failure once
    /// all attempts are spent, or the terminal error of the first
    /// non-retryable failure.
    pub async fn invoke(&self, spec: &RequestSpec) -> Result<ApiResponse> {
        let mut attempt: u32 = 0;
        loop {
            match self.pool.execute(spec).await {
                Ok(response) => return Ok(response),
                Err(err) if err.should_retry() => {
                    let attempts = attempt + 1;
                    if attempts >= self.retry.max_attempts {
                        return Err(ErrorKind::RetryExhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }

                    let delay = err
                        .retry_after()
                        .map_or_else(|| self.retry.backoff(attempt), |d| self.retry.clamp(d));
                    debug!(
                        "Attempt {attempts} for {} failed ({err}), retrying in {delay:?}",
                        spec.url
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Shorthand for a GET request without body or auth
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Client::invoke`]
    pub async fn get(&self, url: Url) -> Result<ApiResponse> {
        self.invoke(&RequestSpec::get(url)).await
    }

    /// Statistics snapshot for a single host, if it has been contacted
    #[must_use]
    pub fn host_stats(&self, key: &HostKey) -> Option<HostStats> {
        self.pool.host_stats(key)
    }

    /// Statistics snapshots for all hosts contacted so far
    #[must_use]
    pub fn all_host_stats(&self) -> HostStatsMap {
        self.pool.all_host_stats()
    }

    /// Remaining global concurrency permits
    #[must_use]
    pub fn available_global_permits(&self) -> usize {
        self.pool.available_global_permits()
    }
}

/// Object-safe invocation seam, so vendor wrappers can be tested against a
/// stub instead of a live client
#[async_trait]
pub trait Invoke: Send + Sync {
    /// Send the request described by `spec`
    async fn invoke(&self, spec: &RequestSpec) -> Result<ApiResponse>;
}

#[async_trait]
impl Invoke for Client {
    async fn invoke(&self, spec: &RequestSpec) -> Result<ApiResponse> {
        Client::invoke(self, spec).await
    }
}

/// Convenience function for a one-off GET request with default settings.
///
/// Creates a throwaway [`Client`], so no rate limit or pool state is shared
/// with other calls. Use a [`Client`] for anything beyond a single request.
///
/// # Errors
///
/// Same failure modes as [`Client::invoke`]
pub async fn get(url: Url) -> Result<ApiResponse> {
    let client = ClientBuilder::default().client()?;
    client.get(url).await
}
