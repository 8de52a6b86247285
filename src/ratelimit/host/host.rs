use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

use crate::config::ClientConfig;
use crate::connection::{self, ConnectionPool, PooledConnection};
use crate::ratelimit::{HostKey, HostStats};
use crate::types::{ApiResponse, ErrorKind, RequestSpec, Result};

/// Per-host request state: token bucket, connection pool and statistics.
///
/// All requests to one hostname flow through a single `Host`, so the bucket
/// and the pool are shared across concurrent callers. Acquisition order is
/// fixed: first a rate limit token, then a pooled connection. A caller that
/// cannot get a token never occupies a connection while it waits.
pub struct Host {
    key: HostKey,
    client: reqwest::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    token_wait_timeout: Duration,
    pool: ConnectionPool,
    pool_wait_timeout: Duration,
    request_timeout: Duration,
    stats: Mutex<HostStats>,
}

impl Host {
    /// Create per-host state from the effective configuration for `key`
    pub(crate) fn new(key: HostKey, client: reqwest::Client, config: &ClientConfig) -> Result<Self> {
        let host_config = config.hosts.get(&key).cloned().unwrap_or_default();

        let capacity = host_config.effective_capacity(config);
        let refill_interval = host_config.effective_refill_interval(config);

        let quota = Quota::with_period(refill_interval)
            .ok_or_else(|| ErrorKind::InvalidRateLimitInterval { host: key.clone() })?
            .allow_burst(capacity);

        let pool = connection::build_pool(
            &key,
            client.clone(),
            host_config.effective_max_connections(config),
            host_config.effective_idle_timeout(config),
            config.pool.wait_timeout,
        )?;

        debug!(
            "Initialized host {key}: capacity={capacity}, refill={refill_interval:?}, \
             max_connections={}",
            host_config.effective_max_connections(config)
        );

        Ok(Self {
            key,
            client,
            limiter: RateLimiter::direct(quota),
            token_wait_timeout: config.rate_limit.wait_timeout,
            pool,
            pool_wait_timeout: config.pool.wait_timeout,
            request_timeout: config.request_timeout,
            stats: Mutex::new(HostStats::default()),
        })
    }

    /// The hostname this state belongs to
    #[must_use]
    pub fn key(&self) -> &HostKey {
        &self.key
    }

    /// Snapshot of the statistics recorded for this host
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Assemble a transport request from `spec` against this host's client
    pub(crate) fn build_request(&self, spec: &RequestSpec) -> Result<reqwest::Request> {
        spec.build_request(&self.client, self.request_timeout)
    }

    /// Perform a single attempt: wait for a token, check out a connection,
    /// send the request and normalize the response.
    ///
    /// A transport failure taints the checked-out connection, which is
    /// discarded instead of being returned to the pool.
    pub(crate) async fn execute(&self, request: reqwest::Request) -> Result<ApiResponse> {
        self.acquire_token().await?;
        let connection = self.checkout_connection().await?;
        debug!("Sending request to {} over connection {}", self.key, connection.id);

        let start = Instant::now();
        let result = connection.client.execute(request).await;
        let request_time = start.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let _ = PooledConnection::take(connection);
                self.record_network_error();
                return Err(ErrorKind::NetworkRequest(e));
            }
        };

        let status_code = response.status().as_u16();
        match ApiResponse::from_reqwest(response).await {
            Ok(normalized) => {
                self.record_response(status_code, request_time);
                normalized.classify()
            }
            Err(e) => {
                // The connection was cut mid-body; discard it like a send
                // failure and count the request as a network error
                let _ = PooledConnection::take(connection);
                self.record_network_error();
                Err(e)
            }
        }
    }

    /// Wait until the bucket yields a token, up to the configured budget
    async fn acquire_token(&self) -> Result<()> {
        tokio::time::timeout(self.token_wait_timeout, self.limiter.until_ready())
            .await
            .map_err(|_| ErrorKind::RateLimitTimeout {
                host: self.key.clone(),
                timeout: self.token_wait_timeout,
            })
    }

    async fn checkout_connection(&self) -> Result<PooledConnection> {
        self.pool.get().await.map_err(|e| match e {
            deadpool::managed::PoolError::Backend(e) => e,
            _ => ErrorKind::PoolExhausted {
                host: self.key.clone(),
                timeout: self.pool_wait_timeout,
            },
        })
    }

    fn record_response(&self, status_code: u16, request_time: Duration) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_response(status_code, request_time);
    }

    fn record_network_error(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_network_error();
    }
}

// The governor limiter and the deadpool pool have no useful Debug output
impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("key", &self.key)
            .field("token_wait_timeout", &self.token_wait_timeout)
            .field("pool_wait_timeout", &self.pool_wait_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
