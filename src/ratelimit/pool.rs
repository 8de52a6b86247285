use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::{HeaderMap, HeaderValue, header};
use log::debug;
use tokio::sync::Semaphore;

use crate::config::ClientConfig;
use crate::ratelimit::{Host, HostKey, HostStats, HostStatsMap};
use crate::types::{ApiResponse, ErrorKind, RequestSpec, Result};

/// Timeout for establishing TCP connections
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP keepalive interval for pooled sockets
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Routes requests to per-host state, creating it on first contact.
///
/// Host state is created lazily and kept for the lifetime of the pool, so
/// every request to a hostname shares the same token bucket and connection
/// pool. A global semaphore bounds concurrency across all hosts.
#[derive(Debug, Clone)]
pub struct HostPool {
    config: Arc<ClientConfig>,
    hosts: Arc<DashMap<HostKey, Arc<Host>>>,
    default_headers: HeaderMap,
    user_agent: HeaderValue,
    allow_insecure: bool,
    permits: Arc<Semaphore>,
}

impl HostPool {
    pub(crate) fn new(
        config: ClientConfig,
        default_headers: HeaderMap,
        user_agent: HeaderValue,
        allow_insecure: bool,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            config: Arc::new(config),
            hosts: Arc::new(DashMap::new()),
            default_headers,
            user_agent,
            allow_insecure,
            permits,
        }
    }

    /// Perform a single attempt of `spec` against its host
    pub(crate) async fn execute(&self, spec: &RequestSpec) -> Result<ApiResponse> {
        let key = HostKey::try_from(&spec.url)?;
        let host = self.host(&key)?;
        let request = host.build_request(spec)?;

        let _permit = self
            .permits
            .acquire()
            .await
            // `acquire` can only fail if the semaphore is closed, which
            // never happens as we keep it open for the pool's lifetime
            .expect("Semaphore was closed unexpectedly");

        host.execute(request).await
    }

    /// Get or create the state for `key`
    fn host(&self, key: &HostKey) -> Result<Arc<Host>> {
        if let Some(host) = self.hosts.get(key) {
            return Ok(host.clone());
        }

        debug!("Creating host state for {key}");
        let client = self.build_host_client(key)?;
        let host = Arc::new(Host::new(key.clone(), client, &self.config)?);

        // A racing task may have inserted the host in the meantime; keep
        // whichever entry won so all callers share one bucket and pool
        Ok(self.hosts.entry(key.clone()).or_insert(host).clone())
    }

    /// Build the transport client for `key`, merging per-host headers over
    /// the client-wide defaults
    fn build_host_client(&self, key: &HostKey) -> Result<reqwest::Client> {
        let mut headers = self.default_headers.clone();
        if let Some(host_config) = self.config.hosts.get(key) {
            for (name, value) in &host_config.headers {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers.insert(header::USER_AGENT, self.user_agent.clone());

        reqwest::Client::builder()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(self.allow_insecure)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .map_err(ErrorKind::BuildRequestClient)
    }

    /// Statistics snapshot for a single host, if it has been contacted
    #[must_use]
    pub fn host_stats(&self, key: &HostKey) -> Option<HostStats> {
        self.hosts.get(key).map(|host| host.stats())
    }

    /// Statistics snapshots for all hosts contacted so far
    #[must_use]
    pub fn all_host_stats(&self) -> HostStatsMap {
        let stats: HashMap<String, HostStats> = self
            .hosts
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect();
        stats.into()
    }

    /// Number of hosts with live state
    #[must_use]
    pub fn active_host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Remaining global concurrency permits
    #[must_use]
    pub fn available_global_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
