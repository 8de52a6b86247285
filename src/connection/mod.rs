//! Per-host connection pooling.
//!
//! Each host gets its own bounded pool of [`Connection`] handles. A handle is
//! checked out for the duration of exactly one request, so a connection is
//! never shared between concurrent requests. Handles idle for longer than the
//! configured TTL are discarded on checkout and replaced with fresh ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deadpool::Runtime;
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult, Timeouts};

use crate::ratelimit::HostKey;
use crate::types::{ErrorKind, Result};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// A bounded pool of connections for a single host
pub(crate) type ConnectionPool = managed::Pool<ConnectionManager>;

/// A connection checked out of a [`ConnectionPool`].
///
/// Returned to the pool on drop.
pub(crate) type PooledConnection = managed::Object<ConnectionManager>;

/// An exclusive-use handle onto a host's transport client.
///
/// The `id` identifies the handle across checkouts, which makes connection
/// reuse observable without inspecting sockets.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    /// Identity of this handle, stable across checkouts
    pub(crate) id: u64,
    /// The client used to drive requests over this connection
    pub(crate) client: reqwest::Client,
}

/// Creates and recycles [`Connection`]s for one host
pub(crate) struct ConnectionManager {
    client: reqwest::Client,
    idle_timeout: Duration,
}

impl ConnectionManager {
    pub(crate) const fn new(client: reqwest::Client, idle_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
        }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = ErrorKind;

    async fn create(&self) -> Result<Connection> {
        Ok(Connection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            client: self.client.clone(),
        })
    }

    async fn recycle(&self, _conn: &mut Connection, metrics: &Metrics) -> RecycleResult<ErrorKind> {
        if metrics.last_used() > self.idle_timeout {
            return Err(RecycleError::message("idle timeout expired"));
        }
        Ok(())
    }
}

/// Build a connection pool for `host` with the given cap, idle TTL and
/// checkout wait budget
pub(crate) fn build_pool(
    host: &HostKey,
    client: reqwest::Client,
    max_connections: usize,
    idle_timeout: Duration,
    wait_timeout: Duration,
) -> Result<ConnectionPool> {
    let manager = ConnectionManager::new(client, idle_timeout);

    ConnectionPool::builder(manager)
        .max_size(max_connections)
        .timeouts(Timeouts {
            wait: Some(wait_timeout),
            create: None,
            recycle: None,
        })
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|source| ErrorKind::BuildConnectionPool {
            host: host.clone(),
            source,
        })
}
