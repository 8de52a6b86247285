//! Client configuration.
//!
//! All tunables live in a single [`ClientConfig`] constructed once at client
//! build time and passed by reference from there on; nothing is read from
//! ambient global state inside request handling. Per-host overrides fall
//! back to the global defaults.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::ratelimit::HostKey;
use crate::types::Result;

/// Default token capacity of a host's rate limit bucket
const DEFAULT_CAPACITY: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Default interval at which a host's bucket regains one token
const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_millis(50);

/// Default wait budget for a rate limit token
const DEFAULT_TOKEN_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of pooled connections per host
const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// Default idle TTL after which a pooled connection is discarded
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default wait budget for a pooled connection
const DEFAULT_POOL_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of attempts before a request is deemed as failed, 3
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default initial wait time between attempts, 1 second
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound for the backoff delay
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default timeout per request, 20 seconds
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default limit on concurrent requests across all hosts
const DEFAULT_MAX_CONCURRENCY: usize = 128;

/// Top-level configuration for a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Rate limiting defaults applied to every host
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Connection pooling defaults applied to every host
    #[serde(default)]
    pub pool: PoolConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout applied to requests without a per-request override
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Limit on concurrent requests across all hosts
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-host configuration overrides
    #[serde(default)]
    pub hosts: HostConfigs,
}

impl ClientConfig {
    /// Parse a configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ParseConfig`](crate::ErrorKind::ParseConfig) if
    /// the document is not valid TOML or contains unknown fields
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            pool: PoolConfig::default(),
            retry: RetryConfig::default(),
            request_timeout: default_request_timeout(),
            max_concurrency: default_max_concurrency(),
            hosts: HostConfigs::default(),
        }
    }
}

/// Rate limiting configuration that applies as a default to all hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Token capacity of the bucket (maximum burst)
    #[serde(default = "default_capacity")]
    pub capacity: NonZeroU32,

    /// Interval at which the bucket regains one token
    #[serde(default = "default_refill_interval", with = "humantime_serde")]
    pub refill_interval: Duration,

    /// How long a caller may wait for a token before the request fails
    /// with `RateLimitTimeout`
    #[serde(default = "default_token_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_interval: default_refill_interval(),
            wait_timeout: default_token_wait_timeout(),
        }
    }
}

/// Connection pool configuration that applies as a default to all hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of pooled connections per host
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Idle TTL after which a pooled connection is discarded
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// How long a caller may wait for a connection before the request
    /// fails with `PoolExhausted`
    #[serde(default = "default_pool_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            idle_timeout: default_idle_timeout(),
            wait_timeout: default_pool_wait_timeout(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total number of attempts per logical request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial wait time between attempts.
    ///
    /// The wait time doubles with every attempt, up to `max_delay`.
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for the backoff delay, before jitter
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

const fn default_capacity() -> NonZeroU32 {
    DEFAULT_CAPACITY
}

const fn default_refill_interval() -> Duration {
    DEFAULT_REFILL_INTERVAL
}

const fn default_token_wait_timeout() -> Duration {
    DEFAULT_TOKEN_WAIT_TIMEOUT
}

const fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

const fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

const fn default_pool_wait_timeout() -> Duration {
    DEFAULT_POOL_WAIT_TIMEOUT
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_base_delay() -> Duration {
    DEFAULT_BASE_DELAY
}

const fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Per-host configuration overrides, keyed by normalized hostname
pub type HostConfigs = HashMap<HostKey, HostConfig>;

/// Configuration overrides for a specific host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Token capacity override for this host
    pub capacity: Option<NonZeroU32>,

    /// Refill interval override for this host
    #[serde(default, with = "humantime_serde")]
    pub refill_interval: Option<Duration>,

    /// Connection cap override for this host
    pub max_connections: Option<usize>,

    /// Idle TTL override for this host
    #[serde(default, with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,

    /// Extra headers to send with every request to this host
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,
}

impl HostConfig {
    /// Effective token capacity, falling back to the global default
    #[must_use]
    pub fn effective_capacity(&self, config: &ClientConfig) -> NonZeroU32 {
        self.capacity.unwrap_or(config.rate_limit.capacity)
    }

    /// Effective refill interval, falling back to the global default
    #[must_use]
    pub fn effective_refill_interval(&self, config: &ClientConfig) -> Duration {
        self.refill_interval
            .unwrap_or(config.rate_limit.refill_interval)
    }

    /// Effective connection cap, falling back to the global default
    #[must_use]
    pub fn effective_max_connections(&self, config: &ClientConfig) -> usize {
        self.max_connections.unwrap_or(config.pool.max_connections)
    }

    /// Effective idle TTL, falling back to the global default
    #[must_use]
    pub fn effective_idle_timeout(&self, config: &ClientConfig) -> Duration {
        self.idle_timeout.unwrap_or(config.pool.idle_timeout)
    }
}

/// Custom deserializer for headers from TOML config format
fn deserialize_headers<'de, D>(deserializer: D) -> std::result::Result<HeaderMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    let mut header_map = HeaderMap::new();

    for (name, value) in map {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            serde::de::Error::custom(format!("Invalid header value '{value}': {e}"))
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}

/// Custom serializer for headers to TOML config format
fn serialize_headers<S>(headers: &HeaderMap, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect();
    map.serialize(serializer)
}
