use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::ratelimit::{HostKey, parse_retry_after};
use crate::types::ApiResponse;

/// Result type alias using [`ErrorKind`] as the error variant
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Possible errors when issuing requests through `courier`
///
/// Callers only ever observe terminal outcomes: retryable failures are
/// handled internally and surface as [`ErrorKind::RetryExhausted`] once
/// the retry budget is spent.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The auth configuration attached to a request is missing required
    /// fields or contains values which cannot be encoded as headers.
    /// Never retried; the caller must fix the request.
    #[error("Invalid auth configuration: {0}")]
    InvalidAuthConfig(String),

    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or byte
    /// slice.
    #[error("Header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// An URL with an invalid host was found
    #[error("URL is missing a host")]
    InvalidUrlHost,

    /// The configuration document could not be parsed
    #[error("Failed to parse configuration")]
    ParseConfig(#[from] toml::de::Error),

    /// The request could not be assembled from its spec
    #[error("Failed to build request")]
    BuildRequest(#[source] reqwest::Error),

    /// The underlying transport client could not be created
    #[error("Failed to build request client")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The connection pool for a host could not be created
    #[error("Failed to build connection pool for host {host}")]
    BuildConnectionPool {
        /// The host whose pool failed to build
        host: HostKey,
        /// Underlying pool build error
        #[source]
        source: deadpool::managed::BuildError,
    },

    /// User specified an invalid rate limit refill interval
    #[error("Invalid rate limit refill interval for host {host}")]
    InvalidRateLimitInterval {
        /// The host with invalid configuration
        host: HostKey,
    },

    /// No rate limit token became available within the wait budget
    #[error("Timed out after {timeout:?} waiting for a rate limit token for host {host}")]
    RateLimitTimeout {
        /// The host whose bucket was empty
        host: HostKey,
        /// How long the caller was willing to wait
        timeout: Duration,
    },

    /// All pooled connections were busy and none freed up in time
    #[error("Connection pool for host {host} exhausted after waiting {timeout:?}")]
    PoolExhausted {
        /// The host whose pool was exhausted
        host: HostKey,
        /// How long the caller was willing to wait
        timeout: Duration,
    },

    /// The host rejected the request with a 4xx status other than 429.
    /// Permanent; surfaced as-is without retries.
    #[error("Request rejected with client error status {}", .0.status)]
    ClientError(Box<ApiResponse>),

    /// The host answered with 429 Too Many Requests. Transient.
    #[error("Host answered with 429 Too Many Requests")]
    RateLimited(Box<ApiResponse>),

    /// The host answered with a 5xx status. Transient.
    #[error("Host answered with server error status {}", .0.status)]
    ServerError(Box<ApiResponse>),

    /// Network error while trying to connect to an endpoint
    #[error("Network error while trying to connect to an endpoint")]
    NetworkRequest(#[source] reqwest::Error),

    /// The response body could not be read
    #[error("Failed to read response body")]
    ReadResponseBody(#[source] reqwest::Error),

    /// The retry budget is spent. Wraps the error of the last attempt.
    #[error("Gave up after {attempts} attempts")]
    RetryExhausted {
        /// Total number of attempts made
        attempts: u32,
        /// The failure of the final attempt
        #[source]
        source: Box<ErrorKind>,
    },
}

impl ErrorKind {
    /// Return the underlying `reqwest` error, if this error wraps one
    #[must_use]
    pub fn reqwest_error(&self) -> Option<&reqwest::Error> {
        match self {
            Self::BuildRequest(e)
            | Self::BuildRequestClient(e)
            | Self::NetworkRequest(e)
            | Self::ReadResponseBody(e) => Some(e),
            Self::RetryExhausted { source, .. } => source.reqwest_error(),
            _ => None,
        }
    }

    /// Return the HTTP status attached to this error, if any
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ClientError(response) | Self::RateLimited(response) | Self::ServerError(response) => {
                Some(response.status)
            }
            Self::NetworkRequest(e) | Self::ReadResponseBody(e) => e.status(),
            Self::RetryExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Return the normalized response carried by this error, if any.
    ///
    /// This gives vendor wrappers access to the original status and body so
    /// they can produce vendor-specific error messages.
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::ClientError(response) | Self::RateLimited(response) | Self::ServerError(response) => {
                Some(response)
            }
            Self::RetryExhausted { source, .. } => source.response(),
            _ => None,
        }
    }

    /// The server-mandated wait before the next attempt, if the host sent a
    /// parseable `Retry-After` header alongside a 429.
    pub(crate) fn retry_after(&self) -> Option<Duration> {
        if let Self::RateLimited(response) = self
            && let Some(value) = response.headers.get(http::header::RETRY_AFTER)
        {
            return parse_retry_after(value).ok();
        }
        None
    }
}
