use std::io;
use std::time::Duration;

use http::StatusCode;

use crate::config::RetryConfig;
use crate::types::ErrorKind;

/// Maximum share of the computed backoff delay added as random jitter
const JITTER_FACTOR: f64 = 0.1;

/// An extension trait to help determine if a given failure is transient and
/// worth another attempt.
///
/// Modified from `Retryable` in [reqwest-middleware].
/// We vendor this code to avoid a dependency on `reqwest-middleware` and
/// to easily customize the logic.
///
/// [reqwest-middleware]: https://github.com/TrueLayer/reqwest-middleware/blob/f854725791ccf4a02c401a26cab3d9db753f468c/reqwest-retry/src/retryable.rs
pub(crate) trait RetryExt {
    fn should_retry(&self) -> bool;
}

impl RetryExt for StatusCode {
    /// Server errors and 429 are transient; everything else a host answers
    /// with is a terminal outcome for that request.
    fn should_retry(&self) -> bool {
        self.is_server_error() || *self == StatusCode::TOO_MANY_REQUESTS
    }
}

impl RetryExt for reqwest::Error {
    #[allow(clippy::if_same_then_else)]
    fn should_retry(&self) -> bool {
        if self.is_timeout() || self.is_connect() {
            true
        } else if self.is_builder() || self.is_redirect() {
            false
        } else if self.is_body() || self.is_decode() {
            // Body and decode errors wrap the transport failure when the
            // connection is cut mid-body; dig it out and classify it
            if let Some(hyper_error) = get_source_error_type::<hyper::Error>(&self) {
                should_retry_hyper(hyper_error)
            } else if let Some(io_error) = get_source_error_type::<io::Error>(&self) {
                should_retry_io(io_error)
            } else {
                false
            }
        } else if self.is_request() {
            // It seems that hyper::Error(IncompleteMessage) is not correctly handled by reqwest.
            // Here we check if the Reqwest error was originated by hyper and map it consistently.
            if let Some(hyper_error) = get_source_error_type::<hyper::Error>(&self) {
                should_retry_hyper(hyper_error)
            } else {
                false
            }
        } else if let Some(status) = self.status() {
            status.should_retry()
        } else {
            false
        }
    }
}

impl RetryExt for ErrorKind {
    fn should_retry(&self) -> bool {
        match self {
            // Transport failures delegate to the underlying `reqwest`
            // error, whether the send or the body read failed
            Self::NetworkRequest(e) | Self::ReadResponseBody(e) => e.should_retry(),
            Self::ServerError(_) | Self::RateLimited(_) => true,
            _ => false,
        }
    }
}

/// Classifies a `hyper` transport error into retryable or not.
///
/// The hyper::Error(IncompleteMessage) is raised if the HTTP response is
/// well formatted but does not contain all the bytes. This can happen when
/// the server has started sending back the response but the connection is
/// cut halfway through. We can safely retry the call, hence marking this
/// error as transient.
///
/// Instead hyper::Error(Canceled) is raised when the connection is
/// gracefully closed on the server side.
fn should_retry_hyper(error: &hyper::Error) -> bool {
    if error.is_incomplete_message() || error.is_canceled() {
        true

    // Try and downcast the hyper error to [`io::Error`] if that is the
    // underlying error, and try and classify it.
    } else if let Some(io_error) = get_source_error_type::<io::Error>(error) {
        should_retry_io(io_error)
    } else {
        false
    }
}

/// Classifies an `io::Error` into retryable or not.
fn should_retry_io(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
    )
}

/// Downcasts the given err source into T.
fn get_source_error_type<T: std::error::Error + 'static>(
    err: &dyn std::error::Error,
) -> Option<&T> {
    let mut source = err.source();

    while let Some(err) = source {
        if let Some(typed_err) = err.downcast_ref::<T>() {
            return Some(typed_err);
        }

        source = err.source();
    }
    None
}

/// Exponential backoff with jitter between attempts.
///
/// The delay before attempt `n + 1` is `min(max_delay, base_delay * 2^n)`
/// plus a random jitter of up to 10% of that delay, so synchronized clients
/// do not hammer a recovering host in lockstep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    /// Total number of attempts per logical request
    pub(crate) max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following attempt number `attempt`
    /// (zero-based)
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        delay + delay.mul_f64(rand::random::<f64>() * JITTER_FACTOR)
    }

    /// Clamp a server-mandated wait to the configured maximum
    pub(crate) fn clamp(&self, delay: Duration) -> Duration {
        delay.min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }
}
