use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{ErrorKind, Result};

/// A type-safe representation of a hostname.
///
/// All per-host state (rate limit bucket, connection pool, statistics) is
/// keyed by this type. Hostnames are normalized to lowercase so requests to
/// the same host always share one bucket and pool.
///
/// # Examples
///
/// ```
/// use courier::ratelimit::HostKey;
/// use url::Url;
///
/// let url = Url::parse("https://API.Stripe.com/v1/charges").unwrap();
/// let key = HostKey::try_from(&url).unwrap();
/// assert_eq!(key.as_str(), "api.stripe.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostKey(String);

impl HostKey {
    /// Get the hostname as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the hostname as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or(ErrorKind::InvalidUrlHost)?;
        Ok(HostKey(host.to_lowercase()))
    }
}

impl TryFrom<Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: Url) -> Result<Self> {
        HostKey::try_from(&url)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostKey {
    fn from(host: String) -> Self {
        HostKey(host.to_lowercase())
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        HostKey(host.to_lowercase())
    }
}
