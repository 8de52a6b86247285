use headers::{Authorization, HeaderMapExt};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::types::{ErrorKind, Result};

/// Authentication scheme attached to a [`RequestSpec`](crate::RequestSpec).
///
/// At most one scheme can be attached to a request, which the enum enforces
/// by construction. Secret material is held as [`SecretString`] so it never
/// shows up in debug output or logs.
///
/// `courier` does not perform token acquisition or refresh; all variants
/// inject credentials the caller has already obtained.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AuthConfig {
    /// A static API key sent in a vendor-defined header
    ApiKey {
        /// The key value
        key: SecretString,
        /// Name of the header carrying the key, e.g. `X-API-Key`
        header: String,
    },
    /// A bearer token sent as `Authorization: Bearer <token>`
    Bearer {
        /// The token value
        token: SecretString,
    },
    /// Basic auth credentials, encoded into an `Authorization` header
    Basic {
        /// Basic auth username
        username: String,
        /// Basic auth password
        password: SecretString,
    },
    /// An OAuth2 access token, sent as a bearer token
    OAuth2 {
        /// The access token value
        access_token: SecretString,
    },
    /// A JWT, sent as a bearer token
    Jwt {
        /// The encoded token
        token: SecretString,
    },
}

impl AuthConfig {
    /// API key auth with the given header name
    pub fn api_key(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self::ApiKey {
            key: SecretString::from(key.into()),
            header: header.into(),
        }
    }

    /// Bearer token auth
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: SecretString::from(token.into()),
        }
    }

    /// Basic auth from a username and password
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// OAuth2 access token auth
    pub fn oauth2(access_token: impl Into<String>) -> Self {
        Self::OAuth2 {
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// JWT auth
    pub fn jwt(token: impl Into<String>) -> Self {
        Self::Jwt {
            token: SecretString::from(token.into()),
        }
    }

    /// Inject this scheme's header(s) into `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidAuthConfig`] if required fields are empty
    /// or cannot be encoded as header values.
    pub(crate) fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        match self {
            Self::ApiKey { key, header } => {
                if header.trim().is_empty() {
                    return Err(ErrorKind::InvalidAuthConfig(
                        "API key header name is empty".to_string(),
                    ));
                }
                if key.expose_secret().is_empty() {
                    return Err(ErrorKind::InvalidAuthConfig("API key is empty".to_string()));
                }
                let name = HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
                    ErrorKind::InvalidAuthConfig(format!("'{header}' is not a valid header name"))
                })?;
                let mut value = HeaderValue::from_str(key.expose_secret()).map_err(|_| {
                    ErrorKind::InvalidAuthConfig("API key is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                headers.insert(name, value);
            }
            Self::Bearer { token } | Self::OAuth2 { access_token: token } | Self::Jwt { token } => {
                Self::apply_bearer(token, headers)?;
            }
            Self::Basic { username, password } => {
                if username.is_empty() {
                    return Err(ErrorKind::InvalidAuthConfig(
                        "Basic auth username is empty".to_string(),
                    ));
                }
                headers.typed_insert(Authorization::basic(username, password.expose_secret()));
                mark_sensitive(headers);
            }
        }
        Ok(())
    }

    fn apply_bearer(token: &SecretString, headers: &mut HeaderMap) -> Result<()> {
        if token.expose_secret().is_empty() {
            return Err(ErrorKind::InvalidAuthConfig("Bearer token is empty".to_string()));
        }
        let auth = Authorization::bearer(token.expose_secret()).map_err(|_| {
            ErrorKind::InvalidAuthConfig("Bearer token contains invalid characters".to_string())
        })?;
        headers.typed_insert(auth);
        mark_sensitive(headers);
        Ok(())
    }
}

fn mark_sensitive(headers: &mut HeaderMap) {
    if let Some(value) = headers.get_mut(header::AUTHORIZATION) {
        value.set_sensitive(true);
    }
}
