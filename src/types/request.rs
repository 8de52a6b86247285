use std::time::Duration;

use http::header::HeaderMap;
use reqwest::Method;
use typed_builder::TypedBuilder;
use url::Url;

use crate::types::{AuthConfig, ErrorKind, Result};

/// Specification of a single outbound API request.
///
/// Created per call by vendor wrappers and handed to
/// [`Client::invoke`](crate::Client::invoke). A spec is not consumed by a
/// call, so the same value can be re-submitted; internal retries rebuild the
/// transport request from the spec on every attempt.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RequestSpec {
    /// Target URL, including scheme, host and path
    pub url: Url,

    /// HTTP method, e.g. `GET` or `POST`
    #[builder(default = Method::GET)]
    pub method: Method,

    /// Additional headers for this request
    #[builder(default)]
    pub headers: HeaderMap,

    /// Optional request body
    #[builder(default, setter(strip_option, into))]
    pub body: Option<RequestBody>,

    /// Optional authentication scheme.
    ///
    /// At most one scheme is attached; see [`AuthConfig`].
    #[builder(default, setter(strip_option))]
    pub auth: Option<AuthConfig>,

    /// Per-request timeout, overriding the client's default
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// A plain GET spec for the given URL
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::builder().url(url).build()
    }

    /// Assemble a transport request from this spec.
    ///
    /// Applies the auth scheme's header transformation and the effective
    /// timeout (per-request override or the client default).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidAuthConfig`] for malformed auth input and
    /// [`ErrorKind::BuildRequest`] if the transport rejects the request.
    pub(crate) fn build_request(
        &self,
        client: &reqwest::Client,
        default_timeout: Duration,
    ) -> Result<reqwest::Request> {
        let mut headers = self.headers.clone();
        if let Some(auth) = &self.auth {
            auth.apply(&mut headers)?;
        }

        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
            .timeout(self.timeout.unwrap_or(default_timeout));

        builder = match &self.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        builder.build().map_err(ErrorKind::BuildRequest)
    }
}

/// Request payload attached to a [`RequestSpec`]
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// A JSON document, serialized with `Content-Type: application/json`
    Json(serde_json::Value),
    /// A plain text body
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::header::CONTENT_TYPE;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;
    use url::Url;

    use super::RequestSpec;
    use crate::types::AuthConfig;

    fn url() -> Url {
        Url::parse("https://api.example.com/v1/messages").unwrap()
    }

    #[test]
    fn test_build_applies_method_url_and_auth() {
        let spec = RequestSpec::builder()
            .url(url())
            .method(Method::POST)
            .auth(AuthConfig::api_key("k", "X-API-Key"))
            .body(json!({"to": "+15550100", "text": "hi"}))
            .build();

        let request = spec
            .build_request(&reqwest::Client::new(), Duration::from_secs(20))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "https://api.example.com/v1/messages");
        assert_eq!(request.headers().get("x-api-key").unwrap(), "k");
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_timeout_override_beats_default() {
        let spec = RequestSpec::builder()
            .url(url())
            .timeout(Duration::from_millis(250))
            .build();
        let request = spec
            .build_request(&reqwest::Client::new(), Duration::from_secs(20))
            .unwrap();
        assert_eq!(request.timeout(), Some(&Duration::from_millis(250)));

        let spec = RequestSpec::get(url());
        let request = spec
            .build_request(&reqwest::Client::new(), Duration::from_secs(20))
            .unwrap();
        assert_eq!(request.timeout(), Some(&Duration::from_secs(20)));
    }
}
