use std::fmt::Display;

use http::StatusCode;
use http::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::{ErrorKind, Result};

/// Normalized result of an API call, independent of the vendor behind it.
///
/// The raw transport response is consumed eagerly: status, headers and body
/// are captured so the value can be cloned, inspected after the fact, and
/// carried inside error variants.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Final URL of the response, after redirects
    pub url: Url,
    /// Decoded response body
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Capture a transport response into its normalized form.
    ///
    /// Bodies are decoded by content type: JSON when the `Content-Type` says
    /// so, text for textual types, raw bytes otherwise. Malformed JSON never
    /// fails the call; it degrades to the raw text so error bodies stay
    /// readable.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let bytes = response.bytes().await.map_err(ErrorKind::ReadResponseBody)?;

        let body = if bytes.is_empty() {
            ResponseBody::Empty
        } else if content_type.contains("json") {
            match serde_json::from_slice(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            }
        } else if content_type.starts_with("text/") {
            ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            ResponseBody::Bytes(bytes.to_vec())
        };

        Ok(Self {
            status,
            headers,
            url,
            body,
        })
    }

    /// Returns `true` if the status is in the 2xx range
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the JSON body into `T`, if the body is JSON
    #[must_use]
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        match &self.body {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    /// Turn this response into a terminal outcome.
    ///
    /// 2xx is a success. 429 and 5xx become transient errors which the
    /// client retries internally; every other status (including 1xx and
    /// unfollowed 3xx) is a permanent [`ErrorKind::ClientError`].
    pub(crate) fn classify(self) -> Result<Self> {
        match self.status {
            status if status.is_success() => Ok(self),
            StatusCode::TOO_MANY_REQUESTS => Err(ErrorKind::RateLimited(Box::new(self))),
            status if status.is_server_error() => Err(ErrorKind::ServerError(Box::new(self))),
            _ => Err(ErrorKind::ClientError(Box::new(self))),
        }
    }
}

impl Display for ApiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.url)
    }
}

/// Decoded body of an [`ApiResponse`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// A parsed JSON document
    Json(serde_json::Value),
    /// A textual body, also the fallback for malformed JSON
    Text(String),
    /// A binary body
    Bytes(Vec<u8>),
    /// No body
    Empty,
}

impl ResponseBody {
    /// The JSON document, if this body is JSON
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The body as text, if it is textual
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` if there is no body
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;

    use super::{ApiResponse, ResponseBody};
    use crate::types::ErrorKind;

    fn response(status: StatusCode, body: ResponseBody) -> ApiResponse {
        ApiResponse {
            status,
            headers: HeaderMap::new(),
            url: Url::parse("https://api.example.com/v1/thing").unwrap(),
            body,
        }
    }

    #[test]
    fn test_classify_success() {
        let ok = response(StatusCode::OK, ResponseBody::Json(json!({"id": 1})))
            .classify()
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.body.as_json(), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_classify_client_error() {
        let result = response(StatusCode::NOT_FOUND, ResponseBody::Empty).classify();
        assert!(matches!(result, Err(ErrorKind::ClientError(_))));
    }

    #[test]
    fn test_classify_transient_statuses() {
        let result = response(StatusCode::TOO_MANY_REQUESTS, ResponseBody::Empty).classify();
        assert!(matches!(result, Err(ErrorKind::RateLimited(_))));

        let result = response(StatusCode::BAD_GATEWAY, ResponseBody::Empty).classify();
        assert!(matches!(result, Err(ErrorKind::ServerError(_))));
    }

    #[test]
    fn test_json_accessor() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payment {
            id: u64,
        }

        let ok = response(StatusCode::OK, ResponseBody::Json(json!({"id": 42})));
        assert_eq!(ok.json::<Payment>(), Some(Payment { id: 42 }));

        let text = response(StatusCode::OK, ResponseBody::Text("not json".into()));
        assert_eq!(text.json::<Payment>(), None);
        assert_eq!(text.body.as_text(), Some("not json"));
    }
}
