use url::Url;

use crate::types::{ApiResponse, RequestSpec, Result};
use crate::{Client, ClientBuilder};

#[macro_export]
/// Creates a mock web server, which responds with a predefined status when
/// handling a matching request
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Helper method to build a client with default settings
///
/// # Panic
///
/// This panics on error, so it should only be used for testing
pub(crate) fn test_client() -> Client {
    ClientBuilder::default()
        .client()
        .expect("Expected client to build")
}

/// Helper method to convert a string into a URL
///
/// # Panic
///
/// This panics on error, so it should only be used for testing
pub(crate) fn website(url: &str) -> Url {
    Url::parse(url).expect("Expected valid URL")
}

pub(crate) async fn get_mock_response(server: &wiremock::MockServer) -> Result<ApiResponse> {
    test_client()
        .invoke(&RequestSpec::get(website(&server.uri())))
        .await
}
