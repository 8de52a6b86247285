mod auth;
mod error;
mod request;
mod response;

pub use auth::AuthConfig;
pub use error::{ErrorKind, Result};
pub use request::{RequestBody, RequestSpec};
pub use response::{ApiResponse, ResponseBody};
