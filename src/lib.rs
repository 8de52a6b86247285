//! `courier` is a library for calling third-party HTTP APIs without
//! overwhelming them: every hostname gets its own token bucket rate limit
//! and bounded connection pool, transient failures are retried with
//! exponential backoff, and responses come back in one normalized shape.
//!
//! "Hello world" example:
//! ```no_run
//! use courier::Result;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let url = Url::parse("https://api.github.com/octocat").unwrap();
//!   let response = courier::get(url).await?;
//!   println!("{response}");
//!   Ok(())
//! }
//! ```
//!
//! For more specific use-cases you can build a courier client yourself,
//! using the `ClientBuilder` which can be used to
//! configure rate limits, retries, pooling and authentication per request:
//!
//! ```no_run
//! use courier::{AuthConfig, ClientBuilder, RequestSpec, Result};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::default().client()?;
//!
//!   let spec = RequestSpec::builder()
//!       .url(Url::parse("https://api.stripe.com/v1/charges").unwrap())
//!       .auth(AuthConfig::bearer("sk_test_123"))
//!       .build();
//!
//!   let response = client.invoke(&spec).await?;
//!   assert!(response.is_success());
//!   Ok(())
//! }
//! ```

mod client;
mod connection;
mod retry;
mod types;

pub mod config;
pub mod ratelimit;
#[cfg(test)]
#[macro_use]
pub mod test_utils;

pub use client::get;
pub use client::{Client, ClientBuilder, DEFAULT_USER_AGENT, Invoke};
pub use config::{ClientConfig, HostConfig, PoolConfig, RateLimitConfig, RetryConfig};
pub use ratelimit::{HostKey, HostStats, HostStatsMap};
pub use types::*;
