//! Per-host request governance.
//!
//! Every hostname gets its own token bucket, connection pool and statistics,
//! created on first contact and shared by all subsequent requests to that
//! host. The bucket smooths request rates; the pool bounds concurrent
//! connections; the statistics feed reporting.

mod headers;
mod host;
mod pool;
mod window;

pub use host::{Host, HostKey, HostStats, HostStatsMap};
pub use pool::HostPool;
pub use window::Window;

pub(crate) use headers::parse_retry_after;
