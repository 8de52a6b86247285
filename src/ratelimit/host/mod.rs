#[allow(clippy::module_inception)]
mod host;
mod key;
mod stats;

pub use host::Host;
pub use key::HostKey;
pub use stats::{HostStats, HostStatsMap};
