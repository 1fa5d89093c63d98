//! Production projectors. Each one is the sole writer of its tables.

mod checks_result;
mod cluster;
mod host;
mod sap_system;
mod sles_subscription;

pub use checks_result::ChecksResultProjector;
pub use cluster::ClusterProjector;
pub use host::HostProjector;
pub use sap_system::SapSystemProjector;
pub use sles_subscription::SlesSubscriptionProjector;
