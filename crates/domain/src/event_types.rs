//! Discriminators of the event types agents report.

pub const HOST_DISCOVERED: &str = "host.discovered";
pub const HOST_DEREGISTERED: &str = "host.deregistered";
pub const HOST_HEARTBEAT: &str = "host.heartbeat";
pub const CLUSTER_DISCOVERED: &str = "cluster.discovered";
pub const SAP_SYSTEM_DISCOVERED: &str = "sap_system.discovered";
pub const SUBSCRIPTION_DISCOVERED: &str = "subscription.discovered";
pub const CHECKS_RESULT_REPORTED: &str = "checks_result.reported";

/// Every discriminator with a production projector.
pub const ALL: &[&str] = &[
    HOST_DISCOVERED,
    HOST_DEREGISTERED,
    HOST_HEARTBEAT,
    CLUSTER_DISCOVERED,
    SAP_SYSTEM_DISCOVERED,
    SUBSCRIPTION_DISCOVERED,
    CHECKS_RESULT_REPORTED,
];
