//! Per-principal data partitions: naming, provisioning, scoped CRUD,
//! cross-tenant aggregation, and teardown.

pub mod aggregator;
pub mod gateway;
pub mod naming;
pub mod provisioner;
pub mod teardown;

/// Reserved name of the marker row inserted when a partition is created.
/// Every ordinary read path excludes it by name filter, and the gateway
/// rejects writes that would use it, so it can never shadow a real record.
pub const SENTINEL_NAME: &str = "Collection Metadata";
