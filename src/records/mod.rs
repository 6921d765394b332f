//! Operator-managed name to address records.
//!
//! - `store`: the shared, lock-protected record set
//! - `snapshot`: the JSON file the set is persisted to after every change
//! - `record`: the record type, name normalization and validation

pub mod record;
pub mod snapshot;
pub mod store;

pub use record::{Record, fqdn, validate_name};
pub use snapshot::SnapshotFile;
pub use store::RecordStore;

use std::net::IpAddr;

/// Anything that can answer an address lookup by name.
///
/// The responder depends on this rather than on `RecordStore` directly.
pub trait RecordSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<IpAddr>;
}
