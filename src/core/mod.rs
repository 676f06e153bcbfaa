//! Core data layer: flat snapshots, the flattening codec, schema
//! projection and version ordering.

mod flatten;
mod schema;
mod snapshot;
mod version;

pub use flatten::{PATH_DELIMITER, flatten, join_path};
pub use schema::Schema;
pub use snapshot::Snapshot;
pub use version::{compare, is_newer_or_equal};
