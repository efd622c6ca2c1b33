//! Data models shared by the client façade and its backends.
//!
//! `ObjectSummary` and `ObjectStat` are what callers see. `Bucket`,
//! `ObjectRecord` and `MetadataEntry` are the rows of the local backend's
//! SQLite catalog and map to tables via `sqlx::FromRow`.

pub mod bucket;
pub mod metadata;
pub mod object;

pub use bucket::Bucket;
pub use metadata::{Metadata, MetadataEntry};
pub use object::{ObjectRecord, ObjectStat, ObjectSummary};
