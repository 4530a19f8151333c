//! Input readers: byte-offset caches, schema-driven CSV parsing, and the
//! scenario loader that assembles partitions from a scenario directory.

pub mod cache;
pub mod data;
pub mod scenario;

pub use cache::{OffsetCache, EMPTY_VISIT_SCHEDULE};
