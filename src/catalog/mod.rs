//! Layout catalog wiring.
//!
//! `identity` holds the small value types (layout kinds, snapshot dates),
//! `model` the on-disk snapshot envelope, `repository` snapshot discovery, and
//! `layouts` the per-project [`LayoutCatalog`] that ties configuration,
//! indexing, and snapshots together.

pub mod identity;
pub mod layouts;
pub mod model;
pub mod repository;

pub use identity::{LayoutKind, SnapshotDate};
pub use layouts::{LayoutCatalog, Representation};
pub use model::{Snapshot, check_snapshot_readable, load_snapshot_from_path, write_snapshot};
pub use repository::{LayoutSnapshots, SnapshotEntry, SnapshotRepository};
