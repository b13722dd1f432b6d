//! Storage module
//!
//! This module contains the persistence medium abstraction and the
//! namespaced, versioned store built on top of it.

mod medium;
mod store;

pub use medium::{FileMedium, MemoryMedium, StorageMedium};
pub use store::{
    EntityMeta, ExportEntry, ExportSnapshot, LoadReport, SkippedRecord, StorageInfo,
    StoreMetadata, VersionedStore,
};
