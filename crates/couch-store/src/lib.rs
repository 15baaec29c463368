//! Flat-file storage for the couch pipeline.
//!
//! This crate provides:
//! - Atomic write-then-rename for JSON and binary artifacts
//! - The playlist catalog and detection stores
//! - Per-video record directories (classifications, hex colour lists)
//! - The on-disk layout shared by every stage

pub mod catalog;
pub mod detections;
pub mod error;
pub mod fs_utils;
pub mod layout;
pub mod records;

pub use catalog::CatalogStore;
pub use detections::DetectionStore;
pub use error::{StorageError, StorageResult};
pub use fs_utils::{read_json, write_atomic, write_json_atomic};
pub use layout::DataLayout;
pub use records::RecordDir;
