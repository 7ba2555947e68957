//! Consent payload model and durable snapshot storage.
//!
//! [`ConsentModel`] is a tolerant parser/accessor over the JSON payload the
//! consent service sends back; it answers per-id status queries offline and
//! exports the canonical consent string. [`ConsentStorage`] is the durable
//! key/value contract for the last acquired snapshot, with file-backed and
//! in-memory implementations.

mod model;
mod store;

pub use model::{
    ConsentModel, GppData, MetadataEntry, PurposeEntry, TcfSection, VendorEntry,
    GOOGLE_CONSENT_BASELINE,
};
pub use store::{ConsentStorage, FileStore, MemoryStore, StorageError, StoredSnapshot};
