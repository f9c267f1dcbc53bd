//! Atomic packfile store on a content-addressed object service.
//!
//! Packs are committed through a staged-upload -> manifest -> promote ->
//! cleanup protocol so a reader never observes a partial pack; an orphan
//! sweeper reconciles anything a crashed writer left behind. Writers
//! coordinate through object-service conditional writes rather than any
//! in-process lock, via [`lock::DistributedLock`].

pub mod download;
pub mod lock;
pub mod manifest;
pub mod memory;
pub mod midx_rebuild;
pub mod service;
pub mod sweeper;
pub mod upload;

pub use lock::DistributedLock;
pub use manifest::{ManifestStatus, PackKeys, PackManifest};
pub use memory::InMemoryObjectService;
pub use service::{ListPage, ObjectMeta, ObjectService, PutCondition};
pub use sweeper::{sweep_orphans, SweepReport};

/// Errors produced by the atomic packfile store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("precondition failed for '{key}'")]
    PreconditionFailed { key: String },

    #[error("lock held on resource '{resource}'")]
    LockHeld { resource: String },

    #[error("invalid byte range for '{key}'")]
    InvalidRange { key: String },

    #[error("invalid pack: {0}")]
    InvalidPack(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("corrupt object at '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
