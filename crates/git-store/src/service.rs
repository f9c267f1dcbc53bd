//! The object service trait this crate is built against.
//!
//! Everything in `git-store` is a client of a content-addressed,
//! conditional-write object service (an S3-like blob store). The store
//! itself is the single source of truth for persistence; all coordination
//! between writers goes through the conditions this trait exposes.

use std::collections::HashMap;
use std::ops::Range;

use async_trait::async_trait;

use crate::StoreError;

/// A precondition attached to a [`ObjectService::put`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// Succeed only if the current ETag of `key` equals this value.
    EtagMatches(String),
    /// Succeed only if `key` does not currently exist (`if-not-exists`).
    EtagDoesNotMatch,
}

/// Metadata returned by [`ObjectService::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub etag: String,
    pub size: u64,
    pub custom_metadata: HashMap<String, String>,
}

/// One page of a [`ObjectService::list`] call.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// A content-addressed object service with conditional writes.
///
/// This is the external collaborator spec'd as the "object service
/// (required)" interface: `put`, `get`, `head`, `delete`, `list`. Every
/// method that mutates state takes an explicit precondition so callers can
/// build compare-and-swap protocols (staged uploads, manifests, locks) on
/// top of it without the service itself knowing about any of that.
#[async_trait]
pub trait ObjectService: Send + Sync {
    /// Write `bytes` to `key`, honoring `condition` if given.
    ///
    /// Returns `Err(StoreError::PreconditionFailed)` if a condition is
    /// given and not satisfied.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        condition: Option<PutCondition>,
        custom_metadata: HashMap<String, String>,
    ) -> Result<ObjectMeta, StoreError>;

    /// Read `key`, optionally restricted to a byte range.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str, range: Option<Range<u64>>) -> Result<Option<Vec<u8>>, StoreError>;

    /// Read metadata for `key` without fetching its body.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError>;

    /// Delete `key`. A missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete several keys. A missing key is not an error.
    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// List keys under `prefix`, paginated via an opaque cursor.
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StoreError>;

    /// List every key under `prefix`, draining all pages.
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.list(prefix, cursor.as_deref()).await?;
            out.extend(page.keys);
            match page.cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(out)
    }
}
