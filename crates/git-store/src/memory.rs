//! An in-memory [`ObjectService`] for tests and local development.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::service::{ListPage, ObjectMeta, ObjectService, PutCondition};
use crate::StoreError;

struct Entry {
    bytes: Vec<u8>,
    etag: String,
    custom_metadata: HashMap<String, String>,
}

/// A process-local object service backed by a concurrent hash map.
///
/// Not durable and not shared across processes; exists so the upload,
/// sweep, and lock protocols in this crate can be exercised without a real
/// blob store.
#[derive(Default)]
pub struct InMemoryObjectService {
    objects: DashMap<String, Entry>,
    etag_counter: AtomicU64,
}

impl InMemoryObjectService {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> String {
        let n = self.etag_counter.fetch_add(1, Ordering::Relaxed);
        format!("etag-{n}")
    }
}

#[async_trait]
impl ObjectService for InMemoryObjectService {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        condition: Option<PutCondition>,
        custom_metadata: HashMap<String, String>,
    ) -> Result<ObjectMeta, StoreError> {
        let existing_etag = self.objects.get(key).map(|e| e.etag.clone());

        match &condition {
            Some(PutCondition::EtagMatches(expected)) => {
                if existing_etag.as_deref() != Some(expected.as_str()) {
                    return Err(StoreError::PreconditionFailed {
                        key: key.to_string(),
                    });
                }
            }
            Some(PutCondition::EtagDoesNotMatch) => {
                if existing_etag.is_some() {
                    return Err(StoreError::PreconditionFailed {
                        key: key.to_string(),
                    });
                }
            }
            None => {}
        }

        let etag = self.next_etag();
        let size = bytes.len() as u64;
        self.objects.insert(
            key.to_string(),
            Entry {
                bytes,
                etag: etag.clone(),
                custom_metadata: custom_metadata.clone(),
            },
        );

        Ok(ObjectMeta {
            etag,
            size,
            custom_metadata,
        })
    }

    async fn get(&self, key: &str, range: Option<Range<u64>>) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(entry) = self.objects.get(key) else {
            return Ok(None);
        };
        match range {
            Some(r) => {
                let start = r.start as usize;
                let end = (r.end as usize).min(entry.bytes.len());
                if start > end {
                    return Err(StoreError::InvalidRange { key: key.to_string() });
                }
                Ok(Some(entry.bytes[start..end].to_vec()))
            }
            None => Ok(Some(entry.bytes.clone())),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        Ok(self.objects.get(key).map(|entry| ObjectMeta {
            etag: entry.etag.clone(),
            size: entry.bytes.len() as u64,
            custom_metadata: entry.custom_metadata.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StoreError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();

        let start = match cursor {
            Some(c) => keys.iter().position(|k| k.as_str() > c).unwrap_or(keys.len()),
            None => 0,
        };
        Ok(ListPage {
            keys: keys[start..].to_vec(),
            cursor: None,
        })
    }
}
