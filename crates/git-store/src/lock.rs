//! Distributed lock built on the object service's conditional writes.
//!
//! Locks never hold a connection or an in-process mutex; they are just a
//! JSON blob at `locks/{resource}.lock` whose presence, `lock_id`, and
//! `expires_at` two writers race over via `put` preconditions. All
//! timestamps are passed in by the caller rather than read from the system
//! clock, so acquire/refresh/sweep stay deterministic under test.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::manifest::PackKeys;
use crate::service::{ObjectService, PutCondition};
use crate::StoreError;

/// The JSON body stored at a lock key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockContent {
    pub lock_id: String,
    pub resource: String,
    pub acquired_at: u64,
    pub expires_at: u64,
    pub holder: Option<String>,
}

/// A held distributed lock. Dropping this without calling [`release`]
/// leaves the lock in place until its TTL expires or the sweeper collects
/// it — this type intentionally has no `Drop` impl, since release is a
/// fallible network operation the caller must await explicitly.
///
/// [`release`]: DistributedLock::release
pub struct DistributedLock {
    service: Arc<dyn ObjectService>,
    key: String,
    resource: String,
    lock_id: String,
}

impl DistributedLock {
    /// Acquire the lock on `resource`, or fail if another holder's lock is
    /// still unexpired at `now_ms`.
    pub async fn acquire(
        service: Arc<dyn ObjectService>,
        keys: &PackKeys,
        resource: &str,
        ttl_ms: u64,
        now_ms: u64,
        holder: Option<String>,
    ) -> Result<Self, StoreError> {
        let key = keys.lock(resource);
        let existing = service.get(&key, None).await?;

        let condition = match &existing {
            Some(bytes) => {
                let content: LockContent = serde_json::from_slice(bytes)
                    .map_err(|e| StoreError::Corrupt { key: key.clone(), reason: e.to_string() })?;
                if content.expires_at > now_ms {
                    return Err(StoreError::LockHeld { resource: resource.to_string() });
                }
                let meta = service.head(&key).await?.ok_or_else(|| StoreError::Corrupt {
                    key: key.clone(),
                    reason: "lock disappeared between get and head".into(),
                })?;
                PutCondition::EtagMatches(meta.etag)
            }
            None => PutCondition::EtagDoesNotMatch,
        };

        let lock_id = Uuid::new_v4().to_string();
        let content = LockContent {
            lock_id: lock_id.clone(),
            resource: resource.to_string(),
            acquired_at: now_ms,
            expires_at: now_ms + ttl_ms,
            holder,
        };
        let bytes = serde_json::to_vec(&content)
            .map_err(|e| StoreError::Corrupt { key: key.clone(), reason: e.to_string() })?;

        service
            .put(&key, bytes, Some(condition), Default::default())
            .await
            .map_err(|e| match e {
                StoreError::PreconditionFailed { .. } => {
                    StoreError::LockHeld { resource: resource.to_string() }
                }
                other => other,
            })?;

        // Re-read to defeat a race where another writer won the condition
        // and wrote its own lock_id immediately after our put.
        let confirmed = service
            .get(&key, None)
            .await?
            .ok_or_else(|| StoreError::Corrupt { key: key.clone(), reason: "lock missing after put".into() })?;
        let confirmed: LockContent = serde_json::from_slice(&confirmed)
            .map_err(|e| StoreError::Corrupt { key: key.clone(), reason: e.to_string() })?;
        if confirmed.lock_id != lock_id {
            return Err(StoreError::LockHeld { resource: resource.to_string() });
        }

        Ok(Self {
            service,
            key,
            resource: resource.to_string(),
            lock_id,
        })
    }

    /// Release the lock iff we still own it. Never unconditionally
    /// deletes — a lock we no longer own belongs to whoever broke it.
    pub async fn release(self) -> Result<(), StoreError> {
        let Some(bytes) = self.service.get(&self.key, None).await? else {
            return Ok(());
        };
        let content: LockContent = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt { key: self.key.clone(), reason: e.to_string() })?;
        if content.lock_id == self.lock_id {
            self.service.delete(&self.key).await?;
        }
        Ok(())
    }

    /// Extend the lock's `expires_at` to `now_ms + ttl_ms`. Returns `false`
    /// if we no longer own the lock (someone else broke it as stale).
    pub async fn refresh(&self, ttl_ms: u64, now_ms: u64) -> Result<bool, StoreError> {
        let Some(meta) = self.service.head(&self.key).await? else {
            return Ok(false);
        };
        let bytes = self.service.get(&self.key, None).await?.ok_or_else(|| StoreError::Corrupt {
            key: self.key.clone(),
            reason: "lock disappeared between head and get".into(),
        })?;
        let mut content: LockContent = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt { key: self.key.clone(), reason: e.to_string() })?;
        if content.lock_id != self.lock_id {
            return Ok(false);
        }
        content.expires_at = now_ms + ttl_ms;
        let new_bytes = serde_json::to_vec(&content)
            .map_err(|e| StoreError::Corrupt { key: self.key.clone(), reason: e.to_string() })?;

        match self
            .service
            .put(
                &self.key,
                new_bytes,
                Some(PutCondition::EtagMatches(meta.etag)),
                Default::default(),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }
}

/// Delete every lock whose `expires_at` has passed (relative to `now_ms`)
/// or whose content fails to parse. Run periodically out-of-band; never
/// touches an unexpired, well-formed lock.
pub async fn sweep_stale_locks(
    service: &dyn ObjectService,
    keys: &PackKeys,
    now_ms: u64,
) -> Result<Vec<String>, StoreError> {
    let mut swept = Vec::new();
    for key in service.list_all(&keys.locks_prefix()).await? {
        let Some(bytes) = service.get(&key, None).await? else {
            continue;
        };
        let stale = match serde_json::from_slice::<LockContent>(&bytes) {
            Ok(content) => content.expires_at <= now_ms,
            Err(_) => true,
        };
        if stale {
            service.delete(&key).await?;
            swept.push(key);
        }
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectService;

    fn keys() -> PackKeys {
        PackKeys::new("")
    }

    #[tokio::test]
    async fn acquire_then_release() {
        let svc: Arc<dyn ObjectService> = Arc::new(InMemoryObjectService::new());
        let lock = DistributedLock::acquire(svc.clone(), &keys(), "res1", 10_000, 0, None)
            .await
            .unwrap();
        assert_eq!(lock.resource(), "res1");
        lock.release().await.unwrap();
        assert!(svc.get(&keys().lock("res1"), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_acquire_fails_while_unexpired() {
        let svc: Arc<dyn ObjectService> = Arc::new(InMemoryObjectService::new());
        let _lock = DistributedLock::acquire(svc.clone(), &keys(), "res1", 10_000, 0, None)
            .await
            .unwrap();
        let result = DistributedLock::acquire(svc.clone(), &keys(), "res1", 10_000, 1, None).await;
        assert!(matches!(result, Err(StoreError::LockHeld { .. })));
    }

    #[tokio::test]
    async fn acquire_succeeds_after_expiry() {
        let svc: Arc<dyn ObjectService> = Arc::new(InMemoryObjectService::new());
        let _lock = DistributedLock::acquire(svc.clone(), &keys(), "res1", 1_000, 0, None)
            .await
            .unwrap();
        // now_ms past expires_at (1000)
        let lock2 = DistributedLock::acquire(svc.clone(), &keys(), "res1", 1_000, 2_000, None)
            .await
            .unwrap();
        assert_eq!(lock2.resource(), "res1");
    }

    #[tokio::test]
    async fn refresh_extends_ttl_and_fails_for_non_owner() {
        let svc: Arc<dyn ObjectService> = Arc::new(InMemoryObjectService::new());
        let lock = DistributedLock::acquire(svc.clone(), &keys(), "res1", 1_000, 0, None)
            .await
            .unwrap();
        assert!(lock.refresh(1_000, 500).await.unwrap());

        // simulate a stale break + new owner
        let bytes = svc.get(&keys().lock("res1"), None).await.unwrap().unwrap();
        let mut content: LockContent = serde_json::from_slice(&bytes).unwrap();
        content.lock_id = "someone-else".into();
        svc.put(&keys().lock("res1"), serde_json::to_vec(&content).unwrap(), None, Default::default())
            .await
            .unwrap();

        assert!(!lock.refresh(1_000, 600).await.unwrap());
    }

    #[tokio::test]
    async fn sweeper_removes_expired_and_malformed_locks() {
        let svc = InMemoryObjectService::new();
        let k = keys();
        svc.put(&k.lock("stale"), br#"{"lock_id":"a","resource":"stale","acquired_at":0,"expires_at":100,"holder":null}"#.to_vec(), None, Default::default())
            .await
            .unwrap();
        svc.put(&k.lock("fresh"), br#"{"lock_id":"b","resource":"fresh","acquired_at":0,"expires_at":10_000,"holder":null}"#.to_vec(), None, Default::default())
            .await
            .unwrap();
        svc.put(&k.lock("garbage"), b"not json".to_vec(), None, Default::default())
            .await
            .unwrap();

        let swept = sweep_stale_locks(&svc, &k, 500).await.unwrap();
        assert_eq!(swept.len(), 2);
        assert!(svc.get(&k.lock("fresh"), None).await.unwrap().is_some());
        assert!(svc.get(&k.lock("stale"), None).await.unwrap().is_none());
        assert!(svc.get(&k.lock("garbage"), None).await.unwrap().is_none());
    }
}
