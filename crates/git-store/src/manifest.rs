//! Pack manifests: the commit record that makes an uploaded pack visible.

use serde::{Deserialize, Serialize};

/// Manifest status. A pack is visible iff its manifest exists with
/// `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestStatus {
    Staging,
    Complete,
}

/// The manifest object written at `packs/{packId}.manifest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    pub status: ManifestStatus,
    pub pack_id: String,
    pub pack_hash: String,
    pub idx_hash: String,
    pub pack_size: u64,
    pub idx_size: u64,
    pub object_count: u32,
    /// Unix milliseconds. Stamped by the caller (`new`/`new_complete`
    /// accept it as a parameter rather than reading the clock, since this
    /// crate's effects must stay deterministic under test).
    pub completed_at: u64,
}

impl PackManifest {
    /// Build a manifest in `staging` status.
    pub fn staging(
        pack_id: impl Into<String>,
        pack_hash: impl Into<String>,
        idx_hash: impl Into<String>,
        pack_size: u64,
        idx_size: u64,
        object_count: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            status: ManifestStatus::Staging,
            pack_id: pack_id.into(),
            pack_hash: pack_hash.into(),
            idx_hash: idx_hash.into(),
            pack_size,
            idx_size,
            object_count,
            completed_at: now_ms,
        }
    }

    /// Same identity, transitioned to `complete`.
    pub fn into_complete(mut self, now_ms: u64) -> Self {
        self.status = ManifestStatus::Complete;
        self.completed_at = now_ms;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == ManifestStatus::Complete
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Object-service key layout for a pack store rooted at `prefix`.
pub struct PackKeys {
    prefix: String,
}

impl PackKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn final_pack(&self, pack_id: &str) -> String {
        format!("{}packs/{pack_id}.pack", self.prefix)
    }

    pub fn final_idx(&self, pack_id: &str) -> String {
        format!("{}packs/{pack_id}.idx", self.prefix)
    }

    pub fn manifest(&self, pack_id: &str) -> String {
        format!("{}packs/{pack_id}.manifest", self.prefix)
    }

    pub fn staging_pack(&self, pack_id: &str) -> String {
        format!("{}staging/{pack_id}.pack", self.prefix)
    }

    pub fn staging_idx(&self, pack_id: &str) -> String {
        format!("{}staging/{pack_id}.idx", self.prefix)
    }

    pub fn lock(&self, resource: &str) -> String {
        format!("{}locks/{resource}.lock", self.prefix)
    }

    pub fn packs_prefix(&self) -> String {
        format!("{}packs/", self.prefix)
    }

    pub fn staging_prefix(&self) -> String {
        format!("{}staging/", self.prefix)
    }

    pub fn locks_prefix(&self) -> String {
        format!("{}locks/", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_json_roundtrip() {
        let m = PackManifest::staging("abc123", "packhash", "idxhash", 100, 50, 5, 1_000);
        let json = m.to_json().unwrap();
        let parsed = PackManifest::from_json(&json).unwrap();
        assert_eq!(m, parsed);
    }

    #[test]
    fn into_complete_updates_status_and_timestamp() {
        let m = PackManifest::staging("abc123", "packhash", "idxhash", 100, 50, 5, 1_000);
        let c = m.into_complete(2_000);
        assert_eq!(c.status, ManifestStatus::Complete);
        assert_eq!(c.completed_at, 2_000);
    }

    #[test]
    fn pack_keys_layout() {
        let keys = PackKeys::new("");
        assert_eq!(keys.final_pack("p1"), "packs/p1.pack");
        assert_eq!(keys.staging_idx("p1"), "staging/p1.idx");
        assert_eq!(keys.lock("p1"), "locks/p1.lock");
    }
}
