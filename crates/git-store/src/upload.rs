//! Staged-upload -> manifest -> promote -> cleanup commit protocol.
//!
//! A pack only becomes visible once its manifest transitions to
//! `complete`; any failure before that point leaves an orphan the sweeper
//! (see [`crate::sweeper`]) can clean up.

use git_cdc::{CdcEmitter, CdcEvent, EventType};
use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};

use crate::manifest::{ManifestStatus, PackKeys, PackManifest};
use crate::service::ObjectService;
use crate::StoreError;

/// Validate the 12-byte pack header (`"PACK"`, version 2 or 3) without
/// requiring a full [`git_pack::pack::PackFile`] (no `.idx` is available
/// yet — the upload protocol stages raw bytes).
pub fn validate_pack_header(pack_bytes: &[u8]) -> Result<(), StoreError> {
    if pack_bytes.len() < 12 {
        return Err(StoreError::InvalidPack("pack too small for header".into()));
    }
    if &pack_bytes[0..4] != b"PACK" {
        return Err(StoreError::InvalidPack("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([pack_bytes[4], pack_bytes[5], pack_bytes[6], pack_bytes[7]]);
    if version != 2 && version != 3 {
        return Err(StoreError::InvalidPack(format!(
            "unsupported pack version {version}"
        )));
    }
    Ok(())
}

/// Recompute the trailing pack checksum and compare it against the stored
/// trailer, returning the verified hash on success.
pub fn verify_pack_trailer(pack_bytes: &[u8], algo: HashAlgorithm) -> Result<ObjectId, StoreError> {
    let hash_len = algo.digest_len();
    if pack_bytes.len() < hash_len {
        return Err(StoreError::InvalidPack("pack too small for trailer".into()));
    }
    let content = &pack_bytes[..pack_bytes.len() - hash_len];
    let stored_bytes = &pack_bytes[pack_bytes.len() - hash_len..];
    let stored = ObjectId::from_bytes(stored_bytes, algo)
        .map_err(|e| StoreError::InvalidPack(format!("bad trailer: {e}")))?;

    let mut hasher = Hasher::new(algo);
    hasher.update(content);
    let computed = hasher.finalize().map_err(|e| StoreError::InvalidPack(e.to_string()))?;

    if computed != stored {
        return Err(StoreError::ChecksumMismatch {
            expected: stored.to_hex(),
            actual: computed.to_hex(),
        });
    }
    Ok(computed)
}

fn content_hash(bytes: &[u8], algo: HashAlgorithm) -> Result<ObjectId, StoreError> {
    let mut hasher = Hasher::new(algo);
    hasher.update(bytes);
    hasher.finalize().map_err(|e| StoreError::InvalidPack(e.to_string()))
}

/// Run the full staged-upload -> manifest -> promote -> cleanup protocol
/// for one pack, returning its final (complete) manifest. Emits a
/// `PackReceived` CDC event through `emitter` once the pack is visible, if
/// one is attached.
#[allow(clippy::too_many_arguments)]
pub async fn upload_pack(
    service: &dyn ObjectService,
    keys: &PackKeys,
    pack_id: &str,
    pack_bytes: Vec<u8>,
    idx_bytes: Vec<u8>,
    object_count: u32,
    algo: HashAlgorithm,
    now_ms: u64,
    emitter: Option<&dyn CdcEmitter>,
    sequence: u64,
) -> Result<PackManifest, StoreError> {
    // 1. Validate pack header, compute pack and index hashes.
    validate_pack_header(&pack_bytes)?;
    let pack_hash = verify_pack_trailer(&pack_bytes, algo)?;
    let idx_hash = content_hash(&idx_bytes, algo)?;

    let pack_size = pack_bytes.len() as u64;
    let idx_size = idx_bytes.len() as u64;

    // 2. Write pack and index to staging paths.
    service
        .put(&keys.staging_pack(pack_id), pack_bytes.clone(), None, Default::default())
        .await?;
    service
        .put(&keys.staging_idx(pack_id), idx_bytes.clone(), None, Default::default())
        .await?;

    // 3. Write manifest {status: "staging", ...}.
    let staging_manifest = PackManifest::staging(
        pack_id,
        pack_hash.to_hex(),
        idx_hash.to_hex(),
        pack_size,
        idx_size,
        object_count,
        now_ms,
    );
    service
        .put(
            &keys.manifest(pack_id),
            staging_manifest.to_json().map_err(manifest_err)?,
            None,
            Default::default(),
        )
        .await?;

    // 4. Copy pack and index to final paths.
    service
        .put(&keys.final_pack(pack_id), pack_bytes, None, Default::default())
        .await?;
    service
        .put(&keys.final_idx(pack_id), idx_bytes, None, Default::default())
        .await?;

    // 5. Rewrite manifest with status: "complete".
    let complete_manifest = staging_manifest.into_complete(now_ms);
    service
        .put(
            &keys.manifest(pack_id),
            complete_manifest.to_json().map_err(manifest_err)?,
            None,
            Default::default(),
        )
        .await?;

    // 6. Delete both staging objects.
    service
        .delete_many(&[keys.staging_pack(pack_id), keys.staging_idx(pack_id)])
        .await?;

    if let Some(emitter) = emitter {
        emitter.emit(CdcEvent::new(
            format!("packreceived-{pack_id}-{sequence}"),
            EventType::PackReceived,
            "git-store",
            now_ms,
            sequence,
            1,
            serde_json::json!({
                "pack_id": pack_id,
                "sha": pack_hash.to_hex(),
                "idx_sha": idx_hash.to_hex(),
                "object_count": object_count,
                "pack_size": pack_size,
            }),
        ));
    }

    Ok(complete_manifest)
}

fn manifest_err(e: serde_json::Error) -> StoreError {
    StoreError::InvalidPack(format!("manifest serialization: {e}"))
}

/// Whether a pack id is currently visible: its manifest exists and is
/// `complete`, or (legacy allowance for migrations) no manifest exists but
/// both `.pack` and `.idx` are present.
pub async fn is_visible(
    service: &dyn ObjectService,
    keys: &PackKeys,
    pack_id: &str,
) -> Result<bool, StoreError> {
    match service.get(&keys.manifest(pack_id), None).await? {
        Some(bytes) => {
            let manifest = PackManifest::from_json(&bytes)
                .map_err(|e| StoreError::Corrupt { key: keys.manifest(pack_id), reason: e.to_string() })?;
            Ok(manifest.is_complete())
        }
        None => {
            let pack_exists = service.head(&keys.final_pack(pack_id)).await?.is_some();
            let idx_exists = service.head(&keys.final_idx(pack_id)).await?.is_some();
            Ok(pack_exists && idx_exists)
        }
    }
}
