//! Verified pack download.

use std::ops::Range;

use git_hash::{HashAlgorithm, ObjectId};

use crate::manifest::PackKeys;
use crate::service::ObjectService;
use crate::upload::verify_pack_trailer;
use crate::StoreError;
use crate::manifest::PackManifest;

/// Download a pack. With `verify = true` and no byte range, recomputes the
/// pack hash and compares it against the manifest's recorded `pack_hash`
/// (falling back to the pack's own trailing checksum if no manifest is
/// present — the legacy-pack case). Byte-range downloads skip
/// verification, since a partial pack has no meaningful trailer.
pub async fn download_pack(
    service: &dyn ObjectService,
    keys: &PackKeys,
    pack_id: &str,
    range: Option<Range<u64>>,
    verify: bool,
    algo: HashAlgorithm,
) -> Result<Option<Vec<u8>>, StoreError> {
    let Some(bytes) = service.get(&keys.final_pack(pack_id), range.clone()).await? else {
        return Ok(None);
    };

    if verify && range.is_none() {
        let computed = verify_pack_trailer(&bytes, algo)?;
        if let Some(manifest_bytes) = service.get(&keys.manifest(pack_id), None).await? {
            let manifest = PackManifest::from_json(&manifest_bytes)
                .map_err(|e| StoreError::Corrupt { key: keys.manifest(pack_id), reason: e.to_string() })?;
            let expected = ObjectId::from_hex(&manifest.pack_hash)
                .map_err(|e| StoreError::Corrupt { key: keys.manifest(pack_id), reason: e.to_string() })?;
            if expected != computed {
                return Err(StoreError::ChecksumMismatch {
                    expected: expected.to_hex(),
                    actual: computed.to_hex(),
                });
            }
        }
        // No manifest (legacy pack): verify_pack_trailer above already
        // checked the pack's own trailer, which is the documented fallback.
    }

    Ok(Some(bytes))
}
