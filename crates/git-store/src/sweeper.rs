//! Orphan sweeper: reconciles staging objects left behind by an upload
//! that failed before its manifest reached `complete`.

use std::collections::BTreeSet;

use crate::manifest::PackKeys;
use crate::service::ObjectService;
use crate::upload::is_visible;
use crate::StoreError;

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pack ids whose incomplete upload was torn down entirely.
    pub incomplete_removed: Vec<String>,
    /// Pack ids that were already complete; only their lingering staging
    /// objects were removed.
    pub staging_cleaned: Vec<String>,
}

fn pack_id_from_staging_key(key: &str, staging_prefix: &str) -> Option<String> {
    let rest = key.strip_prefix(staging_prefix)?;
    let stem = rest.strip_suffix(".pack").or_else(|| rest.strip_suffix(".idx"))?;
    Some(stem.to_string())
}

/// List staging, determine completeness for each pack id found there, and
/// reconcile: incomplete packs are torn down entirely (staging + partial
/// final + manifest); complete packs only have their lingering staging
/// objects removed.
pub async fn sweep_orphans(service: &dyn ObjectService, keys: &PackKeys) -> Result<SweepReport, StoreError> {
    let staging_keys = service.list_all(&keys.staging_prefix()).await?;
    let staging_prefix = keys.staging_prefix();

    let mut pack_ids = BTreeSet::new();
    for key in &staging_keys {
        if let Some(id) = pack_id_from_staging_key(key, &staging_prefix) {
            pack_ids.insert(id);
        }
    }

    let mut report = SweepReport::default();
    for pack_id in pack_ids {
        let visible = is_visible(service, keys, &pack_id).await?;
        let staging_objs = vec![keys.staging_pack(&pack_id), keys.staging_idx(&pack_id)];

        if visible {
            service.delete_many(&staging_objs).await?;
            report.staging_cleaned.push(pack_id);
        } else {
            service.delete_many(&staging_objs).await?;
            service
                .delete_many(&[keys.final_pack(&pack_id), keys.final_idx(&pack_id), keys.manifest(&pack_id)])
                .await?;
            report.incomplete_removed.push(pack_id);
        }
    }

    Ok(report)
}
