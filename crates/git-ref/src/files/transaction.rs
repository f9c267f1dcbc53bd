use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use git_cdc::{CdcEmitter, CdcEvent, EventType};
use git_hash::ObjectId;
use git_utils::date::Signature;
use git_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::files::loose;
use crate::files::packed::PackedRefs;
use crate::name::RefName;
use crate::reflog::{self, ReflogEntry};
use crate::store::{ExpectedOld, RefTransaction, RefUpdateAction, UpdatePrecondition};
use crate::Reference;

/// Commit a ref transaction atomically against the files backend.
///
/// The protocol:
/// 1. Acquire locks on all refs being updated (or reuse a caller-supplied
///    `external_lock`)
/// 2. Verify all preconditions
/// 3. Write new values to lock files
/// 4. Commit all lock files (atomic rename)
/// 5. Append reflog entries
/// 6. Emit a `RefUpdated` CDC event per update, if an emitter is attached
///
/// If any step fails, all locks are released (rollback via Drop).
pub(crate) fn commit_transaction(
    git_dir: &Path,
    transaction: RefTransaction,
    committer: Option<&Signature>,
    emitter: Option<&dyn CdcEmitter>,
) -> Result<(), RefError> {
    if transaction.is_empty() {
        return Ok(());
    }

    let packed = PackedRefs::load(git_dir)?;
    let mut updates = transaction.updates;

    // Phase 1: Acquire all locks, verify preconditions, and prepare writes.
    let mut locks: Vec<LockFile> = Vec::new();
    let mut current_oids: Vec<Option<ObjectId>> = Vec::new();

    for update in updates.iter_mut() {
        let lock = if let Some(external) = update.external_lock.take() {
            external.0
        } else {
            let lock_path = loose::loose_ref_path(git_dir, &update.name);
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            LockFile::acquire(&lock_path)?
        };

        // Read current value
        let current = loose::read_loose_ref(git_dir, &update.name)?;
        let current_oid = match &current {
            Some(Reference::Direct { target, .. }) => Some(*target),
            Some(Reference::Symbolic { target, .. }) => {
                resolve_symref(git_dir, target, &packed, 10)?
            }
            None => {
                // Check packed refs
                packed.find(&update.name).map(|pr| pr.oid)
            }
        };

        verify_precondition(&update.name, &update.action, current_oid.as_ref())?;

        locks.push(lock);
        current_oids.push(current_oid);
    }

    // Phase 2: Write new values to lock files
    for (i, update) in updates.iter().enumerate() {
        match &update.action {
            RefUpdateAction::Write { new_target, .. } => {
                use std::io::Write;
                let content = format!("{}\n", new_target.to_hex());
                locks[i]
                    .write_all(content.as_bytes())
                    .map_err(|e| RefError::IoPath {
                        path: locks[i].path().to_path_buf(),
                        source: e,
                    })?;
            }
            RefUpdateAction::Delete { .. } => {
                // No content to write; will handle in commit phase
            }
            RefUpdateAction::SetSymbolic { target } => {
                use std::io::Write;
                let content = format!("ref: {}\n", target);
                locks[i]
                    .write_all(content.as_bytes())
                    .map_err(|e| RefError::IoPath {
                        path: locks[i].path().to_path_buf(),
                        source: e,
                    })?;
            }
        }
    }

    // Phase 3: Commit all locks (atomic rename) or delete.
    let locks_vec: Vec<LockFile> = std::mem::take(&mut locks);

    for (i, lock) in locks_vec.into_iter().enumerate() {
        match &updates[i].action {
            RefUpdateAction::Delete { .. } => {
                // Rollback the lock (we don't want to commit a delete as a file)
                lock.rollback()?;
                // Delete the loose ref file
                loose::delete_loose_ref(git_dir, &updates[i].name)?;
            }
            _ => {
                lock.commit()?;
            }
        }
    }

    // Phase 4: Write reflog entries
    if let Some(sig) = committer {
        for (i, update) in updates.iter().enumerate() {
            if let Some(msg) = &update.reflog_message {
                let (old_oid, new_oid) = match &update.action {
                    RefUpdateAction::Write { new_target, .. } => {
                        (current_oids[i].unwrap_or(ObjectId::NULL_SHA1), *new_target)
                    }
                    RefUpdateAction::Delete { .. } => {
                        (
                            current_oids[i].unwrap_or(ObjectId::NULL_SHA1),
                            ObjectId::NULL_SHA1,
                        )
                    }
                    RefUpdateAction::SetSymbolic { .. } => continue,
                };

                let entry = ReflogEntry {
                    old_oid,
                    new_oid,
                    identity: sig.clone(),
                    message: msg.as_str().into(),
                };
                reflog::append_reflog_entry(git_dir, &update.name, &entry)?;
            }
        }
    }

    // Phase 6: emit a CDC event per update, independent of whether reflog
    // entries were written (CDC capture doesn't require a committer identity).
    if let Some(emitter) = emitter {
        for (i, update) in updates.iter().enumerate() {
            let payload = match &update.action {
                RefUpdateAction::Write { new_target, .. } => serde_json::json!({
                    "ref": update.name.as_str(),
                    "old": current_oids[i].map(|o| o.to_hex()),
                    "new": new_target.to_hex(),
                    "sha": new_target.to_hex(),
                }),
                RefUpdateAction::Delete { .. } => serde_json::json!({
                    "ref": update.name.as_str(),
                    "old": current_oids[i].map(|o| o.to_hex()),
                    "new": serde_json::Value::Null,
                }),
                RefUpdateAction::SetSymbolic { target } => serde_json::json!({
                    "ref": update.name.as_str(),
                    "symbolic_target": target.as_str(),
                }),
            };
            let sequence = REF_EVENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let timestamp_ms = committer.map(|s| s.date.timestamp.max(0) as u64 * 1000).unwrap_or(0);
            emitter.emit(CdcEvent::new(
                format!("refupdate-{}-{}", update.name.as_str(), sequence),
                EventType::RefUpdated,
                "git-ref",
                timestamp_ms,
                sequence,
                1,
                payload,
            ));
        }
    }

    Ok(())
}

/// Process-wide monotonic sequence for ref-update CDC events. A real
/// capture session would scope this per-repository; a single counter is
/// sufficient here since `FilesRefStore` only ever serializes through one
/// `commit_transaction` call at a time per process.
static REF_EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Enforce a ref update's precondition against the current value, per
/// spec's `expected_old`/`create_only`/`force` precedence: `force` skips
/// the check entirely; `create_only` (when set) requires absence,
/// overriding `expected_old`; otherwise `expected_old` is checked as given.
fn verify_precondition(
    name: &RefName,
    action: &RefUpdateAction,
    current_oid: Option<&ObjectId>,
) -> Result<(), RefError> {
    let precondition = match action {
        RefUpdateAction::Write { precondition, .. } => precondition,
        RefUpdateAction::Delete { precondition } => precondition,
        RefUpdateAction::SetSymbolic { .. } => return Ok(()),
    };

    if precondition.force {
        return Ok(());
    }

    if precondition.create_only {
        if current_oid.is_some() {
            return Err(RefError::AlreadyExists(name.to_string()));
        }
        return Ok(());
    }

    match &precondition.expected_old {
        ExpectedOld::Zero => {
            if current_oid.is_some() {
                return Err(RefError::AlreadyExists(name.to_string()));
            }
        }
        ExpectedOld::Id(expected) => {
            let actual = current_oid.ok_or_else(|| RefError::NotFound(name.to_string()))?;
            if actual != expected {
                return Err(RefError::CasFailed {
                    name: name.to_string(),
                    expected: *expected,
                    actual: *actual,
                });
            }
        }
        ExpectedOld::AnyExisting => {
            if current_oid.is_none() {
                return Err(RefError::NotFound(name.to_string()));
            }
        }
        ExpectedOld::None => {
            if current_oid.is_none() {
                return Err(RefError::NotFound(name.to_string()));
            }
        }
    }
    Ok(())
}

/// Resolve a symbolic ref chain to an OID, checking packed-refs as fallback.
/// Detects true cycles via a visited set rather than relying on depth
/// bounding alone.
fn resolve_symref(
    git_dir: &Path,
    name: &RefName,
    packed: &PackedRefs,
    max_depth: usize,
) -> Result<Option<ObjectId>, RefError> {
    let mut chain = Vec::new();
    let mut visited = std::collections::HashSet::new();
    let mut current = name.clone();

    loop {
        if chain.len() >= max_depth {
            return Err(RefError::MaxDepthExceeded { chain, max: max_depth });
        }
        if !visited.insert(current.clone()) {
            chain.push(current);
            return Err(RefError::CircularRef { chain });
        }
        chain.push(current.clone());

        match loose::read_loose_ref(git_dir, &current)? {
            Some(Reference::Direct { target, .. }) => return Ok(Some(target)),
            Some(Reference::Symbolic { target, .. }) => current = target,
            None => return Ok(packed.find(&current).map(|pr| pr.oid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use crate::store::RefTransaction;
    use git_utils::date::GitDate;

    fn test_sig() -> Signature {
        Signature {
            name: BString::from("Test User"),
            email: BString::from("test@example.com"),
            date: GitDate::new(1234567890, 0),
        }
    }

    #[test]
    fn create_single_ref() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let mut tx = RefTransaction::new();
        let name = RefName::new("refs/heads/main").unwrap();
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        tx.create(name.clone(), oid, "branch: Created from HEAD");

        commit_transaction(git_dir, tx, Some(&test_sig()), None).unwrap();

        let r = loose::read_loose_ref(git_dir, &name).unwrap().unwrap();
        match r {
            Reference::Direct { target, .. } => assert_eq!(target, oid),
            _ => panic!("expected Direct ref"),
        }
    }

    #[test]
    fn update_ref_with_cas() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("refs/heads/main").unwrap();
        let old_oid = ObjectId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let new_oid = ObjectId::from_hex("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();

        loose::write_loose_ref(git_dir, &name, &old_oid).unwrap();

        let mut tx = RefTransaction::new();
        tx.update(name.clone(), old_oid, new_oid, "commit: second commit");
        commit_transaction(git_dir, tx, Some(&test_sig()), None).unwrap();

        let r = loose::read_loose_ref(git_dir, &name).unwrap().unwrap();
        match r {
            Reference::Direct { target, .. } => assert_eq!(target, new_oid),
            _ => panic!("expected Direct ref"),
        }
    }

    #[test]
    fn update_ref_cas_failure() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("refs/heads/main").unwrap();
        let actual_oid = ObjectId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let wrong_old = ObjectId::from_hex("cccccccccccccccccccccccccccccccccccccccc").unwrap();
        let new_oid = ObjectId::from_hex("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();

        loose::write_loose_ref(git_dir, &name, &actual_oid).unwrap();

        let mut tx = RefTransaction::new();
        tx.update(name, wrong_old, new_oid, "should fail");

        let result = commit_transaction(git_dir, tx, Some(&test_sig()), None);
        assert!(matches!(result, Err(RefError::CasFailed { .. })));
    }

    #[test]
    fn delete_ref_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("refs/heads/main").unwrap();
        let oid = ObjectId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        loose::write_loose_ref(git_dir, &name, &oid).unwrap();

        let mut tx = RefTransaction::new();
        tx.delete(name.clone(), oid, "branch: deleted");
        commit_transaction(git_dir, tx, Some(&test_sig()), None).unwrap();

        assert!(loose::read_loose_ref(git_dir, &name).unwrap().is_none());
    }

    #[test]
    fn create_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("refs/heads/main").unwrap();
        let oid = ObjectId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        loose::write_loose_ref(git_dir, &name, &oid).unwrap();

        let mut tx = RefTransaction::new();
        tx.create(name, oid, "should fail");

        let result = commit_transaction(git_dir, tx, Some(&test_sig()), None);
        assert!(matches!(result, Err(RefError::AlreadyExists(_))));
    }

    #[test]
    fn set_symbolic_ref() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("HEAD").unwrap();
        let target = RefName::new("refs/heads/main").unwrap();

        let mut tx = RefTransaction::new();
        tx.set_symbolic(name.clone(), target.clone(), "checkout: moving to main");
        commit_transaction(git_dir, tx, Some(&test_sig()), None).unwrap();

        let r = loose::read_loose_ref(git_dir, &name).unwrap().unwrap();
        match r {
            Reference::Symbolic {
                target: found, ..
            } => assert_eq!(found, target),
            _ => panic!("expected Symbolic ref"),
        }
    }

    #[test]
    fn transaction_creates_reflog() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path();

        let name = RefName::new("refs/heads/main").unwrap();
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();

        let mut tx = RefTransaction::new();
        tx.create(name.clone(), oid, "branch: Created");
        commit_transaction(git_dir, tx, Some(&test_sig()), None).unwrap();

        let entries = reflog::read_reflog(git_dir, &name).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].old_oid.is_null());
        assert_eq!(entries[0].new_oid, oid);
        assert_eq!(entries[0].message, BString::from("branch: Created"));
    }
}
