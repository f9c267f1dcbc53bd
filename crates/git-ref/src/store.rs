use git_hash::ObjectId;
use git_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::name::RefName;
use crate::reflog::ReflogEntry;
use crate::Reference;

/// Trait for pluggable reference storage backends.
///
/// Provides the core operations: resolve, update, iterate, and reflog access.
/// The default implementation is `FilesRefStore` (loose refs + packed-refs).
pub trait RefStore: Send + Sync {
    /// Resolve a ref name to a Reference (may be Direct or Symbolic).
    fn resolve(&self, name: &RefName) -> Result<Option<Reference>, RefError>;

    /// Resolve a ref name to its final OID, following symbolic ref chains.
    fn resolve_to_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError>;

    /// Iterate refs with an optional prefix filter.
    /// Results are sorted lexicographically by full ref name.
    fn iter(
        &self,
        prefix: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = Result<Reference, RefError>> + '_>, RefError>;

    /// Read the reflog for a ref.
    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, RefError>;

    /// Append a reflog entry for a ref.
    fn append_reflog(&self, name: &RefName, entry: &ReflogEntry) -> Result<(), RefError>;
}

/// Atomic batch of ref updates.
///
/// Collects multiple ref updates and applies them atomically:
/// all succeed or all fail.
pub struct RefTransaction {
    pub(crate) updates: Vec<RefUpdate>,
}

/// A single update within a transaction.
pub struct RefUpdate {
    pub name: RefName,
    pub action: RefUpdateAction,
    pub reflog_message: Option<String>,
    /// A lock the caller already holds on `name`, reused instead of having
    /// `commit_transaction` acquire its own. Lets a caller that serializes a
    /// sequence of updates under one held lock (e.g. a multi-step rename)
    /// avoid deadlocking against itself.
    pub external_lock: Option<ExternalLock>,
}

/// A pre-acquired lock on a ref's loose-file path, handed to a transaction
/// so it skips its own `LockFile::acquire` for that ref.
pub struct ExternalLock(pub LockFile);

/// What the current value of a ref must be for an update to proceed.
pub enum ExpectedOld {
    /// The ref must not currently exist.
    Zero,
    /// The ref must currently resolve to this id (classic CAS).
    Id(ObjectId),
    /// The ref must currently exist, regardless of its value.
    AnyExisting,
    /// No specific expectation; resolved by `create_only`/`force` instead.
    None,
}

/// Full precondition model for a ref write or delete, matching the
/// `expected_old` / `create_only` / `force` knobs of a single `update` op.
pub struct UpdatePrecondition {
    pub expected_old: ExpectedOld,
    /// Require absence regardless of `expected_old`.
    pub create_only: bool,
    /// Skip the precondition check entirely.
    pub force: bool,
}

impl UpdatePrecondition {
    /// Classic compare-and-swap: current value must equal `old`.
    pub fn cas(old: ObjectId) -> Self {
        Self { expected_old: ExpectedOld::Id(old), create_only: false, force: false }
    }

    /// Ref must not exist yet.
    pub fn create_only() -> Self {
        Self { expected_old: ExpectedOld::Zero, create_only: true, force: false }
    }

    /// Ref must currently exist, value unchecked.
    pub fn must_exist() -> Self {
        Self { expected_old: ExpectedOld::AnyExisting, create_only: false, force: false }
    }

    /// Skip the precondition check; write unconditionally.
    pub fn force() -> Self {
        Self { expected_old: ExpectedOld::None, create_only: false, force: true }
    }
}

/// The action to perform on a ref within a transaction.
pub enum RefUpdateAction {
    /// Write a ref to `new_target`, subject to `precondition`. Covers both
    /// what used to be a separate create and CAS-update: a plain CAS update
    /// is `precondition: UpdatePrecondition::cas(old)`, a create-only write
    /// is `UpdatePrecondition::create_only()`.
    Write {
        new_target: ObjectId,
        precondition: UpdatePrecondition,
    },
    /// Delete a ref, subject to `precondition`.
    Delete { precondition: UpdatePrecondition },
    /// Set a symbolic ref to point to another ref.
    SetSymbolic { target: RefName },
}

impl RefTransaction {
    /// Create a new empty transaction.
    pub fn new() -> Self {
        Self {
            updates: Vec::new(),
        }
    }

    /// Add an update (CAS) operation to the transaction.
    pub fn update(
        &mut self,
        name: RefName,
        old: ObjectId,
        new: ObjectId,
        message: impl Into<String>,
    ) {
        self.write(name, new, UpdatePrecondition::cas(old), message);
    }

    /// Add a create operation to the transaction (fails if the ref exists).
    pub fn create(&mut self, name: RefName, target: ObjectId, message: impl Into<String>) {
        self.write(name, target, UpdatePrecondition::create_only(), message);
    }

    /// Add a write operation with a full precondition to the transaction.
    pub fn write(
        &mut self,
        name: RefName,
        new_target: ObjectId,
        precondition: UpdatePrecondition,
        message: impl Into<String>,
    ) {
        self.updates.push(RefUpdate {
            name,
            action: RefUpdateAction::Write { new_target, precondition },
            reflog_message: Some(message.into()),
            external_lock: None,
        });
    }

    /// Add a write operation that reuses a lock the caller already holds.
    pub fn write_with_lock(
        &mut self,
        name: RefName,
        new_target: ObjectId,
        precondition: UpdatePrecondition,
        message: impl Into<String>,
        external_lock: ExternalLock,
    ) {
        self.updates.push(RefUpdate {
            name,
            action: RefUpdateAction::Write { new_target, precondition },
            reflog_message: Some(message.into()),
            external_lock: Some(external_lock),
        });
    }

    /// Add a delete operation (CAS: current value must equal `old`).
    pub fn delete(&mut self, name: RefName, old: ObjectId, message: impl Into<String>) {
        self.delete_with_precondition(name, UpdatePrecondition::cas(old), message);
    }

    /// Add a delete operation with a full precondition to the transaction.
    pub fn delete_with_precondition(
        &mut self,
        name: RefName,
        precondition: UpdatePrecondition,
        message: impl Into<String>,
    ) {
        self.updates.push(RefUpdate {
            name,
            action: RefUpdateAction::Delete { precondition },
            reflog_message: Some(message.into()),
            external_lock: None,
        });
    }

    /// Add a set-symbolic operation to the transaction.
    pub fn set_symbolic(
        &mut self,
        name: RefName,
        target: RefName,
        message: impl Into<String>,
    ) {
        self.updates.push(RefUpdate {
            name,
            action: RefUpdateAction::SetSymbolic { target },
            reflog_message: Some(message.into()),
            external_lock: None,
        });
    }

    /// Get the list of updates in this transaction.
    pub fn updates(&self) -> &[RefUpdate] {
        &self.updates
    }

    /// Check if the transaction is empty.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

impl Default for RefTransaction {
    fn default() -> Self {
        Self::new()
    }
}
