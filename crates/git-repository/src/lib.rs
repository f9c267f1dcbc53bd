//! Repository facade: composes the object store and ref store behind a
//! small surface of high-level operations. Deliberately not a working-tree
//! or index manager — that's a higher layer's job.

mod discover;
mod error;

pub use error::RepoError;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git_cdc::CdcEmitter;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::{Commit, Object, Tree};
use git_odb::ObjectDatabase;
use git_ref::{FilesRefStore, RefName, RefStore, Reference};

/// The repository struct tying the object store and ref store together.
pub struct Repository {
    git_dir: PathBuf,
    odb: ObjectDatabase,
    refs: FilesRefStore,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("git_dir", &self.git_dir).finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing git directory (not a working tree root — callers
    /// that have one resolve it to the `.git` directory themselves).
    pub fn open(git_dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let git_dir = discover::open_git_dir(git_dir.as_ref())?;
        let odb = ObjectDatabase::open(git_dir.join("objects"))?;
        let refs = FilesRefStore::new(&git_dir);
        Ok(Self { git_dir, odb, refs })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    pub fn refs(&self) -> &FilesRefStore {
        &self.refs
    }

    /// Attach a CDC emitter. Once set, ref updates committed through
    /// `self.refs()` concurrently emit `RefUpdated` events alongside their
    /// reflog entries.
    pub fn set_cdc_emitter(&mut self, emitter: Arc<dyn CdcEmitter>) {
        self.refs.set_emitter(emitter);
    }

    pub fn hash_algo(&self) -> HashAlgorithm {
        self.odb.hash_algo()
    }

    /// Fetch and parse a commit object. Errors with `WrongObjectType` if
    /// `id` names an object of a different kind.
    pub fn get_commit(&self, id: &ObjectId) -> Result<Commit, RepoError> {
        match self.odb.read(id)? {
            Some(Object::Commit(commit)) => Ok(commit),
            Some(_) => Err(RepoError::WrongObjectType { id: *id, expected: "commit" }),
            None => Err(RepoError::ObjectNotFound(*id)),
        }
    }

    /// Fetch and parse a tree object.
    pub fn get_tree(&self, id: &ObjectId) -> Result<Tree, RepoError> {
        match self.odb.read(id)? {
            Some(Object::Tree(tree)) => Ok(tree),
            Some(_) => Err(RepoError::WrongObjectType { id: *id, expected: "tree" }),
            None => Err(RepoError::ObjectNotFound(*id)),
        }
    }

    /// Resolve HEAD to an OID (`None` on an unborn branch or detached HEAD
    /// pointing nowhere yet).
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        let head_ref = RefName::new("HEAD").map_err(RepoError::from)?;
        Ok(self.refs.resolve_to_oid(&head_ref)?)
    }

    /// Current branch name, or `None` on detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>, RepoError> {
        let head_ref = RefName::new("HEAD").map_err(RepoError::from)?;
        match self.refs.resolve(&head_ref)? {
            Some(Reference::Symbolic { target, .. }) => {
                let name = target.as_str();
                Ok(Some(name.strip_prefix("refs/heads/").unwrap_or(name).to_string()))
            }
            Some(Reference::Direct { .. }) => Ok(None),
            None => Ok(None),
        }
    }

    /// Whether HEAD points to a branch that doesn't exist yet (no commits).
    pub fn is_unborn(&self) -> Result<bool, RepoError> {
        let head_ref = RefName::new("HEAD").map_err(RepoError::from)?;
        match self.refs.resolve(&head_ref)? {
            Some(Reference::Symbolic { target, .. }) => Ok(self.refs.resolve_to_oid(&target)?.is_none()),
            Some(Reference::Direct { .. }) => Ok(false),
            None => Ok(true),
        }
    }

    /// Resolve a ref or raw id to a starting commit id for [`Self::log`].
    fn resolve_log_start(&self, start: LogStart) -> Result<Option<ObjectId>, RepoError> {
        match start {
            LogStart::Id(id) => Ok(Some(id)),
            LogStart::Ref(name) => Ok(self.refs.resolve_to_oid(&name)?),
        }
    }

    /// Breadth-first commit walk over parent edges, starting at `start`,
    /// returning up to `limit` commit ids in first-enqueued-first-returned
    /// order. Not a general commit-graph query (no topological sort, no
    /// path filtering) — just a bounded ancestor walk.
    pub fn log(&self, start: LogStart, limit: usize) -> Result<Vec<ObjectId>, RepoError> {
        let Some(start_id) = self.resolve_log_start(start)? else {
            return Ok(Vec::new());
        };

        let mut visited = std::collections::HashSet::new();
        let mut queue = VecDeque::new();
        let mut out = Vec::new();

        visited.insert(start_id);
        queue.push_back(start_id);

        while let Some(id) = queue.pop_front() {
            if out.len() >= limit {
                break;
            }
            out.push(id);
            let commit = self.get_commit(&id)?;
            for parent in commit.parents {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(out)
    }
}

/// Starting point for [`Repository::log`].
pub enum LogStart {
    Ref(RefName),
    Id(ObjectId),
}
