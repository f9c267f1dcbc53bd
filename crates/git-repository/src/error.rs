use std::path::PathBuf;

use git_hash::ObjectId;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git directory: {0}")]
    NotFound(PathBuf),

    #[error("invalid git directory: {path}: {reason}")]
    InvalidGitDir { path: PathBuf, reason: String },

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("object {id} is not a {expected}")]
    WrongObjectType { id: ObjectId, expected: &'static str },

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] git_ref::RefError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
