use std::path::{Path, PathBuf};

use crate::RepoError;

/// Validate that `git_dir` looks like a git directory (`HEAD` file plus an
/// `objects` directory) and canonicalize it. No working-tree or `.git`-file
/// redirect resolution — the facade only ever opens a git directory
/// directly, pointed at either a bare object store or a pre-resolved common
/// directory.
pub fn open_git_dir(git_dir: &Path) -> Result<PathBuf, RepoError> {
    let git_dir = std::fs::canonicalize(git_dir).map_err(|_| RepoError::NotFound(git_dir.to_path_buf()))?;
    if !git_dir.join("HEAD").is_file() || !git_dir.join("objects").is_dir() {
        return Err(RepoError::InvalidGitDir {
            path: git_dir,
            reason: "missing HEAD or objects/".to_string(),
        });
    }
    Ok(git_dir)
}
