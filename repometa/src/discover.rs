// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Discovers local clones below an account root.
///
/// A directory is a repository when it contains a `.git` entry. The walk
/// never descends into `.git` itself or into excluded directories, and
/// yields repositories in path order so runs are reproducible.
use std::path::{Path, PathBuf};

use masterror::AppError;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

const GIT_DIR: &str = ".git";

/// Lists repository directories below `root`, sorted by path.
///
/// # Errors
///
/// Returns [`AppError`] when `root` does not exist or cannot be read.
/// Unreadable entries deeper in the tree are skipped.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use repometa::discover_repositories;
///
/// # fn main() -> Result<(), masterror::AppError> {
/// let repositories = discover_repositories(Path::new("/srv/git/cresteem"), &[])?;
/// for repository in repositories {
///     println!("{}", repository.display());
/// }
/// # Ok(())
/// # }
/// ```
pub fn discover_repositories(root: &Path, exclude_dirs: &[String],) -> Result<Vec<PathBuf,>, AppError,>
{
    if !root.is_dir() {
        return Err(AppError::validation(format!(
            "repository root {} is not a directory",
            root.display()
        ),),);
    }

    let walker = WalkDir::new(root,).follow_links(false,).sort_by_file_name().into_iter();
    let mut repositories = Vec::new();

    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_pruned(e, exclude_dirs,),) {
        let entry = match entry {
            Ok(entry,) => entry,
            Err(error,) if error.depth() == 0 => {
                return Err(AppError::service(format!(
                    "failed to read repository root {}: {error}",
                    root.display()
                ),),);
            }
            Err(error,) => {
                debug!("skipping unreadable entry: {}", error);
                continue;
            }
        };

        if entry.file_type().is_dir() && entry.path().join(GIT_DIR,).exists() {
            repositories.push(entry.into_path(),);
        }
    }

    debug!("found {} repositories under {}", repositories.len(), root.display());
    Ok(repositories,)
}

/// Name of a repository, taken from its directory.
pub fn repository_name(path: &Path,) -> String
{
    path.file_name().map(|name| name.to_string_lossy().into_owned(),).unwrap_or_default()
}

fn is_pruned(entry: &DirEntry, exclude_dirs: &[String],) -> bool
{
    if !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    name == GIT_DIR || exclude_dirs.iter().any(|dir| *dir == name,)
}
