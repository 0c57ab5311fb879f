// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Version-control introspection for local clones.
///
/// Failures here are hard failures for the repository: a clone without an
/// origin or without commits cannot be described.
use std::path::Path;

use async_trait::async_trait;
use masterror::AppError;
use tokio::process::Command;

use crate::record::DisplayDate;

/// Version-control collaborator.
#[async_trait]
pub trait VcsInspector: Send + Sync
{
    /// URL of the `origin` remote.
    async fn remote_url(&self, path: &Path,) -> Result<String, AppError,>;

    /// Day of the earliest commit.
    async fn first_commit_date(&self, path: &Path,) -> Result<DisplayDate, AppError,>;

    /// Day of the latest commit.
    async fn last_commit_date(&self, path: &Path,) -> Result<DisplayDate, AppError,>;

    /// Days of the earliest and latest commits.
    async fn commit_range(&self, path: &Path,) -> Result<(DisplayDate, DisplayDate,), AppError,>
    {
        let first = self.first_commit_date(path,).await?;
        let last = self.last_commit_date(path,).await?;
        Ok((first, last,),)
    }
}

/// [`VcsInspector`] that shells out to `git`.
#[derive(Debug, Clone, Default,)]
pub struct GitCli;

#[async_trait]
impl VcsInspector for GitCli
{
    async fn remote_url(&self, path: &Path,) -> Result<String, AppError,>
    {
        let url = run_git(path, &["remote", "get-url", "origin"],).await?;
        Ok(url.trim().to_owned(),)
    }

    async fn first_commit_date(&self, path: &Path,) -> Result<DisplayDate, AppError,>
    {
        Ok(self.commit_range(path,).await?.0,)
    }

    async fn last_commit_date(&self, path: &Path,) -> Result<DisplayDate, AppError,>
    {
        Ok(self.commit_range(path,).await?.1,)
    }

    async fn commit_range(&self, path: &Path,) -> Result<(DisplayDate, DisplayDate,), AppError,>
    {
        let stdout = run_git(path, &["log", "--format=%ad", "--date=short"],).await?;
        day_range(&stdout,)
            .ok_or_else(|| AppError::validation(format!("{} has no commits", path.display()),),)
    }
}

/// Earliest and latest day among `git log --date=short` lines.
fn day_range(log: &str,) -> Option<(DisplayDate, DisplayDate,),>
{
    let mut days = log.lines().filter_map(DisplayDate::parse_short,);
    let first = days.next()?;
    Some(days.fold((first, first,), |(low, high,), day| (low.min(day,), high.max(day,),),),)
}

/// Converts a git remote into a browsable repository URL.
///
/// Handles scp-like (`git@host:owner/repo.git`) and URL forms, dropping
/// credentials and the `.git` suffix.
///
/// # Examples
///
/// ```
/// use repometa::browse_url;
///
/// assert_eq!(
///     browse_url("git@gitlab.com:darsan.in/bashup.git").as_deref(),
///     Some("https://gitlab.com/darsan.in/bashup")
/// );
/// ```
pub fn browse_url(remote: &str,) -> Option<String,>
{
    let remote = remote.trim();
    let (host, path,) = if let Some(rest,) = remote.strip_prefix("git@",) {
        rest.split_once(':',)?
    } else {
        let rest = remote.split_once("://",)?.1;
        let rest = rest.rsplit_once('@',).map_or(rest, |(_, tail,)| tail,);
        rest.split_once('/',)?
    };

    let path = path.trim_matches('/',);
    let path = path.strip_suffix(".git",).unwrap_or(path,);
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("https://{host}/{path}"),)
}

async fn run_git(path: &Path, args: &[&str],) -> Result<String, AppError,>
{
    let output = Command::new("git",)
        .args(args,)
        .current_dir(path,)
        .output()
        .await
        .map_err(|e| AppError::service(format!("git command failed: {e}"),),)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr,);
        return Err(AppError::service(format!(
            "git {} failed in {}: {stderr}",
            args.join(" "),
            path.display()
        ),),);
    }

    Ok(String::from_utf8_lossy(&output.stdout,).into_owned(),)
}
