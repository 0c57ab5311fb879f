// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Local-filesystem strategy: clones on disk, `git`, `cloc` and package
/// descriptors.
use std::path::PathBuf;

use async_trait::async_trait;
use masterror::AppError;

use crate::{
    config::{Account, Exclusions},
    discover::{discover_repositories, repository_name},
    lines::{LineCounter, LineStats, resolve_line_stats},
    readme::resolve_readme,
    registry::{Distribution, DownloadCounter, resolve_local},
    source::{Documentation, Ordering, Provenance, RepositorySource},
    vcs::{VcsInspector, browse_url},
};

/// A clone found below an account root.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct LocalRepository
{
    pub name: String,
    pub path: PathBuf,
}

/// [`RepositorySource`] over local clones.
#[derive(Debug, Clone,)]
pub struct LocalSource<V, L, D,>
{
    vcs:        V,
    counter:    L,
    downloads:  D,
    exclusions: Exclusions,
}

impl<V, L, D,> LocalSource<V, L, D,>
where
    V: VcsInspector,
    L: LineCounter,
    D: DownloadCounter,
{
    pub fn new(vcs: V, counter: L, downloads: D, exclusions: Exclusions,) -> Self
    {
        Self {
            vcs, counter, downloads, exclusions,
        }
    }
}

#[async_trait]
impl<V, L, D,> RepositorySource for LocalSource<V, L, D,>
where
    V: VcsInspector,
    L: LineCounter,
    D: DownloadCounter,
{
    type Repository = LocalRepository;

    async fn discover(&self, account: &Account,) -> Result<Vec<LocalRepository,>, AppError,>
    {
        let root = account.root.as_deref().ok_or_else(|| {
            AppError::validation(format!("account '{}' has no root directory", account.login),)
        },)?;

        let paths = discover_repositories(root, &self.exclusions.exclude_dirs,)?;
        Ok(paths
            .into_iter()
            .map(|path| LocalRepository {
                name: repository_name(&path,),
                path,
            },)
            .collect(),)
    }

    fn name(&self, repository: &LocalRepository,) -> String
    {
        repository.name.clone()
    }

    async fn provenance(&self, repository: &LocalRepository,) -> Result<Provenance, AppError,>
    {
        let remote = self.vcs.remote_url(&repository.path,).await?;
        let (created_at, updated_at,) = self.vcs.commit_range(&repository.path,).await?;

        Ok(Provenance {
            browse_url: browse_url(&remote,),
            created_at,
            updated_at,
            open_issues_count: 0,
        },)
    }

    async fn documentation(&self, repository: &LocalRepository,) -> Result<Documentation, AppError,>
    {
        let meta = resolve_readme(&repository.path,);
        Ok(Documentation {
            description: meta.description,
            homepage:    Some(meta.homepage,),
            topics:      meta.keywords,
        },)
    }

    fn default_documentation(&self, _repository: &LocalRepository,) -> Documentation
    {
        Documentation {
            homepage: Some(String::new(),), ..Documentation::default()
        }
    }

    async fn line_stats(&self, repository: &LocalRepository,) -> Result<LineStats, AppError,>
    {
        resolve_line_stats(&self.counter, &repository.path, &self.exclusions,).await
    }

    async fn distribution(&self, repository: &LocalRepository,) -> Result<Distribution, AppError,>
    {
        Ok(resolve_local(&self.downloads, &repository.path,).await,)
    }

    fn default_distribution(&self, _repository: &LocalRepository,) -> Distribution
    {
        Distribution::local_default()
    }

    fn ordering(&self,) -> Ordering
    {
        Ordering::NewestFirst
    }
}
