// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Remote strategy: repository facts from the hosting API.
use async_trait::async_trait;
use masterror::AppError;
use tracing::warn;

use crate::{
    config::Account,
    hosting::{HostedRepository, HostingApi},
    lines::LineStats,
    record::{DisplayDate, LatestVersion, License},
    registry::{Distribution, DownloadCounter, DownloadSource, resolve_download_count},
    source::{Documentation, Ordering, Provenance, RepositorySource},
};

/// [`RepositorySource`] over the hosting API.
#[derive(Debug, Clone,)]
pub struct RemoteSource<H, D,>
{
    hosting:   H,
    downloads: D,
}

impl<H, D,> RemoteSource<H, D,>
where
    H: HostingApi,
    D: DownloadCounter,
{
    pub fn new(hosting: H, downloads: D,) -> Self
    {
        Self {
            hosting, downloads,
        }
    }

    async fn probe(&self, repository: &HostedRepository,) -> DownloadSource
    {
        let (owner, repo,) = (&repository.owner.login, &repository.name,);
        let package_name = match self.hosting.package_name(owner, repo,).await {
            Ok(name,) => name,
            Err(error,) => {
                warn!("{}: registry probe failed, counting release downloads: {}", repo, error);
                None
            }
        };
        DownloadSource::from_probe(package_name, owner, repo,)
    }
}

/// License reported by the host, empty when the repository has none.
pub fn hosted_license(repository: &HostedRepository,) -> License
{
    match &repository.license {
        Some(license,) => License {
            name:    license.name.clone(),
            spdx_id: license.spdx_id.clone().unwrap_or_default(),
        },
        None => License {
            name: String::new(), spdx_id: String::new(),
        },
    }
}

fn host_date(value: &str, field: &str, repository: &HostedRepository,) -> Result<DisplayDate, AppError,>
{
    DisplayDate::parse_rfc3339(value,).ok_or_else(|| {
        AppError::validation(format!("{} has an invalid {field}: '{value}'", repository.name),)
    },)
}

#[async_trait]
impl<H, D,> RepositorySource for RemoteSource<H, D,>
where
    H: HostingApi,
    D: DownloadCounter,
{
    type Repository = HostedRepository;

    async fn discover(&self, account: &Account,) -> Result<Vec<HostedRepository,>, AppError,>
    {
        self.hosting.list_repositories(&account.login,).await
    }

    fn name(&self, repository: &HostedRepository,) -> String
    {
        repository.name.clone()
    }

    async fn provenance(&self, repository: &HostedRepository,) -> Result<Provenance, AppError,>
    {
        Ok(Provenance {
            browse_url:        Some(repository.html_url.clone(),).filter(|url| !url.is_empty(),),
            created_at:        host_date(&repository.created_at, "created_at", repository,)?,
            updated_at:        host_date(&repository.updated_at, "updated_at", repository,)?,
            open_issues_count: repository.open_issues_count,
        },)
    }

    async fn documentation(&self, repository: &HostedRepository,) -> Result<Documentation, AppError,>
    {
        Ok(Documentation {
            description: repository.description.clone().unwrap_or_default(),
            homepage:    repository.homepage.clone(),
            topics:      repository.topics.clone(),
        },)
    }

    async fn line_stats(&self, repository: &HostedRepository,) -> Result<LineStats, AppError,>
    {
        let (owner, repo,) = (&repository.owner.login, &repository.name,);
        let languages = match self.hosting.list_languages(owner, repo,).await {
            Ok(languages,) => languages,
            Err(error,) => {
                warn!("{}: language breakdown unavailable: {}", repo, error);
                Vec::new()
            }
        };
        let bytes: u64 = languages.iter().map(|(_, size,)| size,).sum();

        let loc = match self.hosting.loc_total(owner, repo,).await {
            Ok(total,) => total.unwrap_or(0,),
            Err(error,) => {
                warn!("{}: committed line count unavailable: {}", repo, error);
                0
            }
        };

        Ok(LineStats {
            loc, ..LineStats::from_sizes(languages, bytes,)
        },)
    }

    async fn distribution(&self, repository: &HostedRepository,) -> Result<Distribution, AppError,>
    {
        let (owner, repo,) = (&repository.owner.login, &repository.name,);
        let latest_version = match self.hosting.latest_release(owner, repo,).await {
            Ok(Some(tag,),) => LatestVersion::Tag(tag,),
            Ok(None,) => LatestVersion::Missing,
            Err(error,) => {
                warn!("{}: latest release unavailable: {}", repo, error);
                LatestVersion::Missing
            }
        };

        let source = self.probe(repository,).await;
        let download_count = resolve_download_count(&self.downloads, &source,).await;

        Ok(Distribution {
            latest_version,
            license: hosted_license(repository,),
            download_count,
        },)
    }

    fn default_distribution(&self, repository: &HostedRepository,) -> Distribution
    {
        Distribution::hosted_default(hosted_license(repository,),)
    }

    fn ordering(&self,) -> Ordering
    {
        Ordering::Discovery
    }
}
