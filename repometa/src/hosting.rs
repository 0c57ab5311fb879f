// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Repository-hosting API access for the remote strategy.
///
/// Listing is retried with exponential backoff because its failure fails the
/// run. Per-repository lookups are single attempts; a missing resource (404)
/// is reported as `None` rather than an error. Every request, listing
/// attempts included, is bounded by the configured network timeout.
use std::time::Duration;

use async_trait::async_trait;
use masterror::AppError;
use octocrab::{Octocrab, models::repos::Content};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    registry::{DESCRIPTOR_FILE, PackageDescriptor},
    retry::{RetryConfig, retry_with_backoff, within},
};

/// Public GitHub REST endpoint.
pub const GITHUB_API: &str = "https://api.github.com";

/// Branch read for committed descriptor files.
pub const DEFAULT_BRANCH: &str = "main";
/// Committed line-count summary read for remote `loc`.
pub const LOC_META_FILE: &str = "loc-meta.json";

const PER_PAGE: u8 = 100;
const MAX_PAGES: u32 = 10;

/// Repository as reported by the hosting listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct HostedRepository
{
    pub name:              String,
    pub owner:             HostedOwner,
    #[serde(default)]
    pub html_url:          String,
    #[serde(default)]
    pub description:       Option<String,>,
    #[serde(default)]
    pub homepage:          Option<String,>,
    #[serde(default)]
    pub topics:            Vec<String,>,
    pub created_at:        String,
    pub updated_at:        String,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub license:           Option<HostedLicense,>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct HostedOwner
{
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct HostedLicense
{
    pub name:    String,
    #[serde(default)]
    pub spdx_id: Option<String,>,
}

/// Hosting-API collaborator.
#[async_trait]
pub trait HostingApi: Send + Sync
{
    /// Lists repositories owned by `login`, most recently created first.
    async fn list_repositories(&self, login: &str,) -> Result<Vec<HostedRepository,>, AppError,>;

    /// Bytes of code per language, in host order.
    async fn list_languages(&self, owner: &str, repo: &str,)
    -> Result<Vec<(String, u64,),>, AppError,>;

    /// Tag of the latest release, if any.
    async fn latest_release(&self, owner: &str, repo: &str,) -> Result<Option<String,>, AppError,>;

    /// Package name from a committed descriptor, if the repository has one.
    async fn package_name(&self, owner: &str, repo: &str,) -> Result<Option<String,>, AppError,>;

    /// Code-line total from a committed line-count summary, if present.
    async fn loc_total(&self, owner: &str, repo: &str,) -> Result<Option<u64,>, AppError,>;
}

#[derive(Debug, Serialize,)]
struct ListingQuery
{
    #[serde(rename = "type")]
    kind:      &'static str,
    sort:      &'static str,
    direction: &'static str,
    per_page:  u8,
    page:      u32,
}

/// [`HostingApi`] backed by the GitHub REST API.
#[derive(Debug, Clone,)]
pub struct GitHubHosting
{
    octocrab: Octocrab,
    retry:    RetryConfig,
    timeout:  Duration,
}

impl GitHubHosting
{
    /// Creates a client for [`GITHUB_API`], authenticated when `token` is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the client cannot be initialized.
    pub fn new(token: Option<&str,>, retry: RetryConfig, timeout: Duration,) -> Result<Self, AppError,>
    {
        Self::connect(GITHUB_API, token, retry, timeout,)
    }

    /// Creates a client for the API rooted at `base_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when `base_uri` is invalid or the client cannot be
    /// initialized.
    pub fn connect(
        base_uri: &str,
        token: Option<&str,>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, AppError,>
    {
        let builder = Octocrab::builder()
            .base_uri(base_uri,)
            .map_err(|e| AppError::validation(format!("invalid API base URI '{base_uri}': {e}"),),)?
            .set_connect_timeout(Some(timeout,),)
            .set_read_timeout(Some(timeout,),);
        let builder = match token {
            Some(token,) => builder.personal_token(token,),
            None => builder,
        };
        let octocrab = builder.build().map_err(|e| {
            AppError::unauthorized(format!("failed to initialize GitHub client: {e}"),)
        },)?;

        Ok(Self {
            octocrab, retry, timeout,
        },)
    }

    async fn list_page(&self, login: &str, page: u32,) -> Result<Vec<HostedRepository,>, AppError,>
    {
        let query = &ListingQuery {
            kind: "owner",
            sort: "created",
            direction: "desc",
            per_page: PER_PAGE,
            page,
        };
        let route = format!("/users/{login}/repos");

        let operation = format!("repository listing for {login} (page {page})");

        retry_with_backoff(&self.retry, &operation, || {
            let octocrab = self.octocrab.clone();
            let route = route.clone();
            within(self.timeout, &operation, async move {
                octocrab
                    .get::<Vec<HostedRepository,>, _, _,>(&route, Some(query,),)
                    .await
                    .map_err(|e| AppError::service(format!("failed to list repositories: {e}"),),)
            },)
        },)
        .await
    }

    async fn file_contents(&self, owner: &str, repo: &str, path: &str,) -> Result<Option<String,>, AppError,>
    {
        let operation = format!("{path} of {owner}/{repo}");
        let response = within(self.timeout, &operation, async {
            Ok(self.octocrab.repos(owner, repo,).get_content().path(path,).r#ref(DEFAULT_BRANCH,).send().await,)
        },)
        .await?;

        match response {
            Ok(items,) => Ok(items.items.first().and_then(Content::decoded_content,),),
            Err(error,) if is_not_found(&error,) => {
                debug!("{}/{} has no {}", owner, repo, path);
                Ok(None,)
            }
            Err(error,) => {
                Err(AppError::service(format!("failed to fetch {path} of {owner}/{repo}: {error}"),),)
            }
        }
    }
}

#[async_trait]
impl HostingApi for GitHubHosting
{
    async fn list_repositories(&self, login: &str,) -> Result<Vec<HostedRepository,>, AppError,>
    {
        let mut repositories = Vec::with_capacity(PER_PAGE as usize,);
        let mut page = 1u32;

        loop {
            let items = self.list_page(login, page,).await?;
            let items_count = items.len();
            repositories.extend(items,);

            if items_count < PER_PAGE as usize || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        debug!("{} owns {} repositories", login, repositories.len());
        Ok(repositories,)
    }

    async fn list_languages(&self, owner: &str, repo: &str,)
    -> Result<Vec<(String, u64,),>, AppError,>
    {
        let route = format!("/repos/{owner}/{repo}/languages");
        let languages: Map<String, Value,> =
            within(self.timeout, &format!("languages of {owner}/{repo}"), async {
                self.octocrab.get(&route, None::<&(),>,).await.map_err(|e| {
                    AppError::service(format!("failed to fetch languages of {owner}/{repo}: {e}"),)
                },)
            },)
            .await?;

        Ok(languages
            .into_iter()
            .map(|(language, bytes,)| (language, bytes.as_u64().unwrap_or(0,),),)
            .collect(),)
    }

    async fn latest_release(&self, owner: &str, repo: &str,) -> Result<Option<String,>, AppError,>
    {
        let response = within(self.timeout, &format!("latest release of {owner}/{repo}"), async {
            Ok(self.octocrab.repos(owner, repo,).releases().get_latest().await,)
        },)
        .await?;

        match response {
            Ok(release,) => Ok(Some(release.tag_name,),),
            Err(error,) if is_not_found(&error,) => Ok(None,),
            Err(error,) => Err(AppError::service(format!(
                "failed to fetch latest release of {owner}/{repo}: {error}"
            ),),),
        }
    }

    async fn package_name(&self, owner: &str, repo: &str,) -> Result<Option<String,>, AppError,>
    {
        let Some(contents,) = self.file_contents(owner, repo, DESCRIPTOR_FILE,).await? else {
            return Ok(None,);
        };
        let descriptor: PackageDescriptor = serde_json::from_str(&contents,).map_err(|e| {
            AppError::validation(format!("invalid {DESCRIPTOR_FILE} in {owner}/{repo}: {e}"),)
        },)?;
        Ok(descriptor.name,)
    }

    async fn loc_total(&self, owner: &str, repo: &str,) -> Result<Option<u64,>, AppError,>
    {
        let Some(contents,) = self.file_contents(owner, repo, LOC_META_FILE,).await? else {
            return Ok(None,);
        };
        Ok(parse_loc_total(&contents,),)
    }
}

/// Reads `SUM.code` from a committed line-count summary.
pub fn parse_loc_total(contents: &str,) -> Option<u64,>
{
    let document: Value = serde_json::from_str(contents,).ok()?;
    document.get("SUM",)?.get("code",)?.as_u64()
}

fn is_not_found(error: &octocrab::Error,) -> bool
{
    matches!(error, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}
