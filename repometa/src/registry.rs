// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Package-registry resolution: descriptor facts and download counts.
///
/// Download data is best-effort. Every failure on this path (unreadable
/// descriptor, network error, non-200 response, unparsable badge) resolves
/// to the documented default instead of an error.
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use async_trait::async_trait;
use masterror::AppError;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    record::{LatestVersion, License},
    retry::within,
};

/// File name of the package descriptor at a repository root.
pub const DESCRIPTOR_FILE: &str = "package.json";
/// Version reported for local repositories without a descriptor.
pub const DEFAULT_VERSION: &str = "1.0.0";
/// License reported for local repositories without a descriptor.
pub const DEFAULT_LICENSE: &str = "MIT";

static TITLE_REGEX: LazyLock<Regex,> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>",).expect("valid regex",),);
static COUNT_REGEX: LazyLock<Regex,> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([kKMB])?",).expect("valid regex",),);

/// Where the download count of a repository comes from.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum DownloadSource
{
    /// Published to the package registry under `package_name`.
    RegistryBacked
    {
        package_name: String,
    },
    /// Distributed through release assets of `owner/repo`.
    ReleaseBacked
    {
        owner: String, repo: String,
    },
}

impl DownloadSource
{
    /// Classifies a repository from the outcome of a descriptor probe.
    ///
    /// A probe that found a descriptor with a non-blank package name makes
    /// the repository registry-backed; anything else falls back to release
    /// assets.
    pub fn from_probe(package_name: Option<String,>, owner: &str, repo: &str,) -> Self
    {
        match package_name.map(|name| name.trim().to_owned(),).filter(|name| !name.is_empty(),) {
            Some(package_name,) => Self::RegistryBacked {
                package_name,
            },
            None => Self::ReleaseBacked {
                owner: owner.to_owned(), repo: repo.to_owned(),
            },
        }
    }

    /// Badge path, relative to the badge host, that reports the count.
    pub fn badge_path(&self,) -> String
    {
        match self {
            Self::RegistryBacked {
                package_name,
            } => format!("/npm/d18m/{package_name}?label=%20&cacheSeconds=60"),
            Self::ReleaseBacked {
                owner,
                repo,
            } => format!(
                "/github/downloads-pre/{owner}/{repo}/latest/total?sort=date&label=%20&cacheSeconds=60"
            ),
        }
    }
}

impl fmt::Display for DownloadSource
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match self {
            Self::RegistryBacked {
                package_name,
            } => write!(f, "package {package_name}"),
            Self::ReleaseBacked {
                owner,
                repo,
            } => write!(f, "releases of {owner}/{repo}"),
        }
    }
}

/// Download-count collaborator.
#[async_trait]
pub trait DownloadCounter: Send + Sync
{
    /// Looks up the download count for `source`.
    async fn download_count(&self, source: &DownloadSource,) -> Result<u64, AppError,>;
}

/// [`DownloadCounter`] that reads counts from shields.io-compatible badges.
#[derive(Debug, Clone,)]
pub struct BadgeClient
{
    client:   reqwest::Client,
    base_url: String,
    timeout:  Duration,
}

impl BadgeClient
{
    /// Creates a client for the badge service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration,) -> Result<Self, AppError,>
    {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),)
            .timeout(timeout,)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}"),),)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/',).to_owned(),
            timeout,
        },)
    }
}

#[async_trait]
impl DownloadCounter for BadgeClient
{
    async fn download_count(&self, source: &DownloadSource,) -> Result<u64, AppError,>
    {
        let url = format!("{}{}", self.base_url, source.badge_path());
        let request = async {
            let response = self
                .client
                .get(&url,)
                .header("Accept", "image/svg+xml",)
                .send()
                .await
                .map_err(|e| AppError::service(format!("badge request for {source} failed: {e}"),),)?;

            if !response.status().is_success() {
                debug!("badge for {} answered {}", source, response.status());
                return Ok(0,);
            }

            let body = response
                .text()
                .await
                .map_err(|e| AppError::service(format!("badge body for {source} unreadable: {e}"),),)?;
            Ok(parse_badge_count(&body,),)
        };

        within(self.timeout, &format!("download count for {source}"), request,).await
    }
}

/// Extracts the count from a badge SVG `<title>`, honouring metric suffixes.
///
/// Returns 0 when the badge carries no number.
///
/// # Examples
///
/// ```
/// use repometa::parse_badge_count;
///
/// assert_eq!(parse_badge_count("<svg><title>1.2k</title></svg>"), 1200);
/// assert_eq!(parse_badge_count("<svg><title>invalid</title></svg>"), 0);
/// ```
pub fn parse_badge_count(svg: &str,) -> u64
{
    let Some(title,) = TITLE_REGEX.captures(svg,).and_then(|captures| captures.get(1,),) else {
        return 0;
    };
    let Some(captures,) = COUNT_REGEX.captures(title.as_str(),) else {
        return 0;
    };

    let value: f64 = captures.get(1,).and_then(|m| m.as_str().parse().ok(),).unwrap_or(0.0,);
    let scale = match captures.get(2,).map(|m| m.as_str(),) {
        Some("k" | "K",) => 1_000.0,
        Some("M",) => 1_000_000.0,
        Some("B",) => 1_000_000_000.0,
        _ => 1.0,
    };
    (value * scale).round().max(0.0,) as u64
}

/// Resolves a download count, degrading every failure to 0.
pub async fn resolve_download_count<D,>(counter: &D, source: &DownloadSource,) -> u64
where
    D: DownloadCounter + ?Sized,
{
    match counter.download_count(source,).await {
        Ok(count,) => count,
        Err(error,) => {
            warn!("download count for {} unavailable: {}", source, error);
            0
        }
    }
}

/// Fields read from a package descriptor.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq,)]
pub struct PackageDescriptor
{
    #[serde(default)]
    pub name:    Option<String,>,
    #[serde(default)]
    pub version: Option<String,>,
    #[serde(default)]
    pub license: Option<String,>,
}

/// Distribution facts of a repository.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Distribution
{
    pub latest_version: LatestVersion,
    pub license:        License,
    pub download_count: u64,
}

impl Distribution
{
    /// Defaults for a local repository that is not a registry package.
    pub fn local_default() -> Self
    {
        Self {
            latest_version: LatestVersion::Tag(DEFAULT_VERSION.to_owned(),),
            license:        License::from_spdx(DEFAULT_LICENSE,),
            download_count: 0,
        }
    }

    /// Defaults for a hosted repository with nothing resolvable.
    pub fn hosted_default(license: License,) -> Self
    {
        Self {
            latest_version: LatestVersion::Missing, license, download_count: 0,
        }
    }
}

/// Path of the package descriptor under `root`.
pub fn descriptor_path(root: &Path,) -> PathBuf
{
    root.join(DESCRIPTOR_FILE,)
}

/// Reads the package descriptor under `root`.
///
/// Returns `None` when the repository is not an eligible package: the file
/// is missing, unreadable, or not a JSON object.
pub fn read_descriptor(root: &Path,) -> Option<PackageDescriptor,>
{
    let path = descriptor_path(root,);
    let contents = match fs::read_to_string(&path,) {
        Ok(contents,) => contents,
        Err(error,) => {
            debug!("no package descriptor at {}: {}", path.display(), error);
            return None;
        }
    };

    match serde_json::from_str(&contents,) {
        Ok(descriptor,) => Some(descriptor,),
        Err(error,) => {
            warn!("ignoring malformed package descriptor {}: {}", path.display(), error);
            None
        }
    }
}

/// Resolves distribution facts for a local repository.
///
/// Missing descriptor fields fall back to the local defaults individually;
/// a descriptor without a package name cannot be looked up and reports 0
/// downloads.
pub async fn resolve_local<D,>(counter: &D, root: &Path,) -> Distribution
where
    D: DownloadCounter + ?Sized,
{
    let Some(descriptor,) = read_descriptor(root,) else {
        return Distribution::local_default();
    };

    let download_count = match descriptor.name.as_deref().map(str::trim,).filter(|n| !n.is_empty(),) {
        Some(name,) => {
            let source = DownloadSource::RegistryBacked {
                package_name: name.to_owned(),
            };
            resolve_download_count(counter, &source,).await
        }
        None => 0,
    };

    let version = descriptor.version.unwrap_or_else(|| DEFAULT_VERSION.to_owned(),);
    let license = descriptor.license.unwrap_or_else(|| DEFAULT_LICENSE.to_owned(),);

    Distribution {
        latest_version: LatestVersion::Tag(version,),
        license: License::from_spdx(&license,),
        download_count,
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::*;

    #[derive(Default,)]
    struct RecordingCounter
    {
        seen:  Mutex<Vec<DownloadSource,>,>,
        fail:  bool,
        count: u64,
    }

    #[async_trait]
    impl DownloadCounter for RecordingCounter
    {
        async fn download_count(&self, source: &DownloadSource,) -> Result<u64, AppError,>
        {
            self.seen.lock().expect("poisoned",).push(source.clone(),);
            if self.fail { Err(AppError::service("registry offline",),) } else { Ok(self.count,) }
        }
    }

    #[test]
    fn probe_selects_registry_when_package_named()
    {
        let source = DownloadSource::from_probe(Some(" richie ".to_owned(),), "cresteem", "richie",);
        assert_eq!(source, DownloadSource::RegistryBacked {
            package_name: "richie".to_owned(),
        });
        assert_eq!(source.badge_path(), "/npm/d18m/richie?label=%20&cacheSeconds=60");
    }

    #[test]
    fn probe_falls_back_to_release_assets()
    {
        let source = DownloadSource::from_probe(Some("  ".to_owned(),), "darsan-in", "tool",);
        assert_eq!(source, DownloadSource::ReleaseBacked {
            owner: "darsan-in".to_owned(),
            repo:  "tool".to_owned(),
        });
        assert!(source.badge_path().starts_with("/github/downloads-pre/darsan-in/tool/latest/total"));
    }

    #[test]
    fn parses_plain_and_suffixed_counts()
    {
        assert_eq!(parse_badge_count("<svg><title>742</title></svg>"), 742);
        assert_eq!(parse_badge_count("<svg><title> : 3.4M</title></svg>"), 3_400_000);
        assert_eq!(parse_badge_count("<svg><text>12</text></svg>"), 0);
    }

    #[test]
    fn read_descriptor_tolerates_missing_and_malformed_files()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        assert_eq!(read_descriptor(temp.path()), None);

        fs::write(descriptor_path(temp.path(),), "{ not json",).expect("write",);
        assert_eq!(read_descriptor(temp.path()), None);
    }

    #[tokio::test]
    async fn resolve_local_reflects_descriptor_verbatim()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        fs::write(
            descriptor_path(temp.path(),),
            r#"{"name": "@cresteem/richie", "version": "2.4.1", "license": "Apache-2.0"}"#,
        )
        .expect("write",);

        let counter = RecordingCounter {
            count: 321, ..RecordingCounter::default()
        };
        let distribution = resolve_local(&counter, temp.path(),).await;

        assert_eq!(distribution.latest_version, LatestVersion::Tag("2.4.1".to_owned()));
        assert_eq!(distribution.license, License::from_spdx("Apache-2.0"));
        assert_eq!(distribution.download_count, 321);
        assert_eq!(counter.seen.lock().expect("poisoned").as_slice(), &[
            DownloadSource::RegistryBacked {
                package_name: "@cresteem/richie".to_owned(),
            }
        ]);
    }

    #[tokio::test]
    async fn resolve_local_defaults_without_descriptor()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let counter = RecordingCounter::default();
        let distribution = resolve_local(&counter, temp.path(),).await;

        assert_eq!(distribution, Distribution::local_default());
        assert!(counter.seen.lock().expect("poisoned").is_empty());
    }

    #[tokio::test]
    async fn registry_failure_degrades_to_zero()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        fs::write(descriptor_path(temp.path(),), r#"{"name": "richie", "version": "1.0.3"}"#,)
            .expect("write",);

        let counter = RecordingCounter {
            fail: true, ..RecordingCounter::default()
        };
        let distribution = resolve_local(&counter, temp.path(),).await;

        assert_eq!(distribution.download_count, 0);
        assert_eq!(distribution.license, License::from_spdx("MIT"));
    }
}
