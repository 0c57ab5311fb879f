// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Aggregates per-repository metadata into a single corpus document.
//!
//! Each repository owned by the configured accounts is described by one
//! [`RepositoryRecord`] merging version-control history, line statistics,
//! package-registry data and README anchors. Records are grouped by their
//! dominant language into a [`CorpusResult`] that the site generator reads
//! from `ghmeta.json`.
//!
//! Facts are acquired through a [`RepositorySource`] strategy chosen at
//! startup: [`LocalSource`] reads clones on disk, [`RemoteSource`] talks to
//! the hosting API. Every external tool or service sits behind a trait so
//! the pipeline can be driven by in-memory fakes.

mod aggregate;
mod assemble;
mod config;
mod contributions;
mod discover;
mod error;
mod hosting;
mod lines;
mod local;
mod readme;
mod record;
mod registry;
mod remote;
mod retry;
mod source;
mod vcs;

pub use aggregate::{
    Aggregation, RunSummary, aggregate, build_corpus, overall_downloads, total_projects,
    write_corpus,
};
pub use assemble::{Assembly, assemble};
pub use config::{Account, ContributionsConfig, Exclusions, NetworkPolicy, PipelineConfig};
pub use contributions::{
    ContributionLookup, ContributionReport, HttpContributions, total_contributions,
};
pub use discover::{discover_repositories, repository_name};
pub use error::{Error, io_error, output_io_error};
pub use hosting::{
    GITHUB_API, GitHubHosting, HostedLicense, HostedOwner, HostedRepository, HostingApi,
    parse_loc_total,
};
pub use lines::{ClocCounter, LineCounter, LineStats, RawLineCounts, resolve_line_stats, summarize};
pub use local::{LocalRepository, LocalSource};
pub use readme::{
    README_FILE, ReadmeMeta, extract as extract_readme, merge_into_descriptor, read_readme,
    resolve_readme,
};
pub use record::{
    CorpusResult, DisplayDate, LanguageGroups, LanguageShares, LatestVersion, License,
    OTHER_LANGUAGE, Owner, RepositoryRecord,
};
pub use registry::{
    BadgeClient, DESCRIPTOR_FILE, Distribution, DownloadCounter, DownloadSource,
    PackageDescriptor, parse_badge_count, read_descriptor, resolve_download_count, resolve_local,
};
pub use remote::{RemoteSource, hosted_license};
pub use retry::{RetryConfig, retry_with_backoff, within};
pub use source::{Documentation, Ordering, Provenance, RepositorySource};
pub use vcs::{GitCli, VcsInspector, browse_url};
