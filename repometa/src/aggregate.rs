// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Corpus aggregation: the orchestration root of a run.
//!
//! Repositories are assembled one at a time, in discovery order, across all
//! configured accounts. Discovery failures end the run. Per-repository hard
//! failures are skipped in best-effort mode and end the run in strict mode.
//! A run that ends early never writes the output artifact.

use std::{fmt, fs, path::Path, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::{
    assemble::{Assembly, assemble},
    config::{Exclusions, PipelineConfig},
    contributions::{ContributionLookup, total_contributions},
    error::{Error, output_io_error},
    record::{CorpusResult, LanguageGroups, RepositoryRecord},
    source::{Ordering, RepositorySource},
};

/// Counts reported after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct RunSummary
{
    /// Records written to the artifact.
    pub records:        usize,
    /// Size of the ignore list.
    pub ignored:        usize,
    /// Size of the don't-count list.
    pub dont_count:     usize,
    /// Repositories dropped after a hard failure.
    pub skipped:        usize,
    pub total_projects: i64,
}

impl fmt::Display for RunSummary
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        writeln!(f, "Repo cards count: {}", self.records)?;
        writeln!(f, "Ignored repo cards count: {}", self.ignored)?;
        writeln!(f, "DontCount size: {}", self.dont_count)?;
        write!(f, "Final repos count: {}", self.total_projects)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Aggregation
{
    pub corpus:  CorpusResult,
    pub summary: RunSummary,
}

/// `records + ignore − don't-count`, the public repository total.
///
/// # Examples
///
/// ```
/// use repometa::total_projects;
///
/// assert_eq!(total_projects(10, 3, 5), 8);
/// assert_eq!(total_projects(0, 0, 2), -2);
/// ```
pub fn total_projects(records: usize, ignored: usize, dont_count: usize,) -> i64
{
    records as i64 + ignored as i64 - dont_count as i64
}

/// Sum of all positive download counts.
pub fn overall_downloads(records: &[RepositoryRecord],) -> u64
{
    records.iter().map(|record| record.download_count,).filter(|count| *count > 0,).sum()
}

/// Builds the corpus document from assembled records.
///
/// Records are expected in their final order; grouping preserves it.
pub fn build_corpus(records: &[RepositoryRecord], exclusions: &Exclusions, total_commits: u64,) -> CorpusResult
{
    CorpusResult {
        projects: LanguageGroups::from_records(records,),
        total_projects: total_projects(records.len(), exclusions.ignore.len(), exclusions.dont_count.len(),),
        total_commits,
        overall_download_counts: overall_downloads(records,),
    }
}

/// Runs the pipeline over every configured account.
///
/// # Errors
///
/// Returns [`Error::Service`] when discovery fails for any account, or when
/// a repository cannot be assembled while `config.strict` is set.
pub async fn aggregate<S,>(
    source: &S,
    config: &PipelineConfig,
    contributions: Option<&dyn ContributionLookup,>,
) -> Result<Aggregation, Error,>
where
    S: RepositorySource + ?Sized,
{
    let pb = spinner();
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for account in &config.accounts {
        pb.set_message(format!("Discovering repositories of {}...", account.login),);
        let repositories = source.discover(account,).await.map_err(|e| {
            pb.abandon_with_message(format!("Discovery failed for {}", account.login),);
            Error::service(format!("failed to discover repositories of {}: {e}", account.login),)
        },)?;
        info!("{}: {} repositories discovered", account.login, repositories.len());

        for repository in &repositories {
            let name = source.name(repository,);
            pb.set_message(format!("Assembling {}/{}...", account.login, name),);

            match assemble(source, account, repository, &config.exclusions,).await {
                Ok(Assembly::Record(record,),) => records.push(*record,),
                Ok(Assembly::Ignored,) => {}
                Err(error,) if config.strict => {
                    pb.abandon_with_message(format!("Aborted at {}/{}", account.login, name),);
                    return Err(Error::service(format!("failed to assemble {name}: {error}"),),);
                }
                Err(error,) => {
                    warn!("skipping {}: {}", name, error);
                    skipped += 1;
                }
            }
        }
    }

    if source.ordering() == Ordering::NewestFirst {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at,),);
    }

    pb.set_message("Resolving contribution totals...",);
    let logins: Vec<&str,> = config.accounts.iter().map(|account| account.login.as_str(),).collect();
    let total_commits = total_contributions(&config.contributions, contributions, &logins,).await;

    let corpus = build_corpus(&records, &config.exclusions, total_commits,);
    let summary = RunSummary {
        records: records.len(),
        ignored: config.exclusions.ignore.len(),
        dont_count: config.exclusions.dont_count.len(),
        skipped,
        total_projects: corpus.total_projects,
    };

    pb.finish_with_message(format!("Assembled {} repositories ({} skipped)", summary.records, skipped),);
    Ok(Aggregation {
        corpus, summary,
    },)
}

/// Serializes `corpus` to `path`, replacing any previous artifact.
///
/// # Errors
///
/// Returns [`Error::Serialize`] or [`Error::OutputIo`].
pub fn write_corpus(path: &Path, corpus: &CorpusResult, pretty: bool,) -> Result<(), Error,>
{
    let rendered =
        if pretty { serde_json::to_string_pretty(corpus,)? } else { serde_json::to_string(corpus,)? };

    if let Some(parent,) = path.parent().filter(|parent| !parent.as_os_str().is_empty(),) {
        fs::create_dir_all(parent,).map_err(|e| output_io_error(parent, e,),)?;
    }
    fs::write(path, rendered,).map_err(|e| output_io_error(path, e,),)?;

    info!("wrote {}", path.display());
    Ok((),)
}

fn spinner() -> ProgressBar
{
    let pb = ProgressBar::new_spinner();
    if let Ok(style,) = ProgressStyle::default_spinner().template("{spinner:.yellow} [{elapsed_precise}] {msg}",) {
        pb.set_style(style,);
    }
    pb.enable_steady_tick(Duration::from_millis(120,),);
    pb
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use async_trait::async_trait;
    use masterror::AppError;
    use proptest::prelude::*;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        config::Account,
        lines::LineStats,
        record::{DisplayDate, LanguageShares, LatestVersion, License},
        registry::Distribution,
        source::{Documentation, Provenance},
    };

    /// Repositories are `(name, created, language, downloads)`; a name
    /// starting with `broken` fails provenance.
    struct TableSource
    {
        rows:     Vec<(&'static str, &'static str, &'static str, u64,),>,
        ordering: Ordering,
        listing:  bool,
    }

    impl TableSource
    {
        fn row(&self, name: &str,) -> (&'static str, &'static str, &'static str, u64,)
        {
            self.rows.iter().copied().find(|row| row.0 == name,).unwrap_or(("", "2020-01-01", "", 0,),)
        }
    }

    #[async_trait]
    impl RepositorySource for TableSource
    {
        type Repository = String;

        async fn discover(&self, _account: &Account,) -> Result<Vec<String,>, AppError,>
        {
            if !self.listing {
                return Err(AppError::service("listing unavailable",),);
            }
            Ok(self.rows.iter().map(|row| row.0.to_owned(),).collect(),)
        }

        fn name(&self, repository: &String,) -> String
        {
            repository.clone()
        }

        async fn provenance(&self, repository: &String,) -> Result<Provenance, AppError,>
        {
            if repository.starts_with("broken",) {
                return Err(AppError::service("no commits",),);
            }
            let created = DisplayDate::parse_short(self.row(repository,).1,)
                .ok_or_else(|| AppError::internal("bad fixture date",),)?;
            Ok(Provenance {
                browse_url: None, created_at: created, updated_at: created, open_issues_count: 0,
            },)
        }

        async fn documentation(&self, _repository: &String,) -> Result<Documentation, AppError,>
        {
            Ok(Documentation::default(),)
        }

        async fn line_stats(&self, repository: &String,) -> Result<LineStats, AppError,>
        {
            let language = self.row(repository,).2;
            let mut languages = LanguageShares::default();
            languages.insert(language, 100,);
            Ok(LineStats {
                loc: 10, languages, language: language.to_owned(),
            },)
        }

        async fn distribution(&self, repository: &String,) -> Result<Distribution, AppError,>
        {
            Ok(Distribution {
                latest_version: LatestVersion::Missing,
                license:        License::from_spdx("MIT",),
                download_count: self.row(repository,).3,
            },)
        }

        fn default_distribution(&self, _repository: &String,) -> Distribution
        {
            Distribution::local_default()
        }

        fn ordering(&self,) -> Ordering
        {
            self.ordering
        }
    }

    fn config(ignore: &[&str], dont_count: &[&str], strict: bool,) -> PipelineConfig
    {
        let mut config = PipelineConfig::parse("accounts:\n  - login: cresteem\n    origin: https://github.com/cresteem\n",)
            .expect("valid config",);
        config.exclusions.ignore = ignore.iter().map(|s| (*s).to_owned(),).collect();
        config.exclusions.dont_count = dont_count.iter().map(|s| (*s).to_owned(),).collect();
        config.strict = strict;
        config
    }

    fn table(ordering: Ordering,) -> TableSource
    {
        TableSource {
            rows: vec![
                ("old-go", "2021-05-01", "Go", 10,),
                ("new-rust", "2024-01-10", "Rust", 0,),
                ("mid-go", "2023-03-03", "Go", 5,),
                ("hidden", "2022-02-02", "Go", 1000,),
            ],
            ordering,
            listing: true,
        }
    }

    fn names(corpus: &CorpusResult,) -> Vec<String,>
    {
        corpus.projects.records().map(|record| record.name.clone(),).collect()
    }

    #[tokio::test]
    async fn newest_first_ordering_and_grouping()
    {
        let outcome = aggregate(&table(Ordering::NewestFirst,), &config(&["hidden"], &["x", "y"], false,), None,)
            .await
            .expect("run succeeds",);

        let languages: Vec<&str,> = outcome.corpus.projects.languages().collect();
        assert_eq!(languages, vec!["Rust", "Go"]);
        assert_eq!(names(&outcome.corpus), vec!["new-rust", "mid-go", "old-go"]);
        assert_eq!(outcome.corpus.total_projects, 3 + 1 - 2);
        assert_eq!(outcome.corpus.overall_download_counts, 15);
        assert_eq!(outcome.summary.records, 3);
    }

    #[tokio::test]
    async fn discovery_ordering_keeps_host_order()
    {
        let outcome = aggregate(&table(Ordering::Discovery,), &config(&[], &[], false,), None,)
            .await
            .expect("run succeeds",);

        let languages: Vec<&str,> = outcome.corpus.projects.languages().collect();
        assert_eq!(languages, vec!["Go", "Rust"]);
        assert_eq!(names(&outcome.corpus), vec!["old-go", "mid-go", "hidden", "new-rust"]);
    }

    #[tokio::test]
    async fn best_effort_skips_broken_repositories()
    {
        let mut source = table(Ordering::Discovery,);
        source.rows.push(("broken-clone", "2024-01-01", "C", 0,),);

        let outcome = aggregate(&source, &config(&[], &[], false,), None,).await.expect("run succeeds",);
        assert_eq!(outcome.summary.skipped, 1);
        assert_eq!(outcome.summary.records, 4);
    }

    #[tokio::test]
    async fn strict_mode_aborts_on_broken_repository()
    {
        let mut source = table(Ordering::Discovery,);
        source.rows.insert(0, ("broken-clone", "2024-01-01", "C", 0,),);

        let result = aggregate(&source, &config(&[], &[], true,), None,).await;
        assert!(matches!(result, Err(Error::Service { .. })));
    }

    #[tokio::test]
    async fn listing_failure_is_fatal()
    {
        let mut source = table(Ordering::Discovery,);
        source.listing = false;

        let result = aggregate(&source, &config(&[], &[], false,), None,).await;
        match result {
            Err(Error::Service {
                message,
            },) => assert!(message.contains("cresteem")),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn configured_contributions_become_total_commits()
    {
        let mut config = config(&[], &[], false,);
        config.contributions.totals = vec![1037, 108, 10];

        let outcome = aggregate(&table(Ordering::Discovery,), &config, None,).await.expect("run succeeds",);
        assert_eq!(outcome.corpus.total_commits, 1155);
    }

    #[test]
    fn summary_lists_counts()
    {
        let summary = RunSummary {
            records: 2, ignored: 1, dont_count: 0, skipped: 0, total_projects: 3,
        };
        assert_eq!(
            summary.to_string(),
            "Repo cards count: 2\nIgnored repo cards count: 1\nDontCount size: 0\nFinal repos count: 3"
        );
    }

    #[test]
    fn write_corpus_round_trips()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path: PathBuf = temp.path().join("out/ghmeta.json",);
        let corpus = CorpusResult {
            projects: LanguageGroups::default(),
            total_projects: 4,
            total_commits: 10,
            overall_download_counts: 0,
        };

        write_corpus(&path, &corpus, false,).expect("write succeeds",);
        let written = fs::read_to_string(&path,).expect("read",);
        assert_eq!(
            written,
            r#"{"projects":{},"totalProjects":4,"totalCommits":10,"overallDownloadCounts":0}"#
        );
        let parsed: CorpusResult = serde_json::from_str(&written,).expect("valid json",);
        assert_eq!(parsed, corpus);
    }

    proptest! {
        #[test]
        fn total_projects_matches_formula(records in 0usize..500, ignored in 0usize..50, dont_count in 0usize..50) {
            let total = total_projects(records, ignored, dont_count);
            prop_assert_eq!(total + dont_count as i64, (records + ignored) as i64);
        }

        #[test]
        fn overall_downloads_ignores_zero_counts(counts in proptest::collection::vec(0u64..10_000, 0..20)) {
            let records: Vec<RepositoryRecord> = counts
                .iter()
                .enumerate()
                .map(|(i, count)| fixture_record(&format!("r{i}"), *count))
                .collect();
            prop_assert_eq!(overall_downloads(&records), counts.iter().sum::<u64>());
        }
    }

    fn fixture_record(name: &str, download_count: u64,) -> RepositoryRecord
    {
        let day = DisplayDate::parse_short("2024-01-01",).expect("valid date",);
        RepositoryRecord {
            name: name.to_owned(),
            owner: crate::record::Owner {
                login: "cresteem".to_owned(),
            },
            html_url: String::new(),
            description: String::new(),
            homepage: None,
            topics: Vec::new(),
            created_at: day,
            updated_at: day,
            loc: 0,
            languages_meta: LanguageShares::default(),
            language: "Rust".to_owned(),
            open_issues_count: 0,
            download_count,
            latest_version: LatestVersion::Missing,
            license: License::from_spdx("MIT",),
        }
    }
}
