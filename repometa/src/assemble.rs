// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Per-repository assembly of a [`RepositoryRecord`].
///
/// The assembler composes the resolvers of a [`RepositorySource`]. Only
/// provenance is load-bearing; every other resolver degrades to its default
/// with a warning so one flaky collaborator never costs the whole record.
use masterror::AppError;
use tracing::{debug, warn};

use crate::{
    config::{Account, Exclusions},
    lines::LineStats,
    record::{OTHER_LANGUAGE, Owner, RepositoryRecord},
    source::RepositorySource,
};

/// Outcome of assembling one repository.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum Assembly
{
    Record(Box<RepositoryRecord,>,),
    /// The repository is on the ignore list and produced nothing.
    Ignored,
}

/// Assembles the record of `repository`, owned by `account`.
///
/// # Errors
///
/// Returns [`AppError`] when the repository's provenance cannot be resolved
/// (unreachable clone, no history, malformed host timestamps).
pub async fn assemble<S,>(
    source: &S,
    account: &Account,
    repository: &S::Repository,
    exclusions: &Exclusions,
) -> Result<Assembly, AppError,>
where
    S: RepositorySource + ?Sized,
{
    let name = source.name(repository,);
    if exclusions.is_ignored(&name,) {
        debug!("{} is ignored", name);
        return Ok(Assembly::Ignored,);
    }

    let provenance = source.provenance(repository,).await?;
    let html_url = account.html_url_for(&name,).or(provenance.browse_url,).unwrap_or_default();

    let documentation = match source.documentation(repository,).await {
        Ok(documentation,) => documentation,
        Err(error,) => {
            warn!("{}: documentation unavailable, using defaults: {}", name, error);
            source.default_documentation(repository,)
        }
    };

    let stats = match source.line_stats(repository,).await {
        Ok(stats,) => stats,
        Err(error,) => {
            warn!("{}: line statistics unavailable, using defaults: {}", name, error);
            LineStats::default()
        }
    };

    let distribution = match source.distribution(repository,).await {
        Ok(distribution,) => distribution,
        Err(error,) => {
            warn!("{}: distribution data unavailable, using defaults: {}", name, error);
            source.default_distribution(repository,)
        }
    };

    let language = if stats.language.is_empty() { OTHER_LANGUAGE.to_owned() } else { stats.language };

    Ok(Assembly::Record(Box::new(RepositoryRecord {
        name,
        owner: Owner {
            login: account.login.clone(),
        },
        html_url,
        description: documentation.description,
        homepage: documentation.homepage,
        topics: documentation.topics,
        created_at: provenance.created_at,
        updated_at: provenance.updated_at,
        loc: stats.loc,
        languages_meta: stats.languages,
        language,
        open_issues_count: provenance.open_issues_count,
        download_count: distribution.download_count,
        latest_version: distribution.latest_version,
        license: distribution.license,
    },),),)
}
