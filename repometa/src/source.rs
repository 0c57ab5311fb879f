// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Capability shared by the data-acquisition strategies.
///
/// The assembler and the aggregator only talk to a [`RepositorySource`];
/// whether facts come from local clones or from the hosting API is decided
/// once, when the strategy is constructed.
use async_trait::async_trait;
use masterror::AppError;

use crate::{
    config::Account,
    lines::LineStats,
    record::DisplayDate,
    registry::Distribution,
};

/// Identity and timeline facts of a repository.
///
/// Failing to obtain these is a hard failure for the repository.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Provenance
{
    /// Browsable URL reported by the source, used when the account has no
    /// configured origin.
    pub browse_url:        Option<String,>,
    pub created_at:        DisplayDate,
    pub updated_at:        DisplayDate,
    pub open_issues_count: u64,
}

/// Descriptive facts of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct Documentation
{
    pub description: String,
    pub homepage:    Option<String,>,
    pub topics:      Vec<String,>,
}

/// Order in which assembled records are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum Ordering
{
    /// Discovery order is kept.
    Discovery,
    /// Stable sort by creation date, most recent first.
    NewestFirst,
}

/// Per-repository resolution contract implemented by every strategy.
///
/// `provenance` failures abort the repository. The remaining resolvers
/// are degradable: on error the assembler logs and substitutes the
/// corresponding default.
#[async_trait]
pub trait RepositorySource: Send + Sync
{
    /// Raw repository handle produced by discovery.
    type Repository: Send + Sync;

    /// Enumerates repositories of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the listing or enumeration fails; this is
    /// fatal for the run.
    async fn discover(&self, account: &Account,) -> Result<Vec<Self::Repository,>, AppError,>;

    /// Repository name, used for exclusion checks and the record.
    fn name(&self, repository: &Self::Repository,) -> String;

    async fn provenance(&self, repository: &Self::Repository,) -> Result<Provenance, AppError,>;

    async fn documentation(&self, repository: &Self::Repository,) -> Result<Documentation, AppError,>;

    async fn line_stats(&self, repository: &Self::Repository,) -> Result<LineStats, AppError,>;

    async fn distribution(&self, repository: &Self::Repository,) -> Result<Distribution, AppError,>;

    /// Documentation used when [`RepositorySource::documentation`] fails.
    fn default_documentation(&self, _repository: &Self::Repository,) -> Documentation
    {
        Documentation::default()
    }

    /// Distribution used when [`RepositorySource::distribution`] fails.
    fn default_distribution(&self, repository: &Self::Repository,) -> Distribution;

    fn ordering(&self,) -> Ordering;
}
