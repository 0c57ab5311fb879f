// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Configuration document describing accounts, exclusion lists and run
//! policy.
//!
//! The configuration is loaded once at startup and passed by reference into
//! the aggregator and the source strategies. Nothing in the pipeline reads
//! exclusion lists from ambient state, which keeps every stage testable with
//! injected values.

use std::{collections::HashSet, fs, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{self, Error};

const DEFAULT_OUTPUT: &str = "ghmeta.json";
const DEFAULT_REGISTRY_HOST: &str = "https://img.shields.io";
const DEFAULT_EXCLUDE_DIRS: &[&str] = &["node_modules", "dist", "out", ".next"];
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Root configuration document.
///
/// # Examples
///
/// ```
/// use repometa::PipelineConfig;
///
/// let yaml = r#"
/// accounts:
///   - login: octocat
///     origin: https://github.com/octocat
/// exclusions:
///   ignore: [dotfiles]
/// "#;
/// let config = PipelineConfig::parse(yaml,).expect("valid configuration",);
/// assert_eq!(config.accounts.len(), 1);
/// assert!(config.exclusions.is_ignored("dotfiles"));
/// ```
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct PipelineConfig
{
    /// Accounts whose repositories are aggregated, in processing order.
    pub accounts: Vec<Account,>,

    /// Repository and language exclusion lists.
    #[serde(default)]
    pub exclusions: Exclusions,

    /// Sources of the corpus-wide contribution total.
    #[serde(default)]
    pub contributions: ContributionsConfig,

    /// Timeouts and retry behaviour for network collaborators.
    #[serde(default)]
    pub network: NetworkPolicy,

    /// Base URL of the badge service used to look up download counts.
    #[serde(default = "default_registry_host", alias = "registryHost")]
    pub registry_host: String,

    /// Destination of the corpus document.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Abort the run on the first per-repository hard failure.
    #[serde(default)]
    pub strict: bool,
}

/// Account whose repositories participate in the corpus.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq,)]
pub struct Account
{
    /// Account login on the hosting service.
    #[serde(alias = "user")]
    pub login: String,

    /// Hosting origin used to derive repository URLs, for example
    /// `https://gitlab.com/darsan.in`.
    #[serde(default)]
    pub origin: String,

    /// Local directory containing clones of the account's repositories.
    #[serde(default)]
    pub root: Option<PathBuf,>,
}

impl Account
{
    /// Derives the public URL of a repository owned by this account.
    ///
    /// Returns `None` when the account has no configured origin.
    ///
    /// # Examples
    ///
    /// ```
    /// use repometa::Account;
    ///
    /// let account = Account {
    ///     login: "cresteem".to_owned(),
    ///     origin: "https://github.com/cresteem/".to_owned(),
    ///     root: None,
    /// };
    /// assert_eq!(
    ///     account.html_url_for("richie").as_deref(),
    ///     Some("https://github.com/cresteem/richie")
    /// );
    /// ```
    pub fn html_url_for(&self, name: &str,) -> Option<String,>
    {
        let origin = self.origin.trim().trim_end_matches('/',);
        if origin.is_empty() {
            return None;
        }
        Some(format!("{origin}/{name}"),)
    }
}

/// Exclusion lists consumed by the assembler, the aggregator and the
/// line-statistics resolver.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq,)]
pub struct Exclusions
{
    /// Repository names skipped entirely.
    #[serde(default)]
    pub ignore: Vec<String,>,

    /// Repository names processed but removed from the public total.
    #[serde(default, alias = "dontCount")]
    pub dont_count: Vec<String,>,

    /// Languages stripped from line statistics.
    #[serde(default, alias = "ignorelangs", alias = "ignoreLanguages")]
    pub ignore_languages: Vec<String,>,

    /// Directory names excluded from line counting.
    #[serde(default = "default_exclude_dirs", alias = "excludeDirs")]
    pub exclude_dirs: Vec<String,>,
}

impl Default for Exclusions
{
    fn default() -> Self
    {
        Self {
            ignore:           Vec::new(),
            dont_count:       Vec::new(),
            ignore_languages: Vec::new(),
            exclude_dirs:     default_exclude_dirs(),
        }
    }
}

impl Exclusions
{
    /// Returns `true` when the repository must be skipped.
    pub fn is_ignored(&self, name: &str,) -> bool
    {
        self.ignore.iter().any(|entry| entry == name,)
    }

    /// Returns `true` when the language is excluded from line statistics.
    pub fn is_ignored_language(&self, language: &str,) -> bool
    {
        self.ignore_languages.iter().any(|entry| entry == language,)
    }
}

/// Contribution totals supplied verbatim or looked up per account.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq,)]
pub struct ContributionsConfig
{
    /// Totals added to the corpus contribution count as-is.
    #[serde(default)]
    pub totals: Vec<u64,>,

    /// Optional lookup endpoint; `{login}` is replaced with the account
    /// login.
    #[serde(default)]
    pub endpoint: Option<String,>,
}

/// Network behaviour shared by every remote collaborator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq,)]
pub struct NetworkPolicy
{
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts made for the repository listing before the run fails.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first listing retry in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for NetworkPolicy
{
    fn default() -> Self
    {
        Self {
            timeout_secs:   DEFAULT_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl NetworkPolicy
{
    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self,) -> Duration
    {
        Duration::from_secs(self.timeout_secs,)
    }
}

impl PipelineConfig
{
    /// Loads and validates the configuration stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read, [`Error::Parse`]
    /// when the YAML is malformed and [`Error::Validation`] when invariants
    /// are violated.
    pub fn load(path: &Path,) -> Result<Self, Error,>
    {
        let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
        Self::parse(&contents,)
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Parse`] and [`Error::Validation`].
    pub fn parse(contents: &str,) -> Result<Self, Error,>
    {
        let config: Self = serde_yaml::from_str(contents,)?;
        config.validate()?;
        Ok(config,)
    }

    /// Verifies account invariants shared by both strategies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when no accounts are configured, when a
    /// login is blank or duplicated, or when timeouts are zero.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        if self.accounts.is_empty() {
            return Err(Error::validation("configuration must include at least one account",),);
        }

        let mut seen = HashSet::with_capacity(self.accounts.len(),);
        for account in &self.accounts {
            let login = account.login.trim();
            if login.is_empty() {
                return Err(Error::validation("account login cannot be empty",),);
            }
            if !seen.insert(login,) {
                return Err(Error::validation(format!("duplicate account '{login}'"),),);
            }
        }

        if self.network.timeout_secs == 0 {
            return Err(Error::validation("network.timeout_secs must be greater than zero",),);
        }
        if self.network.retry_attempts == 0 {
            return Err(Error::validation("network.retry_attempts must be greater than zero",),);
        }

        Ok((),)
    }

    /// Verifies that every account can be enumerated from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first account without a
    /// `root` directory.
    pub fn validate_local(&self,) -> Result<(), Error,>
    {
        match self.accounts.iter().find(|account| account.root.is_none(),) {
            Some(account,) => Err(Error::validation(format!(
                "account '{}' requires a root directory in local mode",
                account.login
            ),),),
            None => Ok((),),
        }
    }
}

fn default_output() -> PathBuf
{
    PathBuf::from(DEFAULT_OUTPUT,)
}

fn default_registry_host() -> String
{
    DEFAULT_REGISTRY_HOST.to_owned()
}

fn default_exclude_dirs() -> Vec<String,>
{
    DEFAULT_EXCLUDE_DIRS.iter().map(|dir| (*dir).to_owned(),).collect()
}

fn default_timeout_secs() -> u64
{
    DEFAULT_TIMEOUT_SECS
}

fn default_retry_attempts() -> u32
{
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64
{
    DEFAULT_RETRY_DELAY_MS
}
