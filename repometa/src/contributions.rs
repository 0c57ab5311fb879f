// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Contribution totals reported as `totalCommits`.
///
/// The total is not derived from repository data. It is the sum of the
/// configured totals plus, when an endpoint is configured, one yearly
/// contribution lookup per account.
use std::time::Duration;

use async_trait::async_trait;
use masterror::AppError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{config::ContributionsConfig, retry::within};

/// Yearly contribution report answered by the lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize,)]
pub struct ContributionReport
{
    #[serde(default)]
    pub years: Vec<YearTotal,>,
}

#[derive(Debug, Clone, Deserialize,)]
pub struct YearTotal
{
    #[serde(default)]
    pub total: u64,
}

impl ContributionReport
{
    /// Sum over all reported years.
    pub fn total(&self,) -> u64
    {
        self.years.iter().map(|year| year.total,).sum()
    }
}

/// Contribution lookup collaborator.
#[async_trait]
pub trait ContributionLookup: Send + Sync
{
    /// Total contributions of `login`.
    async fn contributions(&self, login: &str,) -> Result<u64, AppError,>;
}

/// [`ContributionLookup`] against an HTTP endpoint whose URL template
/// contains a `{login}` placeholder.
#[derive(Debug, Clone,)]
pub struct HttpContributions
{
    client:   reqwest::Client,
    template: String,
    timeout:  Duration,
}

impl HttpContributions
{
    /// Creates a lookup for `template`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the template lacks the placeholder or the
    /// HTTP client cannot be built.
    pub fn new(template: &str, timeout: Duration,) -> Result<Self, AppError,>
    {
        if !template.contains("{login}",) {
            return Err(AppError::validation(format!(
                "contribution endpoint '{template}' has no {{login}} placeholder"
            ),),);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),)
            .timeout(timeout,)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}"),),)?;

        Ok(Self {
            client, template: template.to_owned(), timeout,
        },)
    }

    fn url_for(&self, login: &str,) -> String
    {
        self.template.replace("{login}", login,)
    }
}

#[async_trait]
impl ContributionLookup for HttpContributions
{
    async fn contributions(&self, login: &str,) -> Result<u64, AppError,>
    {
        let url = self.url_for(login,);
        let request = async {
            let response = self
                .client
                .get(&url,)
                .send()
                .await
                .map_err(|e| AppError::service(format!("contribution lookup failed: {e}"),),)?
                .error_for_status()
                .map_err(|e| AppError::service(format!("contribution lookup rejected: {e}"),),)?;

            let report: ContributionReport = response
                .json()
                .await
                .map_err(|e| AppError::validation(format!("invalid contribution report: {e}"),),)?;
            Ok(report.total(),)
        };

        within(self.timeout, &format!("contributions of {login}"), request,).await
    }
}

/// Computes the corpus contribution total.
///
/// Failed lookups log a warning and contribute nothing.
pub async fn total_contributions(
    config: &ContributionsConfig,
    lookup: Option<&dyn ContributionLookup,>,
    logins: &[&str],
) -> u64
{
    let mut total: u64 = config.totals.iter().sum();

    let Some(lookup,) = lookup else {
        return total;
    };

    for login in logins {
        match lookup.contributions(login,).await {
            Ok(count,) => {
                debug!("{} has {} contributions", login, count);
                total += count;
            }
            Err(error,) => warn!("contribution lookup for {} failed: {}", login, error),
        }
    }

    total
}

#[cfg(test)]
mod tests
{
    use super::*;

    struct FakeLookup;

    #[async_trait]
    impl ContributionLookup for FakeLookup
    {
        async fn contributions(&self, login: &str,) -> Result<u64, AppError,>
        {
            match login {
                "cresteem" => Ok(120,),
                _ => Err(AppError::service("not found",),),
            }
        }
    }

    #[test]
    fn report_sums_all_years()
    {
        let report: ContributionReport =
            serde_json::from_str(r#"{"years": [{"year": "2024", "total": 700}, {"total": 42}]}"#,)
                .expect("valid report",);
        assert_eq!(report.total(), 742);
    }

    #[test]
    fn endpoint_requires_placeholder()
    {
        assert!(HttpContributions::new("https://example.com/v4/x", Duration::from_secs(1)).is_err());
        let lookup = HttpContributions::new("https://example.com/v4/{login}", Duration::from_secs(1),)
            .expect("valid template",);
        assert_eq!(lookup.url_for("darsan-in"), "https://example.com/v4/darsan-in");
    }

    #[tokio::test]
    async fn configured_totals_without_lookup()
    {
        let config = ContributionsConfig {
            totals: vec![300, 200], endpoint: None,
        };
        assert_eq!(total_contributions(&config, None, &["cresteem"],).await, 500);
    }

    #[tokio::test]
    async fn failed_lookups_contribute_nothing()
    {
        let config = ContributionsConfig {
            totals: vec![10], endpoint: None,
        };
        let total = total_contributions(&config, Some(&FakeLookup), &["cresteem", "ghost"],).await;
        assert_eq!(total, 130);
    }
}
