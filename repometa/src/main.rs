// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line interface for the repometa binary.
//!
//! Loads the configuration, selects the acquisition strategy, runs the
//! aggregation and writes the corpus document. Logs go to stderr; the run
//! summary is printed to stdout.

use std::{io, path::PathBuf, process};

use clap::{ArgAction, Parser, ValueEnum};
use repometa::{
    BadgeClient, ClocCounter, ContributionLookup, Error, GitCli, GitHubHosting, HttpContributions,
    LocalSource, PipelineConfig, RemoteSource, RetryConfig, RunSummary, aggregate, write_corpus,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where repository facts are acquired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum,)]
enum SourceKind
{
    /// Local clones below each account root.
    Local,
    /// The GitHub REST API.
    Remote,
}

/// Command line interface for aggregating repository metadata.
#[derive(Debug, Parser,)]
#[command(name = "repometa", version, about = "Aggregate repository metadata into ghmeta.json")]
struct Cli
{
    /// Path to the YAML configuration file.
    #[arg(long = "config", value_name = "PATH", default_value = "repometa.yaml")]
    config: PathBuf,

    /// Strategy used to acquire repository facts.
    #[arg(long = "source", value_enum, default_value_t = SourceKind::Local)]
    source: SourceKind,

    /// Overrides the output path from the configuration.
    #[arg(long = "output", value_name = "PATH")]
    output: Option<PathBuf,>,

    /// Token for the hosting API (remote source).
    #[arg(long = "token", env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String,>,

    /// Abort on the first repository that cannot be assembled.
    #[arg(long = "strict", action = ArgAction::SetTrue)]
    strict: bool,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,
}

#[tokio::main]
async fn main()
{
    init_tracing();

    match run(Cli::parse(),).await {
        Ok(summary,) => println!("{summary}"),
        Err(err,) => {
            error!("run failed: {}", err);
            eprintln!("{}", err.to_display_string());
            process::exit(1,);
        }
    }
}

fn init_tracing()
{
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false,).with_writer(io::stderr,),)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),),)
        .init();
}

/// Executes one run using parsed arguments.
///
/// # Errors
///
/// Propagates configuration, discovery and output errors. Nothing is
/// written when an error is returned.
async fn run(cli: Cli,) -> Result<RunSummary, Error,>
{
    let config = load_config(&cli,)?;
    let timeout = config.network.timeout();

    let downloads = BadgeClient::new(&config.registry_host, timeout,)?;
    let contributions = match config.contributions.endpoint.as_deref() {
        Some(template,) => Some(HttpContributions::new(template, timeout,)?,),
        None => None,
    };
    let lookup = contributions.as_ref().map(|lookup| lookup as &dyn ContributionLookup,);

    let aggregation = match cli.source {
        SourceKind::Local => {
            config.validate_local()?;
            let source =
                LocalSource::new(GitCli, ClocCounter::default(), downloads, config.exclusions.clone(),);
            aggregate(&source, &config, lookup,).await?
        }
        SourceKind::Remote => {
            let hosting =
                GitHubHosting::new(cli.token.as_deref(), RetryConfig::from(&config.network,), timeout,)?;
            let source = RemoteSource::new(hosting, downloads,);
            aggregate(&source, &config, lookup,).await?
        }
    };

    write_corpus(&config.output, &aggregation.corpus, cli.pretty,)?;
    info!("{} records written to {}", aggregation.summary.records, config.output.display());
    Ok(aggregation.summary,)
}

/// Loads the configuration and applies command-line overrides.
fn load_config(cli: &Cli,) -> Result<PipelineConfig, Error,>
{
    let config = PipelineConfig::load(&cli.config,)?;
    Ok(apply_overrides(config, cli,),)
}

fn apply_overrides(mut config: PipelineConfig, cli: &Cli,) -> PipelineConfig
{
    if let Some(output,) = &cli.output {
        config.output = output.clone();
    }
    if cli.strict {
        config.strict = true;
    }
    config
}
