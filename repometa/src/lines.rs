// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Line statistics derived from a line-counting tool.
///
/// The counter reports code lines per language plus `header` and `SUM`
/// pseudo-entries. Summarization strips those entries and the excluded
/// languages, then converts the remaining counts into ceiling-rounded
/// percentages of the significant total.
use std::path::Path;

use async_trait::async_trait;
use masterror::AppError;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use crate::{
    config::Exclusions,
    record::{LanguageShares, OTHER_LANGUAGE},
};

const HEADER_ENTRY: &str = "header";
const SUM_ENTRY: &str = "SUM";

/// Raw per-language breakdown as printed by `cloc --json`.
pub type RawLineCounts = Map<String, Value,>;

/// Summarized line statistics for one repository.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct LineStats
{
    /// Significant lines: the raw total minus excluded languages.
    pub loc:       u64,
    pub languages: LanguageShares,
    /// Dominant language, or [`OTHER_LANGUAGE`] when nothing was measured.
    pub language:  String,
}

impl Default for LineStats
{
    fn default() -> Self
    {
        Self {
            loc: 0, languages: LanguageShares::default(), language: OTHER_LANGUAGE.to_owned(),
        }
    }
}

impl LineStats
{
    /// Builds statistics from language sizes and their common total.
    ///
    /// Each percent is `ceil(size / total * 100)`, capped at 100. A zero
    /// total yields no shares.
    pub fn from_sizes<I,>(sizes: I, total: u64,) -> Self
    where
        I: IntoIterator<Item = (String, u64,),>,
    {
        let languages: LanguageShares = if total == 0 {
            LanguageShares::default()
        } else {
            sizes.into_iter().map(|(language, size,)| (language, ceil_percent(size, total,),),).collect()
        };
        let language = languages.dominant().unwrap_or(OTHER_LANGUAGE,).to_owned();

        Self {
            loc: total, languages, language,
        }
    }
}

/// Line-counting collaborator.
#[async_trait]
pub trait LineCounter: Send + Sync
{
    /// Counts lines under `root`, skipping directories named in
    /// `exclude_dirs`.
    async fn count_lines(
        &self,
        root: &Path,
        exclude_dirs: &[String],
    ) -> Result<RawLineCounts, AppError,>;
}

/// [`LineCounter`] backed by the `cloc` executable.
#[derive(Debug, Clone,)]
pub struct ClocCounter
{
    program: String,
}

impl Default for ClocCounter
{
    fn default() -> Self
    {
        Self {
            program: "cloc".to_owned(),
        }
    }
}

#[async_trait]
impl LineCounter for ClocCounter
{
    async fn count_lines(
        &self,
        root: &Path,
        exclude_dirs: &[String],
    ) -> Result<RawLineCounts, AppError,>
    {
        let mut command = Command::new(&self.program,);
        command.current_dir(root,).args([".", "--json"],);
        if !exclude_dirs.is_empty() {
            command.arg(format!("--exclude-dir={}", exclude_dirs.join(",")),);
        }

        let output = command.output().await.map_err(|e| {
            AppError::service(format!("{} failed in {}: {e}", self.program, root.display()),)
        },)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr,);
            return Err(AppError::service(format!(
                "{} exited with {} in {}: {stderr}",
                self.program,
                output.status,
                root.display()
            ),),);
        }

        serde_json::from_slice(&output.stdout,)
            .map_err(|e| AppError::validation(format!("invalid {} output: {e}", self.program),),)
    }
}

/// Counts lines under `root` and summarizes them.
///
/// Collaborator failures propagate; the caller decides how to degrade.
///
/// # Errors
///
/// Returns [`AppError`] when the counter fails or its output lacks a `SUM`
/// entry.
pub async fn resolve_line_stats<C,>(
    counter: &C,
    root: &Path,
    exclusions: &Exclusions,
) -> Result<LineStats, AppError,>
where
    C: LineCounter + ?Sized,
{
    let raw = counter.count_lines(root, &exclusions.exclude_dirs,).await?;
    let stats = summarize(&raw, exclusions,)?;
    debug!(
        "{}: {} significant lines across {} languages",
        root.display(),
        stats.loc,
        stats.languages.len()
    );
    Ok(stats,)
}

/// Summarizes a raw breakdown into line statistics.
///
/// # Errors
///
/// Returns [`AppError`] when the breakdown has no `SUM.code` total.
pub fn summarize(raw: &RawLineCounts, exclusions: &Exclusions,) -> Result<LineStats, AppError,>
{
    let raw_total = raw
        .get(SUM_ENTRY,)
        .and_then(code_lines,)
        .ok_or_else(|| AppError::validation("line counts are missing SUM.code",),)?;

    let mut unwanted = 0u64;
    let mut sizes = Vec::with_capacity(raw.len(),);
    for (language, entry,) in raw {
        if language == HEADER_ENTRY || language == SUM_ENTRY {
            continue;
        }
        let lines = code_lines(entry,).unwrap_or(0,);
        if exclusions.is_ignored_language(language,) {
            unwanted += lines;
            continue;
        }
        sizes.push((language.clone(), lines,),);
    }

    Ok(LineStats::from_sizes(sizes, raw_total.saturating_sub(unwanted,),),)
}

fn code_lines(entry: &Value,) -> Option<u64,>
{
    entry.get("code",).and_then(Value::as_u64,)
}

fn ceil_percent(size: u64, total: u64,) -> u32
{
    let percent = size.saturating_mul(100,).div_ceil(total,);
    percent.min(100,) as u32
}
