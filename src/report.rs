//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use std::io::Write;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::detect::{AnalysisError, AnalysisResult, IsImmutable};

/// Which results to include in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    #[default]
    All,
    /// Immutable and effectively immutable classes.
    Immutable,
    /// Everything else.
    Mutable,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::All => "all",
            ReportMode::Immutable => "immutable",
            ReportMode::Mutable => "mutable",
        }
    }

    pub fn includes(&self, result: &AnalysisResult) -> bool {
        match self {
            ReportMode::All => true,
            ReportMode::Immutable => result.is_immutable.is_acceptable(),
            ReportMode::Mutable => !result.is_immutable.is_acceptable(),
        }
    }
}

impl std::str::FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ReportMode::All),
            "immutable" => Ok(ReportMode::Immutable),
            "mutable" => Ok(ReportMode::Mutable),
            _ => Err(format!("invalid report mode {:?}, must be 'all', 'immutable' or 'mutable'", s)),
        }
    }
}

/// Verdict counts over every analysed class, regardless of report mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub analysed: usize,
    pub immutable: usize,
    pub effectively_immutable: usize,
    pub not_immutable: usize,
    pub could_not_analyse: usize,
    pub errors: usize,
}

impl Summary {
    pub fn from_results(results: &[AnalysisResult], errors: &[AnalysisError]) -> Self {
        let mut summary = Summary {
            analysed: results.len(),
            errors: errors.len(),
            ..Default::default()
        };
        for result in results {
            match result.is_immutable {
                IsImmutable::Immutable => summary.immutable += 1,
                IsImmutable::EffectivelyImmutable => summary.effectively_immutable += 1,
                IsImmutable::NotImmutable => summary.not_immutable += 1,
                IsImmutable::CouldNotAnalyse => summary.could_not_analyse += 1,
            }
        }
        summary
    }

    /// True when no class is mutable or unanalysable.
    pub fn passed(&self) -> bool {
        self.not_immutable == 0 && self.could_not_analyse == 0
    }
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub classpath: Vec<String>,
    pub results: Vec<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AnalysisError>,
    pub summary: Summary,
}

impl JsonReport {
    pub fn new(
        classpath: &[String],
        results: &[AnalysisResult],
        errors: &[AnalysisError],
        mode: ReportMode,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            classpath: classpath.to_vec(),
            results: results.iter().filter(|r| mode.includes(r)).cloned().collect(),
            errors: errors.to_vec(),
            summary: Summary::from_results(results, errors),
        }
    }
}

/// Write results in JSON format.
pub fn write_json<W: Write>(out: &mut W, report: &JsonReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty<W: Write>(
    out: &mut W,
    classpath: &[String],
    results: &[AnalysisResult],
    errors: &[AnalysisError],
    mode: ReportMode,
    show_summary: bool,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} v{}", "mutcheck".cyan().bold(), env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Classpath: ".dimmed(), classpath.join(", "))?;
    writeln!(out)?;

    for result in results.iter().filter(|r| mode.includes(r)) {
        write_result(out, result)?;
    }

    if !errors.is_empty() {
        writeln!(out, "  {} ({}):", "Analysis errors".bold(), errors.len())?;
        for error in errors {
            writeln!(
                out,
                "    {} {} {}",
                error.class_name.to_string().blue(),
                format!("[{}]", error.checker_name).dimmed(),
                error.description
            )?;
        }
        writeln!(out)?;
    }

    if show_summary {
        write_summary(out, &Summary::from_results(results, errors))?;
    }
    Ok(())
}

fn write_result<W: Write>(out: &mut W, result: &AnalysisResult) -> std::io::Result<()> {
    write!(out, "  ")?;
    write_verdict_tag(out, result.is_immutable)?;
    writeln!(out, " {}", result.class_name.to_string().bold())?;
    for reason in &result.reasons {
        writeln!(out, "      {:<34}{}", reason.reason.as_str().dimmed(), reason.location.to_string().blue())?;
        writeln!(out, "        {}", reason.message)?;
    }
    if !result.reasons.is_empty() {
        writeln!(out)?;
    }
    Ok(())
}

fn write_verdict_tag<W: Write>(out: &mut W, verdict: IsImmutable) -> std::io::Result<()> {
    let tag = format!("{:<22}", verdict.as_str());
    match verdict {
        IsImmutable::Immutable => write!(out, "{}", tag.green()),
        IsImmutable::EffectivelyImmutable => write!(out, "{}", tag.green().dimmed()),
        IsImmutable::NotImmutable => write!(out, "{}", tag.red()),
        IsImmutable::CouldNotAnalyse => write!(out, "{}", tag.yellow()),
    }
}

fn write_summary<W: Write>(out: &mut W, summary: &Summary) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {}", "Summary:".bold())?;
    writeln!(out, "    {:<24}{:>5}", "analysed", summary.analysed)?;
    writeln!(out, "    {:<24}{:>5}", "immutable", summary.immutable)?;
    writeln!(out, "    {:<24}{:>5}", "effectively immutable", summary.effectively_immutable)?;
    writeln!(out, "    {:<24}{:>5}", "not immutable", summary.not_immutable)?;
    writeln!(out, "    {:<24}{:>5}", "could not analyse", summary.could_not_analyse)?;
    if summary.errors > 0 {
        writeln!(out, "    {:<24}{:>5}", "errors", summary.errors)?;
    }
    writeln!(out)?;
    if summary.passed() {
        writeln!(out, "  {}", "✓ PASS".green())
    } else {
        writeln!(out, "  {}", "✗ FAIL".red())
    }
}
