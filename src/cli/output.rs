//! Output formatting for `plan` and `stats`
//!
//! Machine formats serialize the report as-is; the human format is a short aligned
//! listing. Output goes to stdout, logs stay on stderr.

use crate::app::Plan;
use crate::manifest::ManifestStats;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_stats(&self, stats: &ManifestStats) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(stats),
            OutputFormat::Yaml => to_yaml(stats),
            OutputFormat::Human => Ok(format!(
                "Manifest Statistics:\n  Total:      {}\n  Pushed:     {}\n  Built:      {}\n  Downloaded: {}\n  New:        {}\n  Failed:     {}\n",
                stats.total, stats.pushed, stats.built, stats.downloaded, stats.new, stats.failed
            )),
        }
    }

    pub fn format_plan(&self, plan: &Plan) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(plan),
            OutputFormat::Yaml => to_yaml(plan),
            OutputFormat::Human => Ok(format_plan_human(plan)),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).context("Failed to serialize to YAML")
}

fn format_plan_human(plan: &Plan) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Active releases: {}", plan.active.join(", "));
    if let Some(latest) = &plan.latest {
        let _ = writeln!(out, "Latest:          {}", latest);
    }
    if !plan.added.is_empty() {
        let _ = writeln!(out, "New to manifest: {}", plan.added.join(", "));
    }

    if plan.images.is_empty() {
        let _ = writeln!(out, "\n✓ Nothing to do: all active versions already pushed");
        return out;
    }

    let _ = writeln!(
        out,
        "\nNext run processes {} of {} pending (limit {}):",
        plan.images.len(),
        plan.pending,
        plan.limit
    );
    for image in &plan.images {
        let _ = write!(out, "  {:<12} {}", image.version, image.status);
        if let Some(error) = &image.last_error {
            let _ = write!(out, "  (last error: {})", error);
        }
        out.push('\n');
    }
    out
}
