// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown summary generation for tuning reports.

use crate::result::TuningReport;
use std::fmt::{self, Write};

/// Generate a markdown summary of a tuning report.
///
/// Lists every candidate in memory order with the winner marked.
pub fn generate_summary(report: &TuningReport) -> String {
    let mut output = String::new();
    write_summary(&mut output, report).expect("writing to a String cannot fail");
    output
}

fn write_summary(out: &mut String, report: &TuningReport) -> fmt::Result {
    let result = &report.result;

    writeln!(out, "# Power Tuning Summary")?;
    writeln!(out)?;
    writeln!(out, "Function: `{}`", report.function)?;
    writeln!(out, "Run: {}", report.run_id)?;
    writeln!(out, "Generated: {}", report.timestamp.to_rfc3339())?;
    writeln!(out)?;

    write!(out, "Strategy: **{}**", result.strategy)?;
    if let Some(weight) = result.balanced_weight {
        write!(out, " (cost weight {:.2})", weight)?;
    }
    writeln!(out)?;
    writeln!(out)?;

    writeln!(out, "## Candidates")?;
    writeln!(out)?;
    writeln!(out, "| Memory (MB) | Avg Duration (ms) | Avg Price | Total Cost | |")?;
    writeln!(out, "|-------------|-------------------|-----------|------------|-|")?;

    let mut candidates = report.candidates();
    candidates.sort_by_key(|c| c.power);
    for candidate in &candidates {
        let marker = if candidate.power == result.winner.power {
            "**winner**"
        } else {
            ""
        };
        writeln!(
            out,
            "| {} | {:.2} | {:.3e} | {:.3e} | {} |",
            candidate.power,
            candidate.average_duration,
            candidate.average_price,
            candidate.total_cost,
            marker
        )?;
    }

    writeln!(out)?;
    writeln!(out, "## Tuning Cost")?;
    writeln!(out)?;
    writeln!(
        out,
        "- Orchestration: {} steps x {:.3e} = {:.3e}",
        result.cost.steps, result.cost.step_price, result.cost.orchestration_cost
    )?;
    writeln!(out, "- Compute: {:.3e}", result.cost.compute_cost)?;
    writeln!(out, "- Total: {:.3e}", result.cost.total())?;

    if let Some(url) = &report.visualization_url {
        writeln!(out)?;
        writeln!(out, "[Visualization]({})", url)?;
    }

    writeln!(out)?;
    writeln!(out, "---")?;
    writeln!(out, "Best memory size: {} MB", result.winner.power)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures;

    #[test]
    fn test_summary_marks_winner() {
        let report = TuningReport::new("my-function", fixtures::result(true));
        let summary = generate_summary(&report);

        assert!(summary.starts_with("# Power Tuning Summary"));
        assert!(summary.contains("Function: `my-function`"));
        assert!(summary.contains("Strategy: **cost**"));
        let winner_rows: Vec<_> = summary.lines().filter(|l| l.contains("**winner**")).collect();
        assert_eq!(winner_rows.len(), 1);
        assert!(winner_rows[0].starts_with("| 256 |"));
        assert!(summary.contains("Best memory size: 256 MB"));
    }

    #[test]
    fn test_summary_rows_sorted_by_memory() {
        let report = TuningReport::new("fn", fixtures::result(true));
        let summary = generate_summary(&report);
        let rows: Vec<_> = summary.lines().filter(|l| l.starts_with("| 1") || l.starts_with("| 2")).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("| 128 |"));
    }

    #[test]
    fn test_summary_includes_visualization_link() {
        let report =
            TuningReport::new("fn", fixtures::result(true)).with_visualization("https://viz/");
        let summary = generate_summary(&report);
        assert!(summary.contains("[Visualization](https://viz/#"));
    }

    #[test]
    fn test_summary_writes_every_section() {
        let mut result = fixtures::result(false);
        result.strategy = power_tuning_core::OptimizationStrategy::Balanced;
        result.balanced_weight = Some(0.3);
        let summary = generate_summary(&TuningReport::new("fn", result));

        assert!(summary.contains("Strategy: **balanced** (cost weight 0.30)"));
        assert!(summary.contains("## Candidates"));
        assert!(summary.contains("- Orchestration: 8 steps"));
        assert!(!summary.contains("[Visualization]"));
        assert!(summary.trim_end().ends_with("Best memory size: 256 MB"));
    }
}
