// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! I/O operations for tuning reports.
//!
//! [`write_all_outputs`] lays out a report directory as:
//!
//! ```text
//! {dir}/report.json      full report
//! {dir}/summary.md       markdown summary
//! {dir}/raw/RAM{n}.json  one file per candidate
//! ```

use crate::markdown;
use crate::result::TuningReport;
use crate::Result;
use power_tuning_core::CandidateStats;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Report file name.
pub const REPORT_FILE: &str = "report.json";

/// Summary file name.
pub const SUMMARY_FILE: &str = "summary.md";

/// Per-candidate results directory name.
pub const RAW_DIR: &str = "raw";

/// Ensure the output directories exist.
pub fn ensure_output_dirs(dir: impl AsRef<Path>) -> Result<()> {
    fs::create_dir_all(dir.as_ref().join(RAW_DIR))?;
    Ok(())
}

/// Write a report as pretty JSON.
pub fn write_report_json(report: &TuningReport, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a report from JSON.
pub fn read_report_json(path: impl AsRef<Path>) -> Result<TuningReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write one candidate's stats into the raw directory.
pub fn write_raw_candidate(stats: &CandidateStats, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir
        .as_ref()
        .join(RAW_DIR)
        .join(format!("RAM{}.json", stats.power));
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Write the markdown summary.
pub fn write_summary(report: &TuningReport, dir: impl AsRef<Path>) -> Result<()> {
    fs::write(dir.as_ref().join(SUMMARY_FILE), markdown::generate_summary(report))?;
    Ok(())
}

/// Write every output for a report into `dir`.
pub fn write_all_outputs(report: &TuningReport, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    ensure_output_dirs(dir)?;

    for stats in report.candidates() {
        write_raw_candidate(&stats, dir)?;
    }

    write_report_json(report, dir.join(REPORT_FILE))?;
    write_summary(report, dir)?;

    info!(
        run_id = %report.run_id,
        dir = %dir.display(),
        "wrote tuning report"
    );
    Ok(())
}
