// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Duration extraction from raw execution logs.
//!
//! Two log encodings are understood:
//!
//! - **Text**: tab-separated report fields such as
//!   `REPORT RequestId: ..\tDuration: 12.3 ms\tBilled Duration: 13 ms`.
//!   A requested field that is absent yields `0.0`.
//! - **Structured**: one or more JSON objects, possibly pretty-printed and
//!   interleaved with non-JSON noise. Exactly one object with
//!   `"type": "platform.report"` carries the metrics under `record.metrics`.
//!   Malformed objects are skipped; a log with no report object is an error.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::duration::extract_duration;
//!
//! let ms = extract_duration(log, DurationKind::Billed)?;
//! ```

use once_cell::sync::Lazy;
use power_tuning_core::DurationKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Discriminator value of the structured report event.
pub const REPORT_EVENT_TYPE: &str = "platform.report";

static TEXT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<label>[A-Za-z][A-Za-z ]*):\s*(?P<value>\d+(?:\.\d+)?)\s*ms$")
        .expect("text field pattern is valid")
});

/// Errors that can occur while extracting durations.
#[derive(Debug, Error)]
pub enum DurationError {
    /// Structured log without a report event.
    #[error("Unrecognized log format: no platform.report record found")]
    ReportNotFound,

    /// A metric is present but not a usable duration.
    #[error("Invalid metric {field}: {value}")]
    InvalidMetric {
        /// Metric field name
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// Result type for duration extraction.
pub type Result<T> = std::result::Result<T, DurationError>;

/// Encoding of a raw log blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Tab-separated text report.
    Text,
    /// JSON log events.
    Structured,
}

/// Every duration a single log yields, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Durations {
    /// Handler execution time
    pub execution: f64,
    /// Billed execution time
    pub billed: f64,
    /// Cold-start initialization time
    pub init: f64,
    /// Snapshot restore time
    pub restore: f64,
    /// Billed snapshot restore time
    pub billed_restore: f64,
}

impl Durations {
    /// Value for one kind.
    pub fn get(&self, kind: DurationKind) -> f64 {
        match kind {
            DurationKind::Execution => self.execution,
            DurationKind::Billed => self.billed,
            DurationKind::Init => self.init,
            DurationKind::Restore => self.restore,
            DurationKind::BilledRestore => self.billed_restore,
        }
    }

    fn set(&mut self, kind: DurationKind, value: f64) {
        match kind {
            DurationKind::Execution => self.execution = value,
            DurationKind::Billed => self.billed = value,
            DurationKind::Init => self.init = value,
            DurationKind::Restore => self.restore = value,
            DurationKind::BilledRestore => self.billed_restore = value,
        }
    }

    /// Whether the invocation restored from a snapshot.
    pub fn is_restore(&self) -> bool {
        self.restore > 0.0
    }

    /// Whether the invocation paid a cold-start initialization.
    pub fn is_cold_start(&self) -> bool {
        self.init > 0.0
    }

    /// Wall time of the invocation: execution plus restore for snapshot
    /// restores, execution plus init for cold starts.
    pub fn effective(&self) -> f64 {
        if self.is_restore() {
            self.execution + self.restore
        } else {
            self.execution + self.init
        }
    }

    /// Billed time of the invocation, including any billed restore.
    pub fn effective_billed(&self) -> f64 {
        self.billed + self.billed_restore
    }
}

fn text_label(kind: DurationKind) -> &'static str {
    match kind {
        DurationKind::Execution => "Duration",
        DurationKind::Billed => "Billed Duration",
        DurationKind::Init => "Init Duration",
        DurationKind::Restore => "Restore Duration",
        DurationKind::BilledRestore => "Billed Restore Duration",
    }
}

fn metric_field(kind: DurationKind) -> &'static str {
    match kind {
        DurationKind::Execution => "durationMs",
        DurationKind::Billed => "billedDurationMs",
        DurationKind::Init => "initDurationMs",
        DurationKind::Restore => "restoreDurationMs",
        DurationKind::BilledRestore => "billedRestoreDurationMs",
    }
}

/// Guess the encoding of a log blob.
pub fn detect_format(log: &str) -> RecordFormat {
    if log
        .lines()
        .any(|line| line.trim_start().starts_with("REPORT "))
    {
        return RecordFormat::Text;
    }
    if log.lines().any(|line| line.trim_start().starts_with('{')) {
        RecordFormat::Structured
    } else {
        RecordFormat::Text
    }
}

/// Extract one duration from a raw log.
pub fn extract_duration(log: &str, kind: DurationKind) -> Result<f64> {
    Ok(extract_durations(log)?.get(kind))
}

/// Extract every duration from a raw log.
pub fn extract_durations(log: &str) -> Result<Durations> {
    match detect_format(log) {
        RecordFormat::Text => Ok(parse_text(log)),
        RecordFormat::Structured => parse_structured(log),
    }
}

fn parse_text(log: &str) -> Durations {
    let mut durations = Durations::default();

    for field in log.split(['\t', '\n']).map(str::trim) {
        let Some(caps) = TEXT_FIELD.captures(field) else {
            continue;
        };
        let label = &caps["label"];
        let Some(kind) = DurationKind::ALL
            .into_iter()
            .find(|k| text_label(*k) == label)
        else {
            continue;
        };
        if let Ok(value) = caps["value"].parse::<f64>() {
            durations.set(kind, value);
        }
    }

    durations
}

fn parse_structured(log: &str) -> Result<Durations> {
    let objects = scan_json_objects(log);

    let mut reports = objects
        .iter()
        .filter(|obj| obj.get("type").and_then(Value::as_str) == Some(REPORT_EVENT_TYPE));

    let report = reports.next().ok_or(DurationError::ReportNotFound)?;
    let extra = reports.count();
    if extra > 0 {
        debug!(extra, "multiple report events in log, using the first");
    }

    let metrics = report.get("record").and_then(|r| r.get("metrics"));

    let mut durations = Durations::default();
    for kind in DurationKind::ALL {
        let field = metric_field(kind);
        let Some(raw) = metrics.and_then(|m| m.get(field)) else {
            continue;
        };
        match raw.as_f64() {
            Some(value) if value.is_finite() && value >= 0.0 => durations.set(kind, value),
            Some(value) => {
                return Err(DurationError::InvalidMetric {
                    field,
                    value: value.to_string(),
                })
            }
            // present but non-numeric metrics are treated as unavailable
            None => debug!(field, "non-numeric metric ignored"),
        }
    }

    Ok(durations)
}

/// Collect every JSON object embedded in `log`, skipping malformed ones.
pub(crate) fn scan_json_objects(log: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut pos = 0;

    while let Some(offset) = log[pos..].find('{') {
        let start = pos + offset;
        match balanced_object_len(&log.as_bytes()[start..]) {
            Some(len) => {
                let candidate = &log[start..start + len];
                match serde_json::from_str::<Value>(candidate) {
                    Ok(value) => objects.push(value),
                    Err(e) => debug!(error = %e, "skipping malformed JSON object in log"),
                }
                pos = start + len;
            }
            None => {
                debug!(offset = start, "skipping unterminated JSON object in log");
                pos = start + 1;
            }
        }
    }

    objects
}

/// Length of the brace-balanced object starting at `bytes[0]`, if it closes.
fn balanced_object_len(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
