// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tuning reports for power tuning runs.
//!
//! # Quick Start
//!
//! ```ignore
//! use power_tuning_report::{write_all_outputs, TuningReport};
//!
//! let report = TuningReport::new("my-function", result)
//!     .with_visualization(&config.visualization_url);
//! write_all_outputs(&report, "tuning/output")?;
//! ```
//!
//! # Modules
//!
//! - [`result`] - the serialisable `TuningReport`
//! - [`io`] - reading and writing reports
//! - [`markdown`] - markdown summary generation
//! - [`visualization`] - chart link encoding

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod io;
pub mod markdown;
pub mod result;
pub mod visualization;

pub use io::{read_report_json, write_all_outputs, write_report_json};
pub use markdown::generate_summary;
pub use result::TuningReport;
pub use visualization::build_visualization_url;

use thiserror::Error;

/// Errors that can occur while writing or reading reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
