// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Visualization link encoding.
//!
//! The chart page reads its data from the URL fragment:
//!
//! ```text
//! {base}#{powers};{durations};{costs}
//! ```
//!
//! Each segment is standard base64 over packed little-endian values:
//! memory sizes as `i16`, average durations and average prices as `f32`.
//! Candidates are sorted by memory size.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use power_tuning_core::CandidateStats;

/// Build the visualization link for a set of candidates.
pub fn build_visualization_url(stats: &[CandidateStats], base_url: &str) -> String {
    let mut sorted: Vec<&CandidateStats> = stats.iter().collect();
    sorted.sort_by_key(|s| s.power);

    let powers: Vec<u8> = sorted
        .iter()
        .flat_map(|s| (s.power.min(i16::MAX as u32) as i16).to_le_bytes())
        .collect();
    let durations: Vec<u8> = sorted
        .iter()
        .flat_map(|s| (s.average_duration as f32).to_le_bytes())
        .collect();
    let costs: Vec<u8> = sorted
        .iter()
        .flat_map(|s| (s.average_price as f32).to_le_bytes())
        .collect();

    format!(
        "{}#{};{};{}",
        base_url,
        STANDARD.encode(powers),
        STANDARD.encode(durations),
        STANDARD.encode(costs)
    )
}
