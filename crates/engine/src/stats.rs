// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Statistics aggregation over a batch of execution records.
//!
//! A batch of noisy duration samples is reduced to a trimmed mean: the
//! samples are sorted, a fraction is discarded from each end and the rest
//! is averaged. Cost is computed separately on the untrimmed billed
//! durations so it reflects exact spend.

use crate::cost::CostModel;
use crate::duration::{extract_durations, DurationError, Durations};
use power_tuning_core::{CandidateStats, ExecutionRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while aggregating a batch.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A record's log could not be parsed.
    #[error(transparent)]
    Duration(#[from] DurationError),

    /// Computed stats violate their invariants.
    #[error("Invalid candidate stats: {0}")]
    InvalidStats(String),
}

/// Trimmed mean of `samples`, discarding `discard_fraction` from each end.
///
/// The fraction is clamped to `[0, 1]`. Empty input yields `0.0`. When the
/// requested discard would remove every sample, nothing is discarded from
/// the top and at most `len - 1` samples from the bottom, so a single
/// sample is always returned unchanged.
pub fn compute_trimmed_mean(samples: &[f64], discard_fraction: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let len = sorted.len();
    let fraction = if discard_fraction.is_nan() {
        0.0
    } else {
        discard_fraction.clamp(0.0, 1.0)
    };
    let discard = (fraction * len as f64).floor() as usize;

    let (lower, upper) = if 2 * discard >= len {
        debug!(len, discard, "trim window empty, keeping the top samples");
        (discard.min(len - 1), 0)
    } else {
        (discard, discard)
    };

    let window = &sorted[lower..len - upper];
    window.iter().sum::<f64>() / window.len() as f64
}

/// Per-record durations extracted from a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationBatch {
    /// Extracted durations, in record order.
    pub samples: Vec<Durations>,
}

impl DurationBatch {
    /// Extract durations from every record.
    pub fn from_records(records: &[ExecutionRecord]) -> Result<Self, DurationError> {
        let samples = records
            .iter()
            .map(|r| extract_durations(&r.log))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { samples })
    }

    /// Effective wall durations, one per record.
    pub fn effective(&self) -> Vec<f64> {
        self.samples.iter().map(Durations::effective).collect()
    }

    /// Billed durations including billed restore, one per record.
    pub fn billed(&self) -> Vec<f64> {
        self.samples.iter().map(Durations::effective_billed).collect()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the batch holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reduce one candidate's records into [`CandidateStats`].
///
/// The trimmed mean of effective durations drives the average price; the
/// untrimmed billed durations drive the total cost.
pub fn aggregate(
    power: u32,
    records: &[ExecutionRecord],
    discard_fraction: f64,
    model: &CostModel,
) -> Result<CandidateStats, AggregateError> {
    let batch = DurationBatch::from_records(records)?;

    let average_duration = compute_trimmed_mean(&batch.effective(), discard_fraction);
    let average_price = model.price(power, average_duration);
    let total_cost = model.total_cost(power, &batch.billed());

    debug!(
        power,
        samples = batch.len(),
        average_duration,
        average_price,
        total_cost,
        "aggregated candidate"
    );

    CandidateStats::new(power, average_price, average_duration, total_cost)
        .map_err(|e| AggregateError::InvalidStats(e.to_string()))
}
