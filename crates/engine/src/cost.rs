// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cost model.
//!
//! Compute cost scales linearly with memory size: the base unit price is
//! quoted per millisecond at a reference memory size, so a candidate with
//! `value` MB pays `base * (value / reference)` per millisecond.
//!
//! Orchestration cost is a step count times a per-step price. A run over
//! `n` candidates takes `6 + n` steps; cold-start replication adds
//! `2 * n * (num + 1)` more for the per-replica setup and cleanup.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::cost::CostModel;
//!
//! let model = CostModel::from_config(&config, Architecture::X86_64);
//! let price = model.price(512, 210.0);
//! ```

use power_tuning_core::{Architecture, CandidateStats, EngineConfig, OrchestrationCost};
use serde::{Deserialize, Serialize};

/// Fixed number of orchestration steps of every tuning run.
pub const BASE_ORCHESTRATION_STEPS: u64 = 6;

/// Price of one invocation of `average_duration` ms at `value` MB.
///
/// Uses the trimmed-mean duration, not quantized to billing increments, so
/// candidates can be compared on equal footing.
pub fn compute_price(base_cost: f64, reference_memory: u32, value: u32, average_duration: f64) -> f64 {
    base_cost * memory_ratio(reference_memory, value) * average_duration
}

/// Exact spend over every sample: `base * (value / reference) * sum(durations)`.
pub fn compute_total_cost(
    base_cost: f64,
    reference_memory: u32,
    value: u32,
    durations: &[f64],
) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    let sum: f64 = durations.iter().sum();
    base_cost * memory_ratio(reference_memory, value) * sum
}

fn memory_ratio(reference_memory: u32, value: u32) -> f64 {
    if reference_memory == 0 {
        return 0.0;
    }
    f64::from(value) / f64::from(reference_memory)
}

/// Number of billed orchestration steps for a run.
pub fn orchestration_steps(candidates: usize, num: u32, only_cold_starts: bool) -> u64 {
    let n = candidates as u64;
    let mut steps = BASE_ORCHESTRATION_STEPS + n;
    if only_cold_starts {
        steps += 2 * n * (u64::from(num) + 1);
    }
    steps
}

/// Orchestration cost breakdown for a finished run.
pub fn orchestration_cost(
    stats: &[CandidateStats],
    num: u32,
    only_cold_starts: bool,
    step_price: f64,
) -> OrchestrationCost {
    let steps = orchestration_steps(stats.len(), num, only_cold_starts);
    OrchestrationCost {
        steps,
        step_price,
        orchestration_cost: steps as f64 * step_price,
        compute_cost: stats.iter().map(|s| s.total_cost).sum(),
    }
}

/// Prices resolved for one architecture and region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Base cost per ms at the reference memory size
    pub base_cost: f64,
    /// Reference memory size in MB
    pub reference_memory_mb: u32,
}

impl CostModel {
    /// Create a cost model from explicit prices.
    pub fn new(base_cost: f64, reference_memory_mb: u32) -> Self {
        Self {
            base_cost,
            reference_memory_mb,
        }
    }

    /// Resolve the base price for `architecture` in the configured region.
    pub fn from_config(config: &EngineConfig, architecture: Architecture) -> Self {
        Self::new(config.base_cost(architecture), config.reference_memory_mb)
    }

    /// See [`compute_price`].
    pub fn price(&self, value: u32, average_duration: f64) -> f64 {
        compute_price(self.base_cost, self.reference_memory_mb, value, average_duration)
    }

    /// See [`compute_total_cost`].
    pub fn total_cost(&self, value: u32, durations: &[f64]) -> f64 {
        compute_total_cost(self.base_cost, self.reference_memory_mb, value, durations)
    }
}
