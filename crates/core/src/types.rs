// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared types for measurement, cost and optimization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which numeric duration a log record yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationKind {
    /// Handler execution time.
    #[default]
    Execution,
    /// Execution time rounded up to the billing increment.
    Billed,
    /// Cold-start initialization time.
    Init,
    /// Snapshot restore time.
    Restore,
    /// Billed portion of the snapshot restore.
    BilledRestore,
}

impl DurationKind {
    /// All kinds, in declaration order.
    pub const ALL: [DurationKind; 5] = [
        DurationKind::Execution,
        DurationKind::Billed,
        DurationKind::Init,
        DurationKind::Restore,
        DurationKind::BilledRestore,
    ];
}

/// Instruction set architecture of the target function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Architecture {
    /// 64-bit x86.
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM.
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "x86_64" | "x86-64" | "amd64" => Ok(Architecture::X86_64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            _ => Err(crate::Error::invalid_input(format!(
                "unknown architecture: {}",
                s
            ))),
        }
    }
}

/// Aggregated result for one memory-size candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStats {
    /// Candidate memory size in MB.
    pub power: u32,
    /// Price of one average invocation (currency units).
    pub average_price: f64,
    /// Trimmed-mean duration in milliseconds.
    pub average_duration: f64,
    /// Untrimmed billed spend across all samples (currency units).
    pub total_cost: f64,
}

impl CandidateStats {
    /// Create validated candidate stats.
    pub fn new(
        power: u32,
        average_price: f64,
        average_duration: f64,
        total_cost: f64,
    ) -> crate::Result<Self> {
        if power == 0 {
            return Err(crate::Error::invalid_input("candidate power must be positive"));
        }
        for (name, value) in [
            ("average_price", average_price),
            ("average_duration", average_duration),
            ("total_cost", total_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::Error::invalid_input(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(Self {
            power,
            average_price,
            average_duration,
            total_cost,
        })
    }
}

/// A payload variant with its relative frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPayloadEntry {
    /// Arbitrary payload value.
    pub payload: serde_json::Value,
    /// Positive relative weight.
    pub weight: u64,
}

/// Strategy used to pick the winning candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStrategy {
    /// Cheapest average price.
    #[default]
    Cost,
    /// Fastest average duration.
    Speed,
    /// Weighted trade-off between normalized price and duration.
    Balanced,
}

impl OptimizationStrategy {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::Cost => "cost",
            OptimizationStrategy::Speed => "speed",
            OptimizationStrategy::Balanced => "balanced",
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "cost" => Ok(OptimizationStrategy::Cost),
            "speed" => Ok(OptimizationStrategy::Speed),
            "balanced" => Ok(OptimizationStrategy::Balanced),
            other => Err(crate::Error::invalid_input(format!(
                "unknown optimization strategy: {}",
                other
            ))),
        }
    }
}

/// Orchestration-level cost breakdown of one tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationCost {
    /// Number of billed orchestration steps.
    pub steps: u64,
    /// Price of one orchestration step.
    pub step_price: f64,
    /// `steps * step_price`
    pub orchestration_cost: f64,
    /// Sum of every candidate's total cost.
    pub compute_cost: f64,
}

impl OrchestrationCost {
    /// Orchestration plus compute spend.
    pub fn total(&self) -> f64 {
        self.orchestration_cost + self.compute_cost
    }
}

/// Terminal output of a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Strategy that picked the winner.
    pub strategy: OptimizationStrategy,
    /// Weight used by the balanced strategy (after clamping).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balanced_weight: Option<f64>,
    /// Winning candidate.
    pub winner: CandidateStats,
    /// Cost of running the tuning itself.
    pub cost: OrchestrationCost,
    /// Raw per-candidate stats, when the caller opted in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Vec<CandidateStats>>,
}
