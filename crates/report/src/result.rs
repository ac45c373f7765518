// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tuning report types.

use crate::visualization::build_visualization_url;
use chrono::{DateTime, Utc};
use power_tuning_core::{CandidateStats, OptimizationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serialisable record of one finished tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    /// Unique identifier of the run.
    pub run_id: Uuid,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Tuned function identifier.
    pub function: String,
    /// Selection outcome.
    pub result: OptimizationResult,
    /// Link to a chart of the per-candidate stats, when they were kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_url: Option<String>,
}

impl TuningReport {
    /// Create a report stamped with a fresh run id and the current time.
    pub fn new(function: impl Into<String>, result: OptimizationResult) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            function: function.into(),
            result,
            visualization_url: None,
        }
    }

    /// Attach a visualization link built against `base_url`.
    ///
    /// Does nothing when the result carries no per-candidate stats.
    pub fn with_visualization(mut self, base_url: &str) -> Self {
        self.visualization_url = self
            .result
            .stats
            .as_deref()
            .filter(|stats| !stats.is_empty())
            .map(|stats| build_visualization_url(stats, base_url));
        self
    }

    /// Per-candidate stats, falling back to the winner alone.
    pub fn candidates(&self) -> Vec<CandidateStats> {
        match &self.result.stats {
            Some(stats) if !stats.is_empty() => stats.clone(),
            _ => vec![self.result.winner.clone()],
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use power_tuning_core::{
        CandidateStats, OptimizationResult, OptimizationStrategy, OrchestrationCost,
    };

    pub(crate) fn result(with_stats: bool) -> OptimizationResult {
        let stats = vec![
            CandidateStats::new(128, 0.5, 100.5, 5.0).unwrap(),
            CandidateStats::new(256, 0.25, 50.25, 2.5).unwrap(),
        ];
        OptimizationResult {
            strategy: OptimizationStrategy::Cost,
            balanced_weight: None,
            winner: stats[1].clone(),
            cost: OrchestrationCost {
                steps: 8,
                step_price: 0.000025,
                orchestration_cost: 0.0002,
                compute_cost: 7.5,
            },
            stats: with_stats.then_some(stats),
        }
    }
}
