// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optimization selector.
//!
//! Picks the winning candidate under a strategy:
//!
//! - `cost`: lowest average price, then lowest average duration
//! - `speed`: lowest average duration, then lowest average price
//! - `balanced`: lowest `w * price / max_price + (1 - w) * duration / max_duration`
//!
//! Selection is deterministic: remaining ties keep the earliest candidate.

use crate::cost::orchestration_cost;
use power_tuning_core::{CandidateStats, OptimizationResult, OptimizationStrategy};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during selection.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// Nothing to choose from.
    #[error("No candidates to select from")]
    NoCandidates,

    /// Strategy name not recognised.
    #[error("Unknown optimization strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type for selector operations.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Parse a strategy name.
pub fn parse_strategy(name: &str) -> Result<OptimizationStrategy> {
    name.parse()
        .map_err(|_| SelectorError::UnknownStrategy(name.to_string()))
}

/// Pick the winning candidate.
///
/// `balanced_weight` is clamped to `[0, 1]` and only used by the balanced
/// strategy.
pub fn select(
    strategy: OptimizationStrategy,
    candidates: &[CandidateStats],
    balanced_weight: f64,
) -> Result<&CandidateStats> {
    if candidates.is_empty() {
        return Err(SelectorError::NoCandidates);
    }

    let by_price_then_duration = |a: &CandidateStats, b: &CandidateStats| {
        a.average_price
            .total_cmp(&b.average_price)
            .then(a.average_duration.total_cmp(&b.average_duration))
    };

    let winner = match strategy {
        OptimizationStrategy::Cost => min_by(candidates, by_price_then_duration),
        OptimizationStrategy::Speed => min_by(candidates, |a, b| {
            a.average_duration
                .total_cmp(&b.average_duration)
                .then(a.average_price.total_cmp(&b.average_price))
        }),
        OptimizationStrategy::Balanced => {
            let weight = clamp_weight(balanced_weight);
            let max_price = candidates
                .iter()
                .map(|c| c.average_price)
                .fold(0.0, f64::max);
            let max_duration = candidates
                .iter()
                .map(|c| c.average_duration)
                .fold(0.0, f64::max);
            let value = |c: &CandidateStats| {
                weight * ratio(c.average_price, max_price)
                    + (1.0 - weight) * ratio(c.average_duration, max_duration)
            };
            min_by(candidates, |a, b| {
                value(a)
                    .total_cmp(&value(b))
                    .then_with(|| by_price_then_duration(a, b))
            })
        }
    };

    Ok(winner)
}

/// Select by strategy name.
pub fn select_by_name<'a>(
    strategy: &str,
    candidates: &'a [CandidateStats],
    balanced_weight: f64,
) -> Result<&'a CandidateStats> {
    select(parse_strategy(strategy)?, candidates, balanced_weight)
}

fn min_by<F>(candidates: &[CandidateStats], mut cmp: F) -> &CandidateStats
where
    F: FnMut(&CandidateStats, &CandidateStats) -> Ordering,
{
    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        if cmp(candidate, best) == Ordering::Less {
            best = candidate;
        }
    }
    best
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        0.5
    } else {
        weight.clamp(0.0, 1.0)
    }
}

/// Inputs to [`optimize`] beyond the candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    /// Selection strategy
    pub strategy: OptimizationStrategy,
    /// Cost weight for the balanced strategy
    pub balanced_weight: f64,
    /// Invocations per candidate
    pub num: u32,
    /// Whether cold-start replication was on
    pub only_cold_starts: bool,
    /// Price of one orchestration step
    pub step_price: f64,
    /// Return every candidate's stats with the result
    pub include_stats: bool,
}

/// Select the winner and attach the orchestration cost breakdown.
pub fn optimize(candidates: &[CandidateStats], params: &SelectionParams) -> Result<OptimizationResult> {
    let winner = select(params.strategy, candidates, params.balanced_weight)?.clone();
    let cost = orchestration_cost(candidates, params.num, params.only_cold_starts, params.step_price);

    info!(
        strategy = %params.strategy,
        power = winner.power,
        average_price = winner.average_price,
        average_duration = winner.average_duration,
        total_cost = cost.total(),
        "selected winning candidate"
    );

    Ok(OptimizationResult {
        strategy: params.strategy,
        balanced_weight: (params.strategy == OptimizationStrategy::Balanced)
            .then(|| clamp_weight(params.balanced_weight)),
        winner,
        cost,
        stats: params.include_stats.then(|| candidates.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(power: u32, price: f64, duration: f64) -> CandidateStats {
        CandidateStats::new(power, price, duration, price * 10.0).unwrap()
    }

    fn scenario() -> Vec<CandidateStats> {
        vec![
            candidate(128, 100.0, 100.0),
            candidate(256, 200.0, 300.0),
            candidate(512, 30.0, 200.0),
        ]
    }

    #[test]
    fn test_cost_picks_cheapest() {
        let winner = select(OptimizationStrategy::Cost, &scenario(), 0.5).unwrap().clone();
        assert_eq!(winner.power, 512);
        assert_eq!(winner.average_price, 30.0);
    }

    #[test]
    fn test_speed_picks_fastest() {
        let winner = select(OptimizationStrategy::Speed, &scenario(), 0.5).unwrap().clone();
        assert_eq!(winner.power, 128);
        assert_eq!(winner.average_duration, 100.0);
    }

    #[test]
    fn test_cost_tie_broken_by_duration() {
        let candidates = vec![candidate(128, 10.0, 50.0), candidate(256, 10.0, 20.0)];
        let winner = select(OptimizationStrategy::Cost, &candidates, 0.5).unwrap();
        assert_eq!(winner.power, 256);
    }

    #[test]
    fn test_speed_tie_broken_by_price() {
        let candidates = vec![candidate(128, 10.0, 20.0), candidate(256, 5.0, 20.0)];
        let winner = select(OptimizationStrategy::Speed, &candidates, 0.5).unwrap();
        assert_eq!(winner.power, 256);
    }

    #[test]
    fn test_full_tie_keeps_first() {
        let candidates = vec![candidate(1024, 10.0, 20.0), candidate(128, 10.0, 20.0)];
        let winner = select(OptimizationStrategy::Cost, &candidates, 0.5).unwrap();
        assert_eq!(winner.power, 1024);
    }

    #[test]
    fn test_balanced_extremes_match_pure_strategies() {
        let candidates = scenario();
        let cost = select(OptimizationStrategy::Balanced, &candidates, 1.0).unwrap();
        assert_eq!(cost.power, 512);
        let speed = select(OptimizationStrategy::Balanced, &candidates, 0.0).unwrap();
        assert_eq!(speed.power, 128);
    }

    #[test]
    fn test_balanced_midpoint() {
        // 128: 0.5*100/200 + 0.5*100/300 = 0.4167
        // 512: 0.5*30/200 + 0.5*200/300 = 0.4083
        let candidates = scenario();
        let winner = select(OptimizationStrategy::Balanced, &candidates, 0.5).unwrap();
        assert_eq!(winner.power, 512);
    }

    #[test]
    fn test_balanced_weight_is_clamped() {
        let candidates = scenario();
        let winner = select(OptimizationStrategy::Balanced, &candidates, 7.0).unwrap();
        assert_eq!(winner.power, 512);
        let winner = select(OptimizationStrategy::Balanced, &candidates, -3.0).unwrap();
        assert_eq!(winner.power, 128);
    }

    #[test]
    fn test_balanced_all_zero() {
        let candidates = vec![candidate(128, 0.0, 0.0), candidate(256, 0.0, 0.0)];
        let winner = select(OptimizationStrategy::Balanced, &candidates, 0.5).unwrap();
        assert_eq!(winner.power, 128);
    }

    #[test]
    fn test_monotonic_cost_and_speed() {
        let candidates = vec![
            candidate(128, 7.0, 90.0),
            candidate(256, 3.0, 140.0),
            candidate(512, 5.0, 60.0),
            candidate(1024, 9.0, 35.0),
        ];
        let cost = select(OptimizationStrategy::Cost, &candidates, 0.5).unwrap();
        assert!(candidates.iter().all(|c| cost.average_price <= c.average_price));
        let speed = select(OptimizationStrategy::Speed, &candidates, 0.5).unwrap();
        assert!(candidates.iter().all(|c| speed.average_duration <= c.average_duration));
    }

    #[test]
    fn test_empty_candidates_fail() {
        assert!(matches!(
            select(OptimizationStrategy::Cost, &[], 0.5),
            Err(SelectorError::NoCandidates)
        ));
    }

    #[test]
    fn test_unknown_strategy_fails() {
        assert!(matches!(
            select_by_name("fastest", &scenario(), 0.5),
            Err(SelectorError::UnknownStrategy(name)) if name == "fastest"
        ));
        assert_eq!(select_by_name("speed", &scenario(), 0.5).unwrap().power, 128);
    }

    #[test]
    fn test_optimize_attaches_cost_and_stats() {
        let candidates = scenario();
        let params = SelectionParams {
            strategy: OptimizationStrategy::Cost,
            balanced_weight: 0.5,
            num: 10,
            only_cold_starts: false,
            step_price: 0.000025,
            include_stats: true,
        };

        let result = optimize(&candidates, &params).unwrap();
        assert_eq!(result.winner.power, 512);
        assert_eq!(result.cost.steps, 9);
        assert_eq!(result.cost.compute_cost, 3300.0);
        assert_eq!(result.balanced_weight, None);
        assert_eq!(result.stats.as_deref(), Some(candidates.as_slice()));

        let hidden = optimize(
            &candidates,
            &SelectionParams {
                include_stats: false,
                strategy: OptimizationStrategy::Balanced,
                balanced_weight: 2.0,
                ..params
            },
        )
        .unwrap();
        assert_eq!(hidden.stats, None);
        assert_eq!(hidden.balanced_weight, Some(1.0));
    }
}
