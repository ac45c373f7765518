// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tuning request and input validation.
//!
//! Validation failures are input errors: always fatal, surfaced immediately
//! and never retried.

use crate::types::OptimizationStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Smallest memory size a candidate may use (MB).
pub const MIN_POWER_MB: u32 = 128;

/// Largest memory size a candidate may use (MB).
pub const MAX_POWER_MB: u32 = 10_240;

/// Largest fraction of samples that may be discarded from each end.
pub const MAX_DISCARD_FRACTION: f64 = 0.4;

/// Default candidate memory sizes.
pub const DEFAULT_POWER_VALUES: [u32; 6] = [128, 256, 512, 1024, 1536, 3008];

/// Where the invocation payload comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PayloadSource {
    /// Payload (or weighted-entry list) given inline.
    Inline {
        /// The payload value.
        value: serde_json::Value,
    },
    /// Payload stored externally; fetched once per batch.
    External {
        /// Location of the stored payload.
        uri: String,
    },
}

impl Default for PayloadSource {
    fn default() -> Self {
        PayloadSource::Inline {
            value: serde_json::Value::Null,
        }
    }
}

/// Full description of one tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningRequest {
    /// Identifier of the target function.
    pub function: String,
    /// Candidate memory sizes (MB).
    #[serde(default = "default_power_values")]
    pub power_values: Vec<u32>,
    /// Invocations per candidate.
    pub num: u32,
    /// Payload for the invocations.
    #[serde(default)]
    pub payload: PayloadSource,
    /// Issue each candidate's invocations concurrently.
    #[serde(default)]
    pub parallel_invocation: bool,
    /// Selection strategy.
    #[serde(default)]
    pub strategy: OptimizationStrategy,
    /// Cost weight for the balanced strategy.
    #[serde(default = "default_balanced_weight")]
    pub balanced_weight: f64,
    /// Fraction of samples discarded from each end before averaging.
    #[serde(default = "default_discard_top_bottom")]
    pub discard_top_bottom: f64,
    /// Pause between serial invocations.
    #[serde(default)]
    pub sleep_between_runs_ms: Option<u64>,
    /// Function invoked on each payload before the target.
    #[serde(default)]
    pub pre_processor: Option<String>,
    /// Function invoked on each target response.
    #[serde(default)]
    pub post_processor: Option<String>,
    /// Force every invocation onto a fresh revision.
    #[serde(default)]
    pub only_cold_starts: bool,
    /// Keep payloads out of error messages and logs.
    #[serde(default)]
    pub disable_payload_logs: bool,
    /// Function error types that do not abort the batch.
    #[serde(default)]
    pub allowed_exceptions: Vec<String>,
    /// Return every candidate's stats with the result.
    #[serde(default)]
    pub include_output_results: bool,
    /// Apply the winning memory size after tuning.
    #[serde(default)]
    pub auto_optimize: bool,
    /// Alias to point at the optimized revision.
    #[serde(default)]
    pub auto_optimize_alias: Option<String>,
}

fn default_power_values() -> Vec<u32> {
    DEFAULT_POWER_VALUES.to_vec()
}

fn default_balanced_weight() -> f64 {
    0.5
}

fn default_discard_top_bottom() -> f64 {
    0.2
}

impl TuningRequest {
    /// Create a request with defaults for everything but the target and count.
    pub fn new(function: impl Into<String>, num: u32) -> Self {
        Self {
            function: function.into(),
            power_values: default_power_values(),
            num,
            payload: PayloadSource::default(),
            parallel_invocation: false,
            strategy: OptimizationStrategy::default(),
            balanced_weight: default_balanced_weight(),
            discard_top_bottom: default_discard_top_bottom(),
            sleep_between_runs_ms: None,
            pre_processor: None,
            post_processor: None,
            only_cold_starts: false,
            disable_payload_logs: false,
            allowed_exceptions: Vec::new(),
            include_output_results: false,
            auto_optimize: false,
            auto_optimize_alias: None,
        }
    }

    /// Balanced weight clamped to `[0, 1]`.
    pub fn clamped_balanced_weight(&self) -> f64 {
        if self.balanced_weight.is_nan() {
            return default_balanced_weight();
        }
        self.balanced_weight.clamp(0.0, 1.0)
    }

    /// Validate the request.
    pub fn validate(&self) -> crate::Result<()> {
        if self.function.trim().is_empty() {
            return Err(crate::Error::invalid_input("function identifier is required"));
        }

        if self.num == 0 {
            return Err(crate::Error::invalid_input(
                "num must be a positive number of invocations",
            ));
        }

        if self.power_values.is_empty() {
            return Err(crate::Error::invalid_input(
                "at least one power value is required",
            ));
        }

        let mut seen = HashSet::new();
        for &power in &self.power_values {
            if !(MIN_POWER_MB..=MAX_POWER_MB).contains(&power) {
                return Err(crate::Error::invalid_input(format!(
                    "power value {} is outside {}..={} MB",
                    power, MIN_POWER_MB, MAX_POWER_MB
                )));
            }
            if !seen.insert(power) {
                return Err(crate::Error::invalid_input(format!(
                    "duplicate power value {}",
                    power
                )));
            }
        }

        if !(0.0..=MAX_DISCARD_FRACTION).contains(&self.discard_top_bottom) {
            return Err(crate::Error::invalid_input(format!(
                "discard_top_bottom must be within 0..={}, got {}",
                MAX_DISCARD_FRACTION, self.discard_top_bottom
            )));
        }

        if let PayloadSource::External { uri } = &self.payload {
            if uri.trim().is_empty() {
                return Err(crate::Error::invalid_input(
                    "external payload location must not be empty",
                ));
            }
        }

        for (role, processor) in [
            ("pre_processor", &self.pre_processor),
            ("post_processor", &self.post_processor),
        ] {
            if processor.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(crate::Error::invalid_input(format!(
                    "{} must not be empty when set",
                    role
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let request = TuningRequest::new("arn:fn:target", 10);
        assert!(request.validate().is_ok());
        assert_eq!(request.power_values, DEFAULT_POWER_VALUES.to_vec());
        assert_eq!(request.strategy, OptimizationStrategy::Cost);
    }

    #[test]
    fn test_requires_function() {
        let request = TuningRequest::new("  ", 10);
        assert!(matches!(
            request.validate(),
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_zero_num() {
        assert!(TuningRequest::new("f", 0).validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_power() {
        let mut request = TuningRequest::new("f", 5);
        request.power_values = vec![64];
        assert!(request.validate().is_err());

        request.power_values = vec![128, 20_000];
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_power() {
        let mut request = TuningRequest::new("f", 5);
        request.power_values = vec![256, 512, 256];
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_rejects_discard_over_limit() {
        let mut request = TuningRequest::new("f", 5);
        request.discard_top_bottom = 0.5;
        assert!(request.validate().is_err());
        request.discard_top_bottom = 0.4;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_external_uri() {
        let mut request = TuningRequest::new("f", 5);
        request.payload = PayloadSource::External { uri: String::new() };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_balanced_weight_clamped() {
        let mut request = TuningRequest::new("f", 5);
        request.balanced_weight = 3.0;
        assert_eq!(request.clamped_balanced_weight(), 1.0);
        request.balanced_weight = -1.0;
        assert_eq!(request.clamped_balanced_weight(), 0.0);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let request: TuningRequest = serde_json::from_value(serde_json::json!({
            "function": "arn:fn:target",
            "num": 20,
            "payload": {"source": "external", "uri": "store://bucket/key.json"},
            "strategy": "balanced"
        }))
        .unwrap();

        assert_eq!(request.num, 20);
        assert_eq!(request.strategy, OptimizationStrategy::Balanced);
        assert_eq!(request.balanced_weight, 0.5);
        assert_eq!(request.discard_top_bottom, 0.2);
        assert!(matches!(request.payload, PayloadSource::External { .. }));
        assert!(request.validate().is_ok());
    }
}
