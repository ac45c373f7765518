// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Candidate executor.
//!
//! Measures one memory-size candidate: runs its invocation batch through
//! the [`Orchestrator`] and reduces the records to [`CandidateStats`].

use crate::cost::CostModel;
use crate::lifecycle::alias_for;
use crate::orchestrator::{InvocationError, InvocationOptions, InvocationTarget, Orchestrator};
use crate::stats::{aggregate, AggregateError};
use power_tuning_core::{Architecture, CandidateStats, EngineConfig, TuningRequest};
use thiserror::Error;
use tracing::{info, Instrument};

/// Errors that can occur while measuring a candidate.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The invocation batch failed.
    #[error("Candidate {power} MB: {source}")]
    Invocation {
        /// Candidate memory size
        power: u32,
        /// Underlying error
        source: InvocationError,
    },

    /// The records could not be aggregated.
    #[error("Candidate {power} MB: {source}")]
    Aggregate {
        /// Candidate memory size
        power: u32,
        /// Underlying error
        source: AggregateError,
    },
}

impl ExecutorError {
    /// Memory size of the failing candidate.
    pub fn power(&self) -> u32 {
        match self {
            ExecutorError::Invocation { power, .. } | ExecutorError::Aggregate { power, .. } => {
                *power
            }
        }
    }
}

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Measures candidates against explicit price configuration.
#[derive(Clone)]
pub struct Executor {
    orchestrator: Orchestrator,
    config: EngineConfig,
}

impl Executor {
    /// Create an executor.
    pub fn new(orchestrator: Orchestrator, config: EngineConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Invocation target for a candidate.
    pub fn target_for(request: &TuningRequest, power: u32) -> InvocationTarget {
        if request.only_cold_starts {
            InvocationTarget::cold_start_series(&request.function, alias_for(power))
        } else {
            InvocationTarget::alias(&request.function, alias_for(power))
        }
    }

    /// Run one candidate's batch and aggregate it.
    pub async fn execute_candidate(
        &self,
        request: &TuningRequest,
        power: u32,
        architecture: Architecture,
    ) -> Result<CandidateStats> {
        let span = tracing::info_span!("candidate", power, architecture = %architecture);
        self.measure(request, power, architecture)
            .instrument(span)
            .await
    }

    async fn measure(
        &self,
        request: &TuningRequest,
        power: u32,
        architecture: Architecture,
    ) -> Result<CandidateStats> {
        let target = Self::target_for(request, power);
        let options = InvocationOptions::from_request(request);

        let records = self
            .orchestrator
            .run(&target, request.num as usize, &request.payload, &options)
            .await
            .map_err(|source| ExecutorError::Invocation { power, source })?;

        let model = CostModel::from_config(&self.config, architecture);
        let stats = aggregate(power, &records, request.discard_top_bottom, &model)
            .map_err(|source| ExecutorError::Aggregate { power, source })?;

        info!(
            average_duration = stats.average_duration,
            average_price = stats.average_price,
            "candidate measured"
        );
        Ok(stats)
    }
}
