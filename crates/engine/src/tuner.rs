// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tuning run.
//!
//! [`Tuner::run`] chains the engine components:
//!
//! ```text
//! validate -> read architecture -> setup aliases -> measure candidates
//!          -> select winner -> teardown aliases -> apply (optional)
//! ```
//!
//! Teardown is attempted whenever setup was attempted, whether or not the
//! measurement succeeded.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::prelude::*;
//!
//! let tuner = Tuner::new(EngineConfig::load(None)?, invoker, mutation_api);
//! let result = tuner.run(&TuningRequest::new("my-function", 20)).await?;
//! println!("best memory size: {} MB", result.winner.power);
//! ```

use crate::error::{EngineError, EngineResult};
use crate::executor::Executor;
use crate::invoke::{Invoker, ObjectFetcher};
use crate::lifecycle::{plan_aliases, Lifecycle, MutationApi};
use crate::orchestrator::Orchestrator;
use crate::selector::{optimize, SelectionParams};
use futures::future::join_all;
use power_tuning_core::{Architecture, CandidateStats, EngineConfig, OptimizationResult, TuningRequest};
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Runs complete tuning sessions.
pub struct Tuner {
    config: EngineConfig,
    lifecycle: Lifecycle,
    executor: Executor,
}

impl Tuner {
    /// Create a tuner over the invoke and mutation collaborators.
    pub fn new(config: EngineConfig, invoker: Arc<dyn Invoker>, api: Arc<dyn MutationApi>) -> Self {
        let executor = Executor::new(Orchestrator::new(invoker), config.clone());
        Self {
            config,
            lifecycle: Lifecycle::new(api),
            executor,
        }
    }

    /// Create a tuner that can also load externally stored payloads.
    pub fn with_fetcher(
        config: EngineConfig,
        invoker: Arc<dyn Invoker>,
        api: Arc<dyn MutationApi>,
        fetcher: Arc<dyn ObjectFetcher>,
    ) -> Self {
        let orchestrator = Orchestrator::new(invoker).with_fetcher(fetcher);
        Self {
            executor: Executor::new(orchestrator, config.clone()),
            config,
            lifecycle: Lifecycle::new(api),
        }
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a tuning session.
    pub async fn run(&self, request: &TuningRequest) -> EngineResult<OptimizationResult> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "tuning_run",
            run_id = %run_id,
            function = %request.function,
            strategy = %request.strategy
        );

        self.run_validated(request).instrument(span).await
    }

    async fn run_validated(&self, request: &TuningRequest) -> EngineResult<OptimizationResult> {
        let function = request.function.as_str();
        info!(
            candidates = request.power_values.len(),
            num = request.num,
            parallel = request.parallel_invocation,
            only_cold_starts = request.only_cold_starts,
            "starting tuning run"
        );

        let architecture = self.lifecycle.read_config(function).await?.architecture;
        let plan = plan_aliases(&request.power_values, request.num, request.only_cold_starts);
        let aliases: Vec<String> = plan.iter().map(|c| c.alias.clone()).collect();

        let measured = match self.lifecycle.setup(function, &plan).await {
            Ok(_) => self.measure(request, architecture).await,
            Err(e) => Err(e.into()),
        };

        let torn_down = self.lifecycle.teardown(function, &aliases).await;

        let stats = match (measured, torn_down) {
            (Ok(stats), Ok(())) => stats,
            (Ok(_), Err(e)) => return Err(e.into()),
            (Err(e), teardown) => {
                if let Err(te) = teardown {
                    warn!(error = %te, "teardown failed after an earlier error");
                }
                return Err(e);
            }
        };

        let params = SelectionParams {
            strategy: request.strategy,
            balanced_weight: request.clamped_balanced_weight(),
            num: request.num,
            only_cold_starts: request.only_cold_starts,
            step_price: self.config.step_price(),
            include_stats: request.include_output_results,
        };
        let result = optimize(&stats, &params)?;

        if request.auto_optimize {
            self.lifecycle
                .apply(function, result.winner.power, request.auto_optimize_alias.as_deref())
                .await?;
        }

        info!(
            power = result.winner.power,
            total_cost = result.cost.total(),
            "tuning run finished"
        );
        Ok(result)
    }

    async fn measure(
        &self,
        request: &TuningRequest,
        architecture: Architecture,
    ) -> EngineResult<Vec<CandidateStats>> {
        let results = join_all(
            request
                .power_values
                .iter()
                .map(|&power| self.executor.execute_candidate(request, power, architecture)),
        )
        .await;

        results
            .into_iter()
            .map(|r| r.map_err(EngineError::from))
            .collect()
    }
}
