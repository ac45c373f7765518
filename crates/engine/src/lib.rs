// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement, cost and optimization engine for memory power tuning.
//!
//! The engine executes a function repeatedly at several candidate memory
//! sizes, measures duration and cost from the execution logs and selects
//! the best configuration under a cost/speed trade-off.
//!
//! # Components
//!
//! - [`duration`] - parses text and structured execution logs
//! - [`stats`] - trimmed-mean aggregation of duration samples
//! - [`cost`] - compute and orchestration pricing
//! - [`payload`] - weighted payload distribution
//! - [`orchestrator`] - serial and parallel invocation batches
//! - [`executor`] - measures one candidate
//! - [`selector`] - strategy-based winner selection
//! - [`lifecycle`] - alias and revision setup, teardown and apply
//! - [`tuner`] - end-to-end tuning run
//!
//! Remote calls go through the [`invoke::Invoker`], [`invoke::ObjectFetcher`]
//! and [`lifecycle::MutationApi`] traits.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::prelude::*;
//!
//! power_tuning_core::telemetry::init_from_config(&config)?;
//! let tuner = Tuner::new(config, invoker, mutation_api);
//! let result = tuner.run(&request).await?;
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cost;
pub mod duration;
pub mod error;
pub mod executor;
pub mod invoke;
pub mod lifecycle;
pub mod orchestrator;
pub mod payload;
pub mod selector;
pub mod stats;
pub mod tuner;

pub use error::{EngineError, EngineResult};
pub use tuner::Tuner;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cost::{compute_price, compute_total_cost, CostModel};
    pub use crate::duration::{extract_duration, extract_durations, DurationError, Durations};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::executor::{Executor, ExecutorError};
    pub use crate::invoke::{FetchError, Invoker, ObjectFetcher, TransportError};
    pub use crate::lifecycle::{
        FunctionConfig, Lifecycle, LifecycleError, MutationApi, MutationError,
    };
    pub use crate::orchestrator::{
        InvocationError, InvocationOptions, InvocationTarget, Orchestrator,
    };
    pub use crate::payload::{classify_payload, generate_payloads, PayloadError, PayloadSpec};
    pub use crate::selector::{optimize, select, SelectionParams, SelectorError};
    pub use crate::stats::{aggregate, compute_trimmed_mean};
    pub use crate::tuner::Tuner;
    pub use power_tuning_core::{
        CandidateStats, EngineConfig, ExecutionRecord, OptimizationResult, OptimizationStrategy,
        PayloadSource, TuningRequest,
    };
}
