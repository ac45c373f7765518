// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.

use crate::duration::DurationError;
use crate::executor::ExecutorError;
use crate::lifecycle::LifecycleError;
use crate::orchestrator::InvocationError;
use crate::payload::PayloadError;
use crate::selector::SelectorError;
use crate::stats::AggregateError;
use thiserror::Error;

/// Errors that can occur during a tuning run.
///
/// [`Tuner`](crate::Tuner) surfaces the request, executor, selector and
/// lifecycle variants. The remaining variants let callers that drive the
/// [`duration`](crate::duration), [`payload`](crate::payload),
/// [`orchestrator`](crate::orchestrator) and [`stats`](crate::stats)
/// components directly use `?` into [`EngineResult`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] power_tuning_core::Error),

    /// A log could not be parsed.
    #[error("Duration extraction error: {0}")]
    Duration(#[from] DurationError),

    /// The payload could not be distributed.
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// An invocation batch failed.
    #[error("{0}")]
    Invocation(#[from] InvocationError),

    /// A batch could not be aggregated.
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    /// A candidate could not be measured.
    #[error("{0}")]
    Executor(#[from] ExecutorError),

    /// No winner could be selected.
    #[error("Selection error: {0}")]
    Selector(#[from] SelectorError),

    /// Alias or revision management failed.
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
