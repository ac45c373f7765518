// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Invocation orchestrator.
//!
//! Runs a batch of invocations of the target function and collects the raw
//! execution records.
//!
//! # Features
//!
//! - Serial mode with an optional pause between invocations
//! - Parallel mode that issues every invocation at once
//! - Optional pre-processor and post-processor functions around each call
//! - Allow-listed function error types that do not abort the batch
//! - Externally stored payloads fetched once per batch
//!
//! # Failure handling
//!
//! Transport failures and processor failures always abort the batch. A
//! function-level error aborts the batch unless its declared type is
//! allow-listed. In serial mode no further invocation is issued after a
//! fatal error; in parallel mode every issued call completes first and the
//! error of the lowest-index failing invocation is returned.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_engine::orchestrator::{InvocationOptions, InvocationTarget, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(invoker).with_fetcher(fetcher);
//! let target = InvocationTarget::alias("my-function", "RAM512");
//! let records = orchestrator
//!     .run(&target, 10, &request.payload, &InvocationOptions::from_request(&request))
//!     .await?;
//! ```

use crate::invoke::{FetchError, Invoker, ObjectFetcher, TransportError};
use crate::payload::{classify_payload, generate_payloads, PayloadError};
use futures::future::join_all;
use power_tuning_core::{ExecutionRecord, PayloadSource, TuningRequest};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Whether invocations are awaited one by one or all at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// One at a time, in payload order.
    Series,
    /// All at once.
    Parallel,
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::Series => f.write_str("in series"),
            InvocationMode::Parallel => f.write_str("in parallel"),
        }
    }
}

/// Which side of the main invocation a processor runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorRole {
    /// Transforms the payload before the main invocation.
    Pre,
    /// Receives the main invocation's response.
    Post,
}

impl fmt::Display for ProcessorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorRole::Pre => f.write_str("pre-processor"),
            ProcessorRole::Post => f.write_str("post-processor"),
        }
    }
}

fn payload_suffix(payload: &Option<String>) -> String {
    match payload {
        Some(p) => format!(" with payload {}", p),
        None => String::new(),
    }
}

/// Errors that can occur while running an invocation batch.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The payload could not be distributed.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The externally stored payload could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The remote call for the main target did not complete.
    #[error("Invocation error (running {mode}): {source}{}", payload_suffix(.payload))]
    Transport {
        /// Batch mode
        mode: InvocationMode,
        /// Underlying transport failure
        source: TransportError,
        /// Payload in play, unless redacted
        payload: Option<String>,
    },

    /// The target function signalled an error that is not allow-listed.
    #[error(
        "Invocation error (running {mode}): {error_type}: {message}{}",
        payload_suffix(.payload)
    )]
    Function {
        /// Batch mode
        mode: InvocationMode,
        /// Position of the failing invocation
        index: usize,
        /// Declared error type
        error_type: String,
        /// Error message from the response, if any
        message: String,
        /// Payload in play, unless redacted
        payload: Option<String>,
    },

    /// A pre- or post-processor failed.
    #[error(
        "{role} {processor} failed (running {mode}): {reason}{}",
        payload_suffix(.payload)
    )]
    Processor {
        /// Processor role
        role: ProcessorRole,
        /// Processor function identifier
        processor: String,
        /// Batch mode
        mode: InvocationMode,
        /// What went wrong
        reason: String,
        /// Payload in play, unless redacted
        payload: Option<String>,
    },
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Which function and qualifier each invocation of a batch hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// The function's unqualified revision.
    Unqualified {
        /// Function identifier
        function: String,
    },
    /// One alias for every invocation.
    Alias {
        /// Function identifier
        function: String,
        /// Alias name
        alias: String,
    },
    /// A distinct alias per invocation, `{alias}-{index}`.
    ColdStartSeries {
        /// Function identifier
        function: String,
        /// Alias prefix
        alias: String,
    },
}

impl InvocationTarget {
    /// Target a single alias.
    pub fn alias(function: impl Into<String>, alias: impl Into<String>) -> Self {
        InvocationTarget::Alias {
            function: function.into(),
            alias: alias.into(),
        }
    }

    /// Target one alias per invocation index.
    pub fn cold_start_series(function: impl Into<String>, alias: impl Into<String>) -> Self {
        InvocationTarget::ColdStartSeries {
            function: function.into(),
            alias: alias.into(),
        }
    }

    /// Function identifier.
    pub fn function(&self) -> &str {
        match self {
            InvocationTarget::Unqualified { function }
            | InvocationTarget::Alias { function, .. }
            | InvocationTarget::ColdStartSeries { function, .. } => function,
        }
    }

    /// Qualifier for the invocation at `index`.
    pub fn qualifier(&self, index: usize) -> Option<String> {
        match self {
            InvocationTarget::Unqualified { .. } => None,
            InvocationTarget::Alias { alias, .. } => Some(alias.clone()),
            InvocationTarget::ColdStartSeries { alias, .. } => {
                Some(format!("{}-{}", alias, index))
            }
        }
    }
}

/// Per-batch invocation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOptions {
    /// Issue every invocation concurrently.
    pub parallel: bool,
    /// Pause between serial invocations; ignored in parallel mode.
    pub sleep_between_runs: Option<Duration>,
    /// Function invoked on each payload before the target.
    pub pre_processor: Option<String>,
    /// Function invoked on each target response.
    pub post_processor: Option<String>,
    /// Keep payloads out of errors and logs.
    pub disable_payload_logs: bool,
    /// Function error types that do not abort the batch.
    pub allowed_exceptions: Vec<String>,
}

impl InvocationOptions {
    /// Options carried by a tuning request.
    pub fn from_request(request: &TuningRequest) -> Self {
        Self {
            parallel: request.parallel_invocation,
            sleep_between_runs: request
                .sleep_between_runs_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            pre_processor: request.pre_processor.clone(),
            post_processor: request.post_processor.clone(),
            disable_payload_logs: request.disable_payload_logs,
            allowed_exceptions: request.allowed_exceptions.clone(),
        }
    }

    /// Batch mode implied by these options.
    pub fn mode(&self) -> InvocationMode {
        if self.parallel {
            InvocationMode::Parallel
        } else {
            InvocationMode::Series
        }
    }

    fn loggable(&self, payload: &str) -> Option<String> {
        (!self.disable_payload_logs).then(|| payload.to_string())
    }

    fn is_allowed(&self, error_type: &str) -> bool {
        self.allowed_exceptions.iter().any(|e| e == error_type)
    }
}

/// Runs invocation batches against an [`Invoker`].
#[derive(Clone)]
pub struct Orchestrator {
    invoker: Arc<dyn Invoker>,
    fetcher: Option<Arc<dyn ObjectFetcher>>,
}

impl Orchestrator {
    /// Create an orchestrator without external payload support.
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self {
            invoker,
            fetcher: None,
        }
    }

    /// Attach a fetcher for externally stored payloads.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ObjectFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Resolve the payload source to a value, fetching it if stored externally.
    ///
    /// Fetched text that parses as JSON is used as JSON; anything else is
    /// kept as a raw string.
    pub async fn resolve_payload(&self, source: &PayloadSource) -> Result<Value> {
        match source {
            PayloadSource::Inline { value } => Ok(value.clone()),
            PayloadSource::External { uri } => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                    FetchError::Other(format!("{} (no object fetcher configured)", uri))
                })?;
                let raw = fetcher.fetch(uri).await?;
                debug!(uri = %uri, bytes = raw.len(), "fetched external payload");
                Ok(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
            }
        }
    }

    /// Distribute `count` payloads from `source` and invoke `target` with each.
    pub async fn run(
        &self,
        target: &InvocationTarget,
        count: usize,
        source: &PayloadSource,
        options: &InvocationOptions,
    ) -> Result<Vec<ExecutionRecord>> {
        let value = self.resolve_payload(source).await?;
        let spec = classify_payload(&value)?;
        let payloads = generate_payloads(count, &spec)?;
        self.run_payloads(target, payloads, options).await
    }

    /// Invoke `target` once per payload.
    ///
    /// Records are returned in payload order in both modes.
    pub async fn run_payloads(
        &self,
        target: &InvocationTarget,
        payloads: Vec<String>,
        options: &InvocationOptions,
    ) -> Result<Vec<ExecutionRecord>> {
        let mode = options.mode();
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "invocation_batch",
            batch_id = %batch_id,
            function = %target.function(),
            mode = %mode
        );

        self.run_batch(target, payloads, options)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        target: &InvocationTarget,
        payloads: Vec<String>,
        options: &InvocationOptions,
    ) -> Result<Vec<ExecutionRecord>> {
        info!(count = payloads.len(), "starting invocation batch");

        let records = match options.mode() {
            InvocationMode::Series => self.run_series(target, payloads, options).await?,
            InvocationMode::Parallel => self.run_parallel(target, payloads, options).await?,
        };

        info!(count = records.len(), "invocation batch finished");
        Ok(records)
    }

    async fn run_series(
        &self,
        target: &InvocationTarget,
        payloads: Vec<String>,
        options: &InvocationOptions,
    ) -> Result<Vec<ExecutionRecord>> {
        let mut records = Vec::with_capacity(payloads.len());

        for (index, payload) in payloads.into_iter().enumerate() {
            if index > 0 {
                if let Some(pause) = options.sleep_between_runs {
                    tokio::time::sleep(pause).await;
                }
            }
            let record = self
                .invoke_one(target, index, payload, options, InvocationMode::Series)
                .await?;
            records.push(record);
        }

        Ok(records)
    }

    async fn run_parallel(
        &self,
        target: &InvocationTarget,
        payloads: Vec<String>,
        options: &InvocationOptions,
    ) -> Result<Vec<ExecutionRecord>> {
        let calls = payloads.into_iter().enumerate().map(|(index, payload)| {
            self.invoke_one(target, index, payload, options, InvocationMode::Parallel)
        });

        let results = join_all(calls).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "parallel batch had fatal errors");
        }

        // first error in index order wins
        results.into_iter().collect()
    }

    async fn invoke_one(
        &self,
        target: &InvocationTarget,
        index: usize,
        payload: String,
        options: &InvocationOptions,
        mode: InvocationMode,
    ) -> Result<ExecutionRecord> {
        let payload = match &options.pre_processor {
            Some(processor) => {
                self.pre_process(processor, payload, options, mode)
                    .await?
            }
            None => payload,
        };

        let qualifier = target.qualifier(index);
        if options.disable_payload_logs {
            debug!(index, qualifier = ?qualifier, "invoking target");
        } else {
            debug!(index, qualifier = ?qualifier, payload = %payload, "invoking target");
        }

        let record = self
            .invoker
            .invoke(target.function(), qualifier.as_deref(), &payload)
            .await
            .map_err(|source| InvocationError::Transport {
                mode,
                source,
                payload: options.loggable(&payload),
            })?;

        if let Some(error_type) = record.error_type() {
            if options.is_allowed(&error_type) {
                warn!(index, error_type = %error_type, "allowed function error, continuing");
            } else {
                return Err(InvocationError::Function {
                    mode,
                    index,
                    error_type,
                    message: record.error_message().unwrap_or_default(),
                    payload: options.loggable(&payload),
                });
            }
        }

        if let Some(processor) = &options.post_processor {
            let response = record.payload.as_deref().unwrap_or("null");
            self.call_processor(ProcessorRole::Post, processor, response, options, mode)
                .await?;
        }

        Ok(record)
    }

    async fn pre_process(
        &self,
        processor: &str,
        payload: String,
        options: &InvocationOptions,
        mode: InvocationMode,
    ) -> Result<String> {
        let record = self
            .call_processor(ProcessorRole::Pre, processor, &payload, options, mode)
            .await?;

        match record.payload {
            Some(output) if !output.trim().is_empty() && output.trim() != "null" => Ok(output),
            _ => Ok(payload),
        }
    }

    async fn call_processor(
        &self,
        role: ProcessorRole,
        processor: &str,
        payload: &str,
        options: &InvocationOptions,
        mode: InvocationMode,
    ) -> Result<ExecutionRecord> {
        let processor_error = |reason: String| InvocationError::Processor {
            role,
            processor: processor.to_string(),
            mode,
            reason,
            payload: options.loggable(payload),
        };

        let record = self
            .invoker
            .invoke(processor, None, payload)
            .await
            .map_err(|e| processor_error(e.to_string()))?;

        if let Some(error_type) = record.error_type() {
            let message = record.error_message().unwrap_or_default();
            return Err(processor_error(format!("{}: {}", error_type, message)));
        }

        Ok(record)
    }
}
