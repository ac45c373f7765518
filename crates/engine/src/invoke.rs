// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boundary traits for the remote invoke and object-fetch collaborators.
//!
//! The engine never talks to a concrete cloud API. Callers plug in an
//! [`Invoker`] that executes the target function once and an
//! [`ObjectFetcher`] that loads externally stored payloads.

use async_trait::async_trait;
use power_tuning_core::ExecutionRecord;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// The remote call itself did not complete.
#[derive(Debug, Clone, Error)]
#[error("Transport error invoking {target}: {message}")]
pub struct TransportError {
    /// Function that was being invoked
    pub target: String,
    /// Underlying failure
    pub message: String,
}

impl TransportError {
    /// Create a transport error for `target`.
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Errors returned when fetching an externally stored payload.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The object does not exist.
    #[error("Payload object not found: {0}")]
    NotFound(String),

    /// The caller may not read the object.
    #[error("Permission denied reading payload object: {0}")]
    PermissionDenied(String),

    /// Any other failure.
    #[error("Failed to fetch payload object: {0}")]
    Other(String),
}

/// Executes the target function once.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke `function`, optionally pinned to `qualifier`, with a serialized payload.
    ///
    /// Function-level failures are reported inside the returned record;
    /// only transport failures are errors.
    async fn invoke(
        &self,
        function: &str,
        qualifier: Option<&str>,
        payload: &str,
    ) -> Result<ExecutionRecord, TransportError>;
}

/// Loads payloads stored outside the request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Fetch the raw text stored at `uri`.
    async fn fetch(&self, uri: &str) -> Result<String, FetchError>;
}
