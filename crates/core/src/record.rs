// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw execution records returned by the remote invoke collaborator.
//!
//! An [`ExecutionRecord`] is the unprocessed result of invoking the target
//! function once: the status indicator, the opaque response payload, the log
//! tail and, when the function itself failed, the error marker. Records are
//! consumed once by the duration extractor and are not retained afterwards.
//!
//! # Invariants
//!
//! ```text
//! function_error = Some(_)  =>  the remote execution raised or returned an error
//! function_error = None     =>  the execution completed, regardless of payload
//! ```
//!
//! Transport failures never produce a record; they are reported by the
//! invoke collaborator as errors.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Key carrying the declared error type inside a function error payload.
pub const ERROR_TYPE_FIELD: &str = "errorType";

/// Key carrying the human-readable message inside a function error payload.
pub const ERROR_MESSAGE_FIELD: &str = "errorMessage";

/// One raw result of invoking the target function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Status indicator reported by the invoke API.
    pub status_code: u16,
    /// Response payload returned by the function, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Decoded log tail (text or structured JSON lines).
    #[serde(default)]
    pub log: String,
    /// Function-level error marker (for example `Unhandled`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_error: Option<String>,
    /// Revision that served the invocation, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_version: Option<String>,
}

impl ExecutionRecord {
    /// Create a new builder.
    pub fn builder() -> ExecutionRecordBuilder {
        ExecutionRecordBuilder::default()
    }

    /// Whether the remote execution signalled a function-level error.
    pub fn is_function_error(&self) -> bool {
        self.function_error.is_some()
    }

    /// Declared error type from the error payload.
    ///
    /// Falls back to the error marker itself when the payload is missing or
    /// carries no `errorType` field.
    pub fn error_type(&self) -> Option<String> {
        let marker = self.function_error.as_ref()?;
        let declared = self
            .payload
            .as_deref()
            .and_then(|p| serde_json::from_str::<serde_json::Value>(p).ok())
            .and_then(|v| {
                v.get(ERROR_TYPE_FIELD)
                    .and_then(|t| t.as_str())
                    .map(String::from)
            });
        Some(declared.unwrap_or_else(|| marker.clone()))
    }

    /// Human-readable error message from the error payload, if present.
    pub fn error_message(&self) -> Option<String> {
        self.function_error.as_ref()?;
        self.payload
            .as_deref()
            .and_then(|p| serde_json::from_str::<serde_json::Value>(p).ok())
            .and_then(|v| {
                v.get(ERROR_MESSAGE_FIELD)
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
    }
}

/// Decode a base64-encoded log tail into text.
pub fn decode_log(encoded: &str) -> crate::Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| crate::Error::invalid_input(format!("log tail is not valid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| crate::Error::invalid_input(format!("log tail is not valid UTF-8: {}", e)))
}

/// Builder for [`ExecutionRecord`] instances.
#[derive(Default)]
pub struct ExecutionRecordBuilder {
    status_code: Option<u16>,
    payload: Option<String>,
    log: Option<String>,
    encoded_log: Option<String>,
    function_error: Option<String>,
    executed_version: Option<String>,
}

impl ExecutionRecordBuilder {
    /// Set the status indicator. Defaults to 200.
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Set the response payload.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Set the already-decoded log tail.
    pub fn log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    /// Set the base64-encoded log tail; it is decoded in [`build`](Self::build).
    pub fn encoded_log(mut self, encoded: impl Into<String>) -> Self {
        self.encoded_log = Some(encoded.into());
        self
    }

    /// Mark the record as a function-level error.
    pub fn function_error(mut self, marker: impl Into<String>) -> Self {
        self.function_error = Some(marker.into());
        self
    }

    /// Set the revision that served the invocation.
    pub fn executed_version(mut self, version: impl Into<String>) -> Self {
        self.executed_version = Some(version.into());
        self
    }

    /// Build the record.
    pub fn build(self) -> crate::Result<ExecutionRecord> {
        let status_code = self.status_code.unwrap_or(200);
        if !(100..=599).contains(&status_code) {
            return Err(crate::Error::invalid_input(format!(
                "status code {} is outside 100..=599",
                status_code
            )));
        }

        if self.log.is_some() && self.encoded_log.is_some() {
            return Err(crate::Error::invalid_input(
                "log and encoded_log are mutually exclusive",
            ));
        }

        let log = match self.encoded_log {
            Some(encoded) => decode_log(&encoded)?,
            None => self.log.unwrap_or_default(),
        };

        Ok(ExecutionRecord {
            status_code,
            payload: self.payload,
            log,
            function_error: self.function_error,
            executed_version: self.executed_version,
        })
    }
}
