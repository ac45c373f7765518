// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crate-level error type shared by the core data model.

use thiserror::Error;

/// Errors raised while building or validating core types.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialised.
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Shorthand for [`Error::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
