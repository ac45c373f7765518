// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging initialisation.

use crate::config::{EngineConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Returns an error if a
/// global subscriber is already installed.
pub fn init_tracing(format: LogFormat, default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Telemetry(format!("invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    installed.map_err(|e| crate::Error::Telemetry(e.to_string()))
}

/// Install a global subscriber from an [`EngineConfig`].
pub fn init_from_config(config: &EngineConfig) -> crate::Result<()> {
    init_tracing(config.log_format, &config.log_level)
}
