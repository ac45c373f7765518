// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data model for power tuning.
//!
//! This crate holds the types shared by the measurement, cost and
//! optimization engine and by the report writers:
//!
//! - [`record`] - raw execution records returned by the invoke collaborator
//! - [`types`] - duration kinds, candidate stats, strategies and results
//! - [`request`] - tuning request and input validation
//! - [`config`] - explicit engine configuration and price tables
//! - [`telemetry`] - logging initialisation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod record;
pub mod request;
pub mod telemetry;
pub mod types;

pub use config::{EngineConfig, LogFormat, PriceTable, RegionalPrice};
pub use error::{Error, Result};
pub use record::ExecutionRecord;
pub use request::{PayloadSource, TuningRequest};
pub use types::{
    Architecture, CandidateStats, DurationKind, OptimizationResult, OptimizationStrategy,
    OrchestrationCost, WeightedPayloadEntry,
};
