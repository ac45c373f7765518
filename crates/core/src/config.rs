// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.
//!
//! Region and price tables are carried by an explicit [`EngineConfig`] that is
//! threaded through component constructors instead of being read from the
//! process environment at the point of use.
//!
//! # Sources
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`EngineConfig::default`])
//! 2. An optional TOML/JSON/YAML file
//! 3. Environment variables prefixed with `POWER_TUNING_`, nested keys separated
//!    by `__` (for example `POWER_TUNING_PRICE_TABLE__ARM64__DEFAULT=1.5e-9`)
//!
//! A `.env` file in the working directory is loaded first, if present.
//!
//! # Example
//!
//! ```ignore
//! use power_tuning_core::config::EngineConfig;
//!
//! let config = EngineConfig::load(Some(Path::new("tuning.toml")))?;
//! let base = config.base_cost(Architecture::Arm64);
//! ```

use crate::types::Architecture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "POWER_TUNING";

/// Memory size the base unit prices are quoted for.
pub const DEFAULT_REFERENCE_MEMORY_MB: u32 = 128;

/// Default visualization endpoint.
pub const DEFAULT_VISUALIZATION_URL: &str = "https://lambda-power-tuning.show/";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// A price with a declared default and per-region overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalPrice {
    /// Price used for regions without an explicit entry.
    pub default: f64,
    /// Region-specific prices.
    #[serde(default)]
    pub regions: HashMap<String, f64>,
}

impl RegionalPrice {
    /// Create a price with no regional overrides.
    pub fn flat(default: f64) -> Self {
        Self {
            default,
            regions: HashMap::new(),
        }
    }

    /// Add a regional override.
    pub fn with_region(mut self, region: impl Into<String>, price: f64) -> Self {
        self.regions.insert(region.into(), price);
        self
    }

    /// Price for a region, or the default entry when unmapped.
    pub fn for_region(&self, region: &str) -> f64 {
        self.regions.get(region).copied().unwrap_or(self.default)
    }

    fn validate(&self, name: &str) -> crate::Result<()> {
        let bad = std::iter::once(("default", self.default))
            .chain(self.regions.iter().map(|(r, p)| (r.as_str(), *p)))
            .find(|(_, p)| !p.is_finite() || *p < 0.0);
        match bad {
            Some((entry, price)) => Err(crate::Error::config(format!(
                "{}.{} must be a finite non-negative price, got {}",
                name, entry, price
            ))),
            None => Ok(()),
        }
    }
}

/// Base compute cost per millisecond at the reference memory size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    /// Prices for x86_64 functions.
    pub x86_64: RegionalPrice,
    /// Prices for arm64 functions.
    pub arm64: RegionalPrice,
}

impl PriceTable {
    /// Base cost for an architecture in a region.
    pub fn base_cost(&self, architecture: Architecture, region: &str) -> f64 {
        match architecture {
            Architecture::X86_64 => self.x86_64.for_region(region),
            Architecture::Arm64 => self.arm64.for_region(region),
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            x86_64: RegionalPrice::flat(2.1e-9)
                .with_region("ap-east-1", 2.9e-9)
                .with_region("af-south-1", 2.8e-9)
                .with_region("me-south-1", 2.6e-9)
                .with_region("eu-south-1", 2.4e-9)
                .with_region("ap-northeast-3", 2.7e-9),
            arm64: RegionalPrice::flat(1.7e-9)
                .with_region("ap-east-1", 2.3e-9)
                .with_region("af-south-1", 2.2e-9)
                .with_region("me-south-1", 2.1e-9)
                .with_region("eu-south-1", 1.9e-9)
                .with_region("ap-northeast-3", 2.1e-9),
        }
    }
}

/// Explicit configuration for the tuning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Region the target function runs in.
    pub region: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log line format.
    pub log_format: LogFormat,
    /// Memory size (MB) the base prices are quoted for.
    pub reference_memory_mb: u32,
    /// Compute price table.
    pub price_table: PriceTable,
    /// Orchestration price per step.
    pub step_price_table: RegionalPrice,
    /// Base URL for the visualization link.
    pub visualization_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            reference_memory_mb: DEFAULT_REFERENCE_MEMORY_MB,
            price_table: PriceTable::default(),
            step_price_table: RegionalPrice::flat(0.000025)
                .with_region("us-gov-west-1", 0.00003)
                .with_region("us-gov-east-1", 0.00003),
            visualization_url: DEFAULT_VISUALIZATION_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(crate::Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(
            region = %config.region,
            file = ?path,
            "engine configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from defaults and the environment only.
    pub fn from_env() -> crate::Result<Self> {
        Self::load(None)
    }

    /// Override the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Base compute cost for the configured region.
    pub fn base_cost(&self, architecture: Architecture) -> f64 {
        self.price_table.base_cost(architecture, &self.region)
    }

    /// Orchestration step price for the configured region.
    pub fn step_price(&self) -> f64 {
        self.step_price_table.for_region(&self.region)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> crate::Result<()> {
        if self.region.trim().is_empty() {
            return Err(crate::Error::config("region must not be empty"));
        }
        if self.reference_memory_mb == 0 {
            return Err(crate::Error::config("reference_memory_mb must be positive"));
        }
        self.price_table.x86_64.validate("price_table.x86_64")?;
        self.price_table.arm64.validate("price_table.arm64")?;
        self.step_price_table.validate("step_price_table")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "power-tuning-{}-{}.toml",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_prices() {
        let config = EngineConfig::default();
        assert_eq!(config.base_cost(Architecture::X86_64), 2.1e-9);
        assert_eq!(config.base_cost(Architecture::Arm64), 1.7e-9);
        assert_eq!(config.step_price(), 0.000025);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_regional_override_and_default_fallback() {
        let config = EngineConfig::default().with_region("ap-east-1");
        assert_eq!(config.base_cost(Architecture::X86_64), 2.9e-9);

        let config = EngineConfig::default().with_region("xx-nowhere-9");
        assert_eq!(config.base_cost(Architecture::X86_64), 2.1e-9);
        assert_eq!(config.step_price(), 0.000025);

        let config = EngineConfig::default().with_region("us-gov-west-1");
        assert_eq!(config.step_price(), 0.00003);
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut config = EngineConfig::default();
        config.price_table.arm64.regions.insert("eu-west-1".into(), -1.0);
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_reference_memory() {
        let config = EngineConfig {
            reference_memory_mb: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = write_temp_config(
            "override",
            r#"
region = "eu-south-1"
log_format = "json"

[step_price_table]
default = 0.00005
"#,
        );

        let config = EngineConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.region, "eu-south-1");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.step_price(), 0.00005);
        // untouched tables keep their built-in values
        assert_eq!(config.base_cost(Architecture::X86_64), 2.4e-9);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("power-tuning-definitely-missing.toml");
        assert!(EngineConfig::load(Some(&path)).is_err());
    }
}
