// Copyright 2025 Power Tuning Contributors
// SPDX-License-Identifier: Apache-2.0

//! Alias and revision lifecycle.
//!
//! Before measuring, every candidate memory size is captured as an
//! immutable revision behind an alias (`RAM{power}`, or `RAM{power}-{i}`
//! per invocation when cold starts are forced). The target's mutable
//! configuration is restored once every revision is captured. After
//! measuring, the aliases are deleted.
//!
//! # Concurrency
//!
//! Configuration mutations of one target are serialized through a
//! per-target lock; alias creation and deletion for different candidates
//! proceed concurrently.
//!
//! # Idempotency
//!
//! "Already exists" on alias creation and "not found" on alias read or
//! delete are expected and logged. Every other failure is fatal.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use power_tuning_core::Architecture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Environment variable written to force a distinct revision per replica.
pub const COLD_START_MARKER_ENV: &str = "POWER_TUNING_FORCE_COLD_START";

/// Alias for a candidate memory size.
pub fn alias_for(power: u32) -> String {
    format!("RAM{}", power)
}

/// Alias for one cold-start replica of a candidate.
pub fn replica_alias(power: u32, index: usize) -> String {
    format!("{}-{}", alias_for(power), index)
}

/// Errors reported by the mutation collaborator.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
    /// The addressed resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource to create already exists.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Any other failure.
    #[error("Mutation failed: {0}")]
    Other(String),
}

/// Errors that can occur during lifecycle management.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A mutation call failed with a non-benign error.
    #[error("Lifecycle operation {operation} failed for {function}: {source}")]
    Mutation {
        /// Operation being performed
        operation: &'static str,
        /// Target function
        function: String,
        /// Underlying error
        source: MutationError,
    },
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

fn failed(operation: &'static str, function: &str) -> impl FnOnce(MutationError) -> LifecycleError {
    let function = function.to_string();
    move |source| LifecycleError::Mutation {
        operation,
        function,
        source,
    }
}

/// Mutable configuration of the target function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Memory size in MB
    pub memory_mb: u32,
    /// Instruction set architecture
    pub architecture: Architecture,
    /// Environment variables
    pub environment: HashMap<String, String>,
}

/// Configuration-mutation collaborator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MutationApi: Send + Sync {
    /// Read the mutable configuration.
    async fn read_config(&self, function: &str) -> std::result::Result<FunctionConfig, MutationError>;

    /// Replace memory size and environment of the mutable configuration.
    async fn update_config(
        &self,
        function: &str,
        memory_mb: u32,
        environment: HashMap<String, String>,
    ) -> std::result::Result<(), MutationError>;

    /// Wait until the last configuration update is applied.
    async fn wait_config_applied(&self, function: &str) -> std::result::Result<(), MutationError>;

    /// Publish the current configuration as an immutable revision.
    async fn publish_version(&self, function: &str) -> std::result::Result<String, MutationError>;

    /// Read the revision an alias points to.
    async fn read_alias(&self, function: &str, alias: &str)
        -> std::result::Result<String, MutationError>;

    /// Create an alias.
    async fn create_alias(
        &self,
        function: &str,
        alias: &str,
        version: &str,
    ) -> std::result::Result<(), MutationError>;

    /// Point an existing alias at another revision.
    async fn update_alias(
        &self,
        function: &str,
        alias: &str,
        version: &str,
    ) -> std::result::Result<(), MutationError>;

    /// Delete an alias.
    async fn delete_alias(&self, function: &str, alias: &str) -> std::result::Result<(), MutationError>;

    /// Wait until an alias is ready to serve invocations.
    async fn wait_alias_active(&self, function: &str, alias: &str)
        -> std::result::Result<(), MutationError>;
}

/// One alias to capture during setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAlias {
    /// Memory size in MB
    pub power: u32,
    /// Alias name
    pub alias: String,
    /// Whether the revision must be unique to force a cold start
    pub cold_start: bool,
}

/// Aliases needed for a set of candidates.
pub fn plan_aliases(power_values: &[u32], num: u32, only_cold_starts: bool) -> Vec<CandidateAlias> {
    power_values
        .iter()
        .flat_map(|&power| {
            if only_cold_starts {
                (0..num as usize)
                    .map(|i| CandidateAlias {
                        power,
                        alias: replica_alias(power, i),
                        cold_start: true,
                    })
                    .collect::<Vec<_>>()
            } else {
                vec![CandidateAlias {
                    power,
                    alias: alias_for(power),
                    cold_start: false,
                }]
            }
        })
        .collect()
}

/// Outcome of [`Lifecycle::setup`].
#[derive(Debug, Clone, PartialEq)]
pub struct SetupOutcome {
    /// Configuration read before any mutation
    pub original: FunctionConfig,
    /// Aliases created or updated
    pub aliases: Vec<String>,
}

/// Idempotent alias and revision management.
pub struct Lifecycle {
    api: Arc<dyn MutationApi>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Lifecycle {
    /// Create a lifecycle manager over a mutation collaborator.
    pub fn new(api: Arc<dyn MutationApi>) -> Self {
        Self {
            api,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, function: &str) -> Arc<Mutex<()>> {
        self.locks.entry(function.to_string()).or_default().clone()
    }

    /// Read the current mutable configuration.
    pub async fn read_config(&self, function: &str) -> Result<FunctionConfig> {
        self.api
            .read_config(function)
            .await
            .map_err(failed("read_config", function))
    }

    /// Capture every planned alias, then restore the original configuration.
    pub async fn setup(&self, function: &str, plan: &[CandidateAlias]) -> Result<SetupOutcome> {
        let original = self.read_config(function).await?;
        info!(function, aliases = plan.len(), "setting up candidate aliases");

        let results = join_all(
            plan.iter()
                .map(|candidate| self.setup_candidate(function, candidate, &original)),
        )
        .await;

        // restore even when a candidate failed
        let restored = self
            .mutate_config(function, original.memory_mb, original.environment.clone())
            .await;

        let aliases = results.into_iter().collect::<Result<Vec<_>>>()?;
        restored?;
        debug!(function, memory_mb = original.memory_mb, "original configuration restored");

        Ok(SetupOutcome { original, aliases })
    }

    async fn setup_candidate(
        &self,
        function: &str,
        candidate: &CandidateAlias,
        original: &FunctionConfig,
    ) -> Result<String> {
        let mut environment = original.environment.clone();
        if candidate.cold_start {
            environment.insert(COLD_START_MARKER_ENV.to_string(), Uuid::new_v4().to_string());
        }

        let version = {
            let lock = self.lock_for(function);
            let _guard = lock.lock().await;
            self.api
                .update_config(function, candidate.power, environment)
                .await
                .map_err(failed("update_config", function))?;
            self.api
                .wait_config_applied(function)
                .await
                .map_err(failed("wait_config_applied", function))?;
            self.api
                .publish_version(function)
                .await
                .map_err(failed("publish_version", function))?
        };

        self.upsert_alias(function, &candidate.alias, &version).await?;
        self.api
            .wait_alias_active(function, &candidate.alias)
            .await
            .map_err(failed("wait_alias_active", function))?;

        debug!(function, alias = %candidate.alias, version = %version, "alias ready");
        Ok(candidate.alias.clone())
    }

    async fn mutate_config(
        &self,
        function: &str,
        memory_mb: u32,
        environment: HashMap<String, String>,
    ) -> Result<()> {
        let lock = self.lock_for(function);
        let _guard = lock.lock().await;
        self.api
            .update_config(function, memory_mb, environment)
            .await
            .map_err(failed("update_config", function))?;
        self.api
            .wait_config_applied(function)
            .await
            .map_err(failed("wait_config_applied", function))
    }

    async fn upsert_alias(&self, function: &str, alias: &str, version: &str) -> Result<()> {
        match self.api.read_alias(function, alias).await {
            Ok(_) => {
                return self
                    .api
                    .update_alias(function, alias, version)
                    .await
                    .map_err(failed("update_alias", function));
            }
            Err(MutationError::NotFound(_)) => {
                info!(function, alias, "alias not found, creating it");
            }
            Err(e) => return Err(failed("read_alias", function)(e)),
        }

        match self.api.create_alias(function, alias, version).await {
            Ok(()) => Ok(()),
            Err(MutationError::AlreadyExists(_)) => {
                warn!(function, alias, "alias already exists, updating it");
                self.api
                    .update_alias(function, alias, version)
                    .await
                    .map_err(failed("update_alias", function))
            }
            Err(e) => Err(failed("create_alias", function)(e)),
        }
    }

    /// Delete aliases concurrently; missing aliases are skipped.
    pub async fn teardown(&self, function: &str, aliases: &[String]) -> Result<()> {
        info!(function, aliases = aliases.len(), "deleting candidate aliases");

        let results = join_all(aliases.iter().map(|alias| async move {
            match self.api.delete_alias(function, alias).await {
                Ok(()) => Ok(()),
                Err(MutationError::NotFound(_)) => {
                    warn!(function, alias = %alias, "alias already gone");
                    Ok(())
                }
                Err(e) => Err(failed("delete_alias", function)(e)),
            }
        }))
        .await;

        results.into_iter().collect()
    }

    /// Set the winning memory size; optionally publish it behind `alias`.
    ///
    /// Returns the published revision when an alias was requested.
    pub async fn apply(
        &self,
        function: &str,
        power: u32,
        alias: Option<&str>,
    ) -> Result<Option<String>> {
        let current = self.read_config(function).await?;
        info!(function, power, alias = ?alias, "applying optimal configuration");

        let version = {
            let lock = self.lock_for(function);
            let _guard = lock.lock().await;
            self.api
                .update_config(function, power, current.environment)
                .await
                .map_err(failed("update_config", function))?;
            self.api
                .wait_config_applied(function)
                .await
                .map_err(failed("wait_config_applied", function))?;

            match alias {
                Some(_) => Some(
                    self.api
                        .publish_version(function)
                        .await
                        .map_err(failed("publish_version", function))?,
                ),
                None => None,
            }
        };

        if let (Some(alias), Some(version)) = (alias, version.as_deref()) {
            self.upsert_alias(function, alias, version).await?;
        }

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// In-memory mutation API that tracks concurrent configuration mutations.
    #[derive(Default)]
    struct FakeApi {
        config: StdMutex<FunctionConfig>,
        aliases: StdMutex<HashMap<String, String>>,
        published: StdMutex<Vec<FunctionConfig>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeApi {
        fn with_config(config: FunctionConfig) -> Arc<Self> {
            let api = Self::default();
            *api.config.lock().unwrap() = config;
            Arc::new(api)
        }
    }

    #[async_trait]
    impl MutationApi for FakeApi {
        async fn read_config(&self, _: &str) -> std::result::Result<FunctionConfig, MutationError> {
            Ok(self.config.lock().unwrap().clone())
        }

        async fn update_config(
            &self,
            _: &str,
            memory_mb: u32,
            environment: HashMap<String, String>,
        ) -> std::result::Result<(), MutationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let mut config = self.config.lock().unwrap();
            config.memory_mb = memory_mb;
            config.environment = environment;
            Ok(())
        }

        async fn wait_config_applied(&self, _: &str) -> std::result::Result<(), MutationError> {
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn publish_version(&self, _: &str) -> std::result::Result<String, MutationError> {
            let mut published = self.published.lock().unwrap();
            published.push(self.config.lock().unwrap().clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(published.len().to_string())
        }

        async fn read_alias(&self, _: &str, alias: &str) -> std::result::Result<String, MutationError> {
            self.aliases
                .lock()
                .unwrap()
                .get(alias)
                .cloned()
                .ok_or_else(|| MutationError::NotFound(alias.to_string()))
        }

        async fn create_alias(
            &self,
            _: &str,
            alias: &str,
            version: &str,
        ) -> std::result::Result<(), MutationError> {
            let mut aliases = self.aliases.lock().unwrap();
            if aliases.contains_key(alias) {
                return Err(MutationError::AlreadyExists(alias.to_string()));
            }
            aliases.insert(alias.to_string(), version.to_string());
            Ok(())
        }

        async fn update_alias(
            &self,
            _: &str,
            alias: &str,
            version: &str,
        ) -> std::result::Result<(), MutationError> {
            self.aliases
                .lock()
                .unwrap()
                .insert(alias.to_string(), version.to_string());
            Ok(())
        }

        async fn delete_alias(&self, _: &str, alias: &str) -> std::result::Result<(), MutationError> {
            self.aliases
                .lock()
                .unwrap()
                .remove(alias)
                .map(|_| ())
                .ok_or_else(|| MutationError::NotFound(alias.to_string()))
        }

        async fn wait_alias_active(&self, _: &str, _: &str) -> std::result::Result<(), MutationError> {
            Ok(())
        }
    }

    fn original() -> FunctionConfig {
        FunctionConfig {
            memory_mb: 1024,
            architecture: Architecture::Arm64,
            environment: HashMap::from([("STAGE".to_string(), "prod".to_string())]),
        }
    }

    #[test]
    fn test_alias_names() {
        assert_eq!(alias_for(512), "RAM512");
        assert_eq!(replica_alias(512, 3), "RAM512-3");
    }

    #[test]
    fn test_plan_aliases() {
        let plan = plan_aliases(&[128, 256], 3, false);
        let names: Vec<_> = plan.iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(names, vec!["RAM128", "RAM256"]);

        let plan = plan_aliases(&[128, 256], 2, true);
        let names: Vec<_> = plan.iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(names, vec!["RAM128-0", "RAM128-1", "RAM256-0", "RAM256-1"]);
        assert!(plan.iter().all(|c| c.cold_start));
    }

    #[tokio::test]
    async fn test_setup_creates_aliases_and_restores_config() {
        let api = FakeApi::with_config(original());
        let lifecycle = Lifecycle::new(api.clone());
        let plan = plan_aliases(&[128, 256, 512], 5, false);

        let outcome = lifecycle.setup("fn", &plan).await.unwrap();

        assert_eq!(outcome.original, original());
        assert_eq!(outcome.aliases, vec!["RAM128", "RAM256", "RAM512"]);
        assert_eq!(*api.config.lock().unwrap(), original());
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);

        let aliases = api.aliases.lock().unwrap();
        let published = api.published.lock().unwrap();
        for (power, alias) in [(128, "RAM128"), (256, "RAM256"), (512, "RAM512")] {
            let version: usize = aliases[alias].parse().unwrap();
            assert_eq!(published[version - 1].memory_mb, power);
            assert_eq!(published[version - 1].environment["STAGE"], "prod");
        }
    }

    #[tokio::test]
    async fn test_setup_cold_start_replicas_get_unique_markers() {
        let api = FakeApi::with_config(original());
        let lifecycle = Lifecycle::new(api.clone());
        let plan = plan_aliases(&[128], 3, true);

        lifecycle.setup("fn", &plan).await.unwrap();

        let published = api.published.lock().unwrap();
        let markers: std::collections::HashSet<_> = published
            .iter()
            .map(|c| c.environment[COLD_START_MARKER_ENV].clone())
            .collect();
        assert_eq!(markers.len(), 3);
        assert!(!api.config.lock().unwrap().environment.contains_key(COLD_START_MARKER_ENV));
    }

    #[tokio::test]
    async fn test_setup_updates_existing_alias() {
        let api = FakeApi::with_config(original());
        api.aliases
            .lock()
            .unwrap()
            .insert("RAM128".to_string(), "old".to_string());
        let lifecycle = Lifecycle::new(api.clone());

        lifecycle
            .setup("fn", &plan_aliases(&[128], 1, false))
            .await
            .unwrap();

        assert_eq!(api.aliases.lock().unwrap()["RAM128"], "1");
    }

    #[tokio::test]
    async fn test_teardown_ignores_missing_aliases() {
        let api = FakeApi::with_config(original());
        api.aliases
            .lock()
            .unwrap()
            .insert("RAM128".to_string(), "1".to_string());
        let lifecycle = Lifecycle::new(api.clone());

        lifecycle
            .teardown("fn", &["RAM128".to_string(), "RAM256".to_string()])
            .await
            .unwrap();

        assert!(api.aliases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_other_errors_are_fatal() {
        let mut api = MockMutationApi::new();
        api.expect_delete_alias()
            .returning(|_, _| Err(MutationError::Other("throttled".into())));
        let lifecycle = Lifecycle::new(Arc::new(api));

        let err = lifecycle
            .teardown("fn", &["RAM128".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("delete_alias"));
        assert!(err.to_string().contains("throttled"));
    }

    #[tokio::test]
    async fn test_create_already_exists_is_benign() {
        let mut api = MockMutationApi::new();
        api.expect_read_config().returning(|_| Ok(original()));
        api.expect_update_config().returning(|_, _, _| Ok(()));
        api.expect_wait_config_applied().returning(|_| Ok(()));
        api.expect_publish_version().returning(|_| Ok("7".into()));
        api.expect_read_alias()
            .returning(|_, alias| Err(MutationError::NotFound(alias.to_string())));
        api.expect_create_alias()
            .times(1)
            .returning(|_, alias, _| Err(MutationError::AlreadyExists(alias.to_string())));
        api.expect_update_alias()
            .withf(|_, alias, version| alias == "RAM128" && version == "7")
            .times(1)
            .returning(|_, _, _| Ok(()));
        api.expect_wait_alias_active().returning(|_, _| Ok(()));
        let lifecycle = Lifecycle::new(Arc::new(api));

        let outcome = lifecycle
            .setup("fn", &plan_aliases(&[128], 1, false))
            .await
            .unwrap();
        assert_eq!(outcome.aliases, vec!["RAM128"]);
    }

    #[tokio::test]
    async fn test_setup_failure_still_restores_config() {
        let mut api = MockMutationApi::new();
        api.expect_read_config().returning(|_| Ok(original()));
        api.expect_update_config()
            .withf(|_, memory, _| *memory == 1024)
            .times(1)
            .returning(|_, _, _| Ok(()));
        api.expect_update_config()
            .withf(|_, memory, _| *memory == 128)
            .returning(|_, _, _| Err(MutationError::Other("quota".into())));
        api.expect_wait_config_applied().returning(|_| Ok(()));
        let lifecycle = Lifecycle::new(Arc::new(api));

        let err = lifecycle
            .setup("fn", &plan_aliases(&[128], 1, false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn test_apply_publishes_behind_alias() {
        let api = FakeApi::with_config(original());
        let lifecycle = Lifecycle::new(api.clone());

        let version = lifecycle.apply("fn", 512, Some("optimized")).await.unwrap();

        assert_eq!(version.as_deref(), Some("1"));
        assert_eq!(api.config.lock().unwrap().memory_mb, 512);
        assert_eq!(api.aliases.lock().unwrap()["optimized"], "1");
    }

    #[tokio::test]
    async fn test_apply_without_alias_only_updates_memory() {
        let api = FakeApi::with_config(original());
        let lifecycle = Lifecycle::new(api.clone());

        let version = lifecycle.apply("fn", 256, None).await.unwrap();

        assert_eq!(version, None);
        assert_eq!(api.config.lock().unwrap().memory_mb, 256);
        assert!(api.published.lock().unwrap().is_empty());
    }
}
