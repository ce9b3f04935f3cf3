//! Coordinator configuration.

use crate::context::OperationContext;
use crate::error::Operation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a consistency poll probes the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Minimum time between two probes (ms).
    pub interval_ms: u64,
    /// Consecutive target observations required before the poll settles.
    pub consecutive_target: u32,
}

impl PollConfig {
    /// Minimum time between two probes.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Default poll used after a create.
    #[must_use]
    pub fn visibility() -> Self {
        Self {
            interval_ms: 1_000,
            consecutive_target: 3,
        }
    }

    /// Default poll used after a delete.
    #[must_use]
    pub fn deletion() -> Self {
        Self {
            interval_ms: 1_000,
            consecutive_target: 5,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::visibility()
    }
}

/// Default deadline of each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTimeouts {
    pub create_secs: u64,
    pub read_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

impl OperationTimeouts {
    /// Timeout of `operation`.
    #[must_use]
    pub fn for_operation(&self, operation: Operation) -> Duration {
        Duration::from_secs(match operation {
            Operation::Create => self.create_secs,
            Operation::Read => self.read_secs,
            Operation::Update => self.update_secs,
            Operation::Delete => self.delete_secs,
        })
    }
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create_secs: 300,
            read_secs: 300,
            update_secs: 300,
            delete_secs: 300,
        }
    }
}

/// Configuration of one [`LifecycleCoordinator`](crate::LifecycleCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Resource type name, e.g. `azuread_application_registration`.
    pub resource_type: String,
    /// Poll run after a create.
    pub visibility: PollConfig,
    /// Poll run after a delete.
    pub deletion: PollConfig,
    /// Default operation deadlines.
    pub timeouts: OperationTimeouts,
}

impl CoordinatorConfig {
    /// Default configuration for a resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            visibility: PollConfig::visibility(),
            deletion: PollConfig::deletion(),
            timeouts: OperationTimeouts::default(),
        }
    }

    /// A context bounded by the default timeout of `operation`.
    #[must_use]
    pub fn context(&self, operation: Operation) -> OperationContext {
        OperationContext::with_timeout(self.timeouts.for_operation(operation))
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new("azuread_resource")
    }
}
