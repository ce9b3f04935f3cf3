//! Error types for lifecycle operations.

use azdir_client::ClientError;
use azdir_types::{LockKey, ResourceIdentity};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle operation, used to give errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "creating",
            Self::Read => "retrieving",
            Self::Update => "updating",
            Self::Delete => "deleting",
        })
    }
}

/// Errors surfaced by the lifecycle coordinator.
///
/// "Not found" is not part of this enum: it is recovered locally and reported
/// through [`ReadOutcome::Gone`](crate::ReadOutcome::Gone) and
/// [`DeleteOutcome::AlreadyGone`](crate::DeleteOutcome::AlreadyGone).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The object already exists remotely and should be imported instead.
    #[error("{resource_type} {identity} already exists - to be managed it needs to be imported into state")]
    AlreadyExists {
        resource_type: String,
        identity: ResourceIdentity,
    },

    /// The remote call went through but the change was not observed in time.
    #[error("timed out after {waited:?} waiting for {resource_type} {identity} to {target} while {operation}")]
    ConsistencyTimeout {
        operation: Operation,
        resource_type: String,
        identity: ResourceIdentity,
        target: &'static str,
        waited: Duration,
    },

    /// Any other remote failure.
    #[error("{operation} {resource_type} {identity}: {source}")]
    Remote {
        operation: Operation,
        resource_type: String,
        identity: String,
        #[source]
        source: ClientError,
    },

    /// The deadline expired while waiting for a parent lock.
    #[error("timed out waiting for lock {key}")]
    LockTimeout { key: LockKey },
}

impl LifecycleError {
    /// Returns true for errors caused by an expired deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConsistencyTimeout { .. }
                | Self::LockTimeout { .. }
                | Self::Remote {
                    source: ClientError::Timeout,
                    ..
                }
        )
    }
}
