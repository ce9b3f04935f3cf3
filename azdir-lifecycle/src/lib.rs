//! Lifecycle coordination for eventually-consistent directory objects.
//!
//! The directory behind a [`DirectoryClient`](azdir_client::DirectoryClient)
//! is replicated, so a successful write is not immediately visible to every
//! read. [`LifecycleCoordinator`] wraps each create/read/update/delete with:
//!
//! - an existence probe before create, failing with
//!   [`LifecycleError::AlreadyExists`] instead of adopting the object
//! - a named lock on the parent object around mutations ([`NamedLocks`])
//! - a consistency poll after create and delete ([`poll_until`]), requiring
//!   several consecutive observations of the target state
//! - "not found" recovered as [`ReadOutcome::Gone`] and
//!   [`DeleteOutcome::AlreadyGone`]
//!
//! Every operation runs under an [`OperationContext`] deadline.

mod changes;
mod config;
mod context;
mod coordinator;
mod error;
mod locks;
mod poll;

pub use changes::{lookup, AttributeChanges};
pub use config::{CoordinatorConfig, OperationTimeouts, PollConfig};
pub use context::OperationContext;
pub use coordinator::{CreateRequest, DeleteOutcome, LifecycleCoordinator, ReadOutcome, ResourceRef};
pub use error::{LifecycleError, LifecycleResult, Operation};
pub use locks::{NamedLockGuard, NamedLocks};
pub use poll::{poll_until, ConsistencyPoll, Observation, PollError, PollState};
