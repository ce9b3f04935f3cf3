//! Identifier types for azdir.
//!
//! This crate defines the identifiers shared by the client, lifecycle and
//! resource layers:
//! - Directory object IDs (UUIDs assigned by the directory service)
//! - Compound sub-resource IDs (`{parent}/{kind}/{child}`)
//! - Opaque resource identities persisted by the state layer
//! - Lock keys scoping mutations of a shared parent object

mod ids;
mod lock_key;

pub use ids::{ObjectId, ResourceIdentity, SubResourceId};
pub use lock_key::LockKey;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid {kind} ID {value:?}: {reason}")]
    InvalidId {
        kind: String,
        value: String,
        reason: String,
    },
}
