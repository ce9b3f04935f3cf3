//! Error types for resource definitions.

use azdir_client::ClientError;
use azdir_lifecycle::LifecycleError;
use azdir_types::ObjectId;
use thiserror::Error;

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors surfaced by resource definitions.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// An argument failed validation before any remote call was made.
    #[error("invalid value for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A remote call made outside the lifecycle coordinator failed.
    #[error("{context}: {source}")]
    Client {
        context: String,
        #[source]
        source: ClientError,
    },

    /// The parent a child resource hangs off does not exist.
    #[error("{resource_type} with object ID {id} was not found")]
    ParentNotFound {
        resource_type: &'static str,
        id: ObjectId,
    },

    /// The object to be linked to a parent does not exist.
    #[error("member principal object {id} was not found")]
    MemberNotFound { id: ObjectId },

    /// A schedule request was accepted but landed in a failed state.
    #[error("{resource_type} request {request_id} is in a failed state")]
    RequestFailed {
        resource_type: &'static str,
        request_id: String,
    },

    /// Delete cannot tell how to tear down a schedule in this status.
    #[error("unable to destroy {resource_type} {id} due to unknown status {status:?}")]
    UnknownStatus {
        resource_type: &'static str,
        id: String,
        status: String,
    },

    /// A data source lookup matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// A data source lookup matched more than one object.
    #[error("{0}")]
    Ambiguous(String),

    #[error(transparent)]
    InvalidId(#[from] azdir_types::Error),

    /// The API answered with something that cannot be mapped to the model.
    #[error("bad API response: {0}")]
    InvalidResponse(String),
}

impl ResourceError {
    pub(crate) fn client(context: impl Into<String>, source: ClientError) -> Self {
        Self::Client {
            context: context.into(),
            source,
        }
    }

    /// Returns true for validation failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
