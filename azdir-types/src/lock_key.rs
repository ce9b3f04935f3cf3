//! Lock keys for serializing mutations of a shared parent object.

use crate::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(resource type, parent identity)` pair.
///
/// Two operations holding equal keys never run their critical sections
/// concurrently. The scope is the resource type name of the parent, e.g.
/// `azuread_administrative_unit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockKey {
    scope: String,
    key: String,
}

impl LockKey {
    /// Creates a lock key.
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }

    /// Lock key for a parent directory object.
    pub fn for_object(scope: impl Into<String>, parent: ObjectId) -> Self {
        Self::new(scope, parent.to_string())
    }

    /// The resource type name.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The parent identity.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.key)
    }
}
