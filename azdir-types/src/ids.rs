//! Identifier types for directory objects and tracked resources.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Object ID of a directory object (application, user, group, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Creates a random object ID. Real IDs are assigned by the directory;
    /// this is mostly useful for tests and mocks.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an object ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an object ID from a string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// ID of a relationship between two directory objects, such as a member of
/// an administrative unit. Rendered as `{parent}/{kind}/{child}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubResourceId {
    parent: ObjectId,
    kind: String,
    child: ObjectId,
}

impl SubResourceId {
    /// Creates a sub-resource ID.
    pub fn new(parent: ObjectId, kind: impl Into<String>, child: ObjectId) -> Self {
        Self {
            parent,
            kind: kind.into(),
            child,
        }
    }

    /// Parses `{parent}/{kind}/{child}`, requiring the middle segment to
    /// equal `kind`.
    pub fn parse(s: &str, kind: &str) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidId {
            kind: kind.to_string(),
            value: s.to_string(),
            reason,
        };

        let segments: Vec<&str> = s.split('/').collect();
        let [parent, segment, child] = segments.as_slice() else {
            return Err(invalid(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        if *segment != kind {
            return Err(invalid(format!("expected segment {kind:?}, found {segment:?}")));
        }

        let parent = Self::parse_segment(parent)
            .map_err(|reason| invalid(format!("parent object ID: {reason}")))?;
        let child = Self::parse_segment(child)
            .map_err(|reason| invalid(format!("child object ID: {reason}")))?;

        Ok(Self::new(parent, kind, child))
    }

    /// Segments must already be lowercase hyphenated, so the parsed ID
    /// displays exactly as it was given.
    fn parse_segment(segment: &str) -> Result<ObjectId, String> {
        let id = ObjectId::parse(segment).map_err(|e| e.to_string())?;
        if id.to_string() != segment {
            return Err(format!("{segment:?} is not a lowercase hyphenated UUID"));
        }
        Ok(id)
    }

    /// The object owning the relationship.
    #[must_use]
    pub fn parent(&self) -> ObjectId {
        self.parent
    }

    /// The relationship kind segment, e.g. `member`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The related object.
    #[must_use]
    pub fn child(&self) -> ObjectId {
        self.child
    }
}

impl fmt::Display for SubResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.parent, self.kind, self.child)
    }
}

/// Opaque, stable key identifying a remote object for the lifetime of a
/// tracked resource. Persisted by the state layer and never reinterpreted by
/// the lifecycle core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    /// Wraps a raw identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identity, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ObjectId> for ResourceIdentity {
    fn from(id: ObjectId) -> Self {
        Self(id.to_string())
    }
}

impl From<&SubResourceId> for ResourceIdentity {
    fn from(id: &SubResourceId) -> Self {
        Self(id.to_string())
    }
}

impl From<SubResourceId> for ResourceIdentity {
    fn from(id: SubResourceId) -> Self {
        Self::from(&id)
    }
}

impl From<&str> for ResourceIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}
