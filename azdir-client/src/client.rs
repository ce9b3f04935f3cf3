//! Directory client abstraction.
//!
//! Each directory object type (applications, users, administrative unit
//! members, ...) gets its own [`DirectoryClient`] implementation. The
//! lifecycle layer only ever talks to this trait.

use crate::error::ClientResult;
use crate::query::Query;
use async_trait::async_trait;
use azdir_types::ResourceIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute mapping of a directory object, as sent to and received from the API.
pub type Attributes = Map<String, Value>;

/// Whether a call may be retried by the client on throttling and transient
/// server errors.
///
/// Existence probes and consistency polls pass `Disabled` so a 404 or a slow
/// replica is reported straight back to the caller instead of being retried
/// inside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Retry throttled (429) and transient (502/503/504) responses.
    #[default]
    Standard,
    /// The first response is final.
    Disabled,
}

impl RetryPolicy {
    /// Returns true if the client may retry under this policy.
    #[must_use]
    pub fn allows_retry(self) -> bool {
        matches!(self, Self::Standard)
    }
}

/// A directory object as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Identity of the object, as the lifecycle layer tracks it.
    pub id: ResourceIdentity,
    /// Raw attributes.
    pub attributes: Attributes,
}

impl RemoteObject {
    /// Creates a remote object.
    pub fn new(id: impl Into<ResourceIdentity>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Builds a remote object from a JSON body, taking the identity from its
    /// `id` attribute.
    pub fn from_value(value: Value) -> ClientResult<Self> {
        let Value::Object(attributes) = value else {
            return Err(crate::ClientError::InvalidResponse(
                "expected a JSON object".to_string(),
            ));
        };
        let id = attributes
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                crate::ClientError::InvalidResponse("object ID is missing or empty".to_string())
            })?
            .to_string();
        Ok(Self::new(id, attributes))
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Returns the attribute at a dotted path such as `web.logoutUrl`.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.attributes.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

/// A response value together with the HTTP status it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: u16) -> Self {
        Self { value, status }
    }
}

/// CRUD capability set of one directory object type.
///
/// Errors carry the HTTP status (see [`ClientError::status`](crate::ClientError::status)),
/// so a 404 can be told apart from other failures.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Name of the object type, used in logs and errors.
    fn object_type(&self) -> &str;

    /// Fetches an object.
    async fn get(
        &self,
        id: &ResourceIdentity,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>>;

    /// Creates an object.
    async fn create(
        &self,
        attributes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>>;

    /// Applies a partial update. Only the given attributes are sent.
    async fn update(
        &self,
        id: &ResourceIdentity,
        changes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<u16>;

    /// Deletes (or, for relationships, removes) an object.
    async fn delete(&self, id: &ResourceIdentity, retry: RetryPolicy) -> ClientResult<u16>;

    /// Lists objects matching a query.
    async fn list(
        &self,
        query: &Query,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<Vec<RemoteObject>>>;

    /// Invokes a bound action on an object, such as `cancel` on a schedule
    /// request.
    async fn invoke(
        &self,
        id: &ResourceIdentity,
        action: &str,
        retry: RetryPolicy,
    ) -> ClientResult<u16> {
        let _ = (id, action, retry);
        Err(crate::ClientError::Unsupported {
            object_type: self.object_type().to_string(),
            operation: "invoke",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_requires_id() {
        let err = RemoteObject::from_value(json!({"displayName": "x"})).unwrap_err();
        assert!(err.to_string().contains("object ID"));

        let obj = RemoteObject::from_value(json!({"id": "abc", "displayName": "x"})).unwrap();
        assert_eq!(obj.id.as_str(), "abc");
        assert_eq!(obj.str_attr("displayName"), Some("x"));
    }

    #[test]
    fn path_walks_nested_objects() {
        let obj = RemoteObject::from_value(json!({
            "id": "abc",
            "web": {"implicitGrantSettings": {"enableIdTokenIssuance": true}}
        }))
        .unwrap();
        assert_eq!(
            obj.path("web.implicitGrantSettings.enableIdTokenIssuance"),
            Some(&json!(true))
        );
        assert_eq!(obj.path("web.logoutUrl"), None);
    }
}
