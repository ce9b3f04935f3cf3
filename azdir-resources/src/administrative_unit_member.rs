//! `azuread_administrative_unit_member`: membership of a directory object in
//! an administrative unit.
//!
//! Memberships are `$ref` links identified by `{unit}/member/{member}`. Every
//! mutation locks the administrative unit so concurrent member changes on one
//! unit are applied one at a time. Both the unit and the member object must
//! exist before the link is added. Both IDs force replacement, so there is no
//! update.

use crate::error::{ResourceError, ResourceResult};
use crate::validation::{check, is_uuid};
use azdir_client::{
    Attributes, ClientError, DirectoryClient, RetryPolicy, MEMBER_ID_ATTRIBUTE,
    PARENT_ID_ATTRIBUTE,
};
use azdir_lifecycle::{
    CoordinatorConfig, CreateRequest, DeleteOutcome, LifecycleCoordinator, NamedLocks,
    Operation, OperationContext, ReadOutcome, ResourceRef,
};
use azdir_types::{LockKey, ObjectId, ResourceIdentity, SubResourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const RESOURCE_TYPE: &str = "azuread_administrative_unit_member";

/// Resource type of the parent; also the lock scope.
pub const PARENT_RESOURCE_TYPE: &str = "azuread_administrative_unit";

/// Middle segment of member identities.
pub const MEMBER_KIND: &str = "member";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdministrativeUnitMember {
    pub administrative_unit_object_id: ObjectId,
    pub member_object_id: ObjectId,
}

impl AdministrativeUnitMember {
    pub fn new(administrative_unit_object_id: ObjectId, member_object_id: ObjectId) -> Self {
        Self {
            administrative_unit_object_id,
            member_object_id,
        }
    }

    /// Builds a membership from raw argument strings.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Validation`] if either ID is not a UUID.
    pub fn from_arguments(administrative_unit_object_id: &str, member_object_id: &str) -> ResourceResult<Self> {
        check("administrative_unit_object_id", is_uuid(administrative_unit_object_id))?;
        check("member_object_id", is_uuid(member_object_id))?;
        Ok(Self::new(
            ObjectId::parse(administrative_unit_object_id)?,
            ObjectId::parse(member_object_id)?,
        ))
    }

    /// Parses an identity as produced by [`id`](Self::id), e.g. on import.
    pub fn parse(id: &str) -> ResourceResult<Self> {
        let id = SubResourceId::parse(id, MEMBER_KIND)?;
        Ok(Self::new(id.parent(), id.child()))
    }

    #[must_use]
    pub fn id(&self) -> SubResourceId {
        SubResourceId::new(
            self.administrative_unit_object_id,
            MEMBER_KIND,
            self.member_object_id,
        )
    }

    #[must_use]
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::from(self.id())
    }

    /// Lock on the administrative unit.
    #[must_use]
    pub fn lock_key(&self) -> LockKey {
        LockKey::for_object(PARENT_RESOURCE_TYPE, self.administrative_unit_object_id)
    }

    fn to_attributes(self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            PARENT_ID_ATTRIBUTE.to_string(),
            Value::String(self.administrative_unit_object_id.to_string()),
        );
        attributes.insert(
            MEMBER_ID_ATTRIBUTE.to_string(),
            Value::String(self.member_object_id.to_string()),
        );
        attributes
    }
}

/// Lifecycle of administrative unit memberships.
pub struct AdministrativeUnitMembers {
    units: Arc<dyn DirectoryClient>,
    directory_objects: Arc<dyn DirectoryClient>,
    coordinator: LifecycleCoordinator,
}

impl AdministrativeUnitMembers {
    /// `units` serves the administrative units themselves,
    /// `directory_objects` any object that can become a member, `members`
    /// the membership links.
    pub fn new(
        units: Arc<dyn DirectoryClient>,
        directory_objects: Arc<dyn DirectoryClient>,
        members: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
    ) -> Self {
        Self::with_config(
            units,
            directory_objects,
            members,
            locks,
            CoordinatorConfig::new(RESOURCE_TYPE),
        )
    }

    pub fn with_config(
        units: Arc<dyn DirectoryClient>,
        directory_objects: Arc<dyn DirectoryClient>,
        members: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            units,
            directory_objects,
            coordinator: LifecycleCoordinator::with_locks(members, locks, config),
        }
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    /// Adds the member and waits until the membership is visible.
    ///
    /// # Errors
    ///
    /// [`ResourceError::ParentNotFound`] if the administrative unit does not
    /// exist, [`ResourceError::MemberNotFound`] if the member object does
    /// not; `AlreadyExists` if the membership does.
    pub async fn create(&self, member: AdministrativeUnitMember) -> ResourceResult<AdministrativeUnitMember> {
        let ctx = self.coordinator.context(Operation::Create);
        let unit = member.administrative_unit_object_id;
        let member_id = member.member_object_id;

        match fetch(&ctx, self.units.as_ref(), unit).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(ResourceError::ParentNotFound {
                    resource_type: PARENT_RESOURCE_TYPE,
                    id: unit,
                });
            }
            Err(e) => {
                return Err(ResourceError::client(
                    format!("retrieving administrative unit with object ID {unit}"),
                    e,
                ));
            }
        }

        match fetch(&ctx, self.directory_objects.as_ref(), member_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(ResourceError::MemberNotFound { id: member_id });
            }
            Err(e) => {
                return Err(ResourceError::client(
                    format!("retrieving member principal object {member_id}"),
                    e,
                ));
            }
        }

        let request = CreateRequest::new(member.to_attributes())
            .with_identity(member.identity())
            .locked_by(member.lock_key());
        self.coordinator.create(&ctx, request).await?;
        debug!("Member {} added to administrative unit {}", member.member_object_id, unit);
        Ok(member)
    }

    /// The membership, or `None` once it is gone.
    pub async fn read(&self, id: &str) -> ResourceResult<Option<AdministrativeUnitMember>> {
        let member = AdministrativeUnitMember::parse(id)?;
        let ctx = self.coordinator.context(Operation::Read);
        match self.coordinator.read(&ctx, &member.identity()).await? {
            ReadOutcome::Present(_) => Ok(Some(member)),
            ReadOutcome::Gone => Ok(None),
        }
    }

    /// Removes the member and waits until the link is gone.
    pub async fn delete(&self, member: AdministrativeUnitMember) -> ResourceResult<DeleteOutcome> {
        let ctx = self.coordinator.context(Operation::Delete);
        let target = ResourceRef::new(member.identity()).locked_by(member.lock_key());
        Ok(self.coordinator.delete(&ctx, &target).await?)
    }
}

/// Fetches an object under the operation deadline, discarding the body.
async fn fetch(ctx: &OperationContext, client: &dyn DirectoryClient, id: ObjectId) -> Result<(), ClientError> {
    ctx.run(client.get(&ResourceIdentity::from(id), RetryPolicy::Standard))
        .await
        .unwrap_or(Err(ClientError::Timeout))
        .map(|_| ())
}

impl std::fmt::Debug for AdministrativeUnitMembers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdministrativeUnitMembers")
            .field("units", &self.units.object_type())
            .field("directory_objects", &self.directory_objects.object_type())
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_through_parse() {
        let member = AdministrativeUnitMember::new(ObjectId::new(), ObjectId::new());
        let parsed = AdministrativeUnitMember::parse(member.identity().as_str()).unwrap();
        assert_eq!(parsed, member);
    }

    #[test]
    fn lock_is_scoped_to_the_unit() {
        let unit = ObjectId::new();
        let a = AdministrativeUnitMember::new(unit, ObjectId::new());
        let b = AdministrativeUnitMember::new(unit, ObjectId::new());
        assert_eq!(a.lock_key(), b.lock_key());
        assert_eq!(a.lock_key().scope(), PARENT_RESOURCE_TYPE);
    }

    #[test]
    fn arguments_must_be_uuids() {
        let err = AdministrativeUnitMember::from_arguments("not-a-uuid", "also-not").unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Validation { field: "administrative_unit_object_id", .. }
        ));
    }
}
