//! `azuread_privileged_access_group_assignment_schedule` and
//! `azuread_privileged_access_group_eligibility_schedule`: time-bound
//! membership or ownership of a group through Privileged Identity Management.
//!
//! Schedules are never written directly. Every change posts a schedule
//! request; the directory turns it into the schedule named by the request's
//! `targetScheduleId`, which becomes the resource identity. Requests are
//! never deleted either, so tearing a schedule down means cancelling the
//! request while it is pending or asking for removal once it is active.

use crate::error::{ResourceError, ResourceResult};
use crate::validation::{check, is_uuid, string_in_slice};
use azdir_client::{
    Attributes, ClientError, DirectoryClient, Direction, Query, RemoteObject, RetryPolicy,
};
use azdir_lifecycle::{
    CoordinatorConfig, CreateRequest, DeleteOutcome, LifecycleCoordinator, NamedLocks,
    Operation, OperationContext,
};
use azdir_types::{ObjectId, ResourceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ASSIGNMENT_RESOURCE_TYPE: &str = "azuread_privileged_access_group_assignment_schedule";

pub const ELIGIBILITY_RESOURCE_TYPE: &str =
    "azuread_privileged_access_group_eligibility_schedule";

const API_PATH: &str = "identityGovernance/privilegedAccess/group";

/// Access a schedule grants on the group.
pub const ACCESS_IDS: &[&str] = &["member", "owner"];

pub const ACTION_ADMIN_ASSIGN: &str = "adminAssign";
pub const ACTION_ADMIN_REMOVE: &str = "adminRemove";

pub const STATUS_CANCELED: &str = "Canceled";
pub const STATUS_DENIED: &str = "Denied";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_GRANTED: &str = "Granted";
pub const STATUS_PENDING_ADMIN_DECISION: &str = "PendingAdminDecision";
pub const STATUS_PENDING_APPROVAL: &str = "PendingApproval";
pub const STATUS_PENDING_PROVISIONING: &str = "PendingProvisioning";
pub const STATUS_PENDING_SCHEDULE_CREATION: &str = "PendingScheduleCreation";
pub const STATUS_PROVISIONED: &str = "Provisioned";
pub const STATUS_REVOKED: &str = "Revoked";
pub const STATUS_SCHEDULE_CREATED: &str = "ScheduleCreated";

const EXPIRATION_NONE: &str = "noExpiration";
const EXPIRATION_AFTER_DATE_TIME: &str = "afterDateTime";
const EXPIRATION_AFTER_DURATION: &str = "afterDuration";

/// Assignment (active) or eligibility (activatable) schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleKind {
    Assignment,
    Eligibility,
}

impl ScheduleKind {
    #[must_use]
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Assignment => ASSIGNMENT_RESOURCE_TYPE,
            Self::Eligibility => ELIGIBILITY_RESOURCE_TYPE,
        }
    }

    /// Collection the schedule requests are posted to.
    #[must_use]
    pub fn requests_path(self) -> String {
        match self {
            Self::Assignment => format!("{API_PATH}/assignmentScheduleRequests"),
            Self::Eligibility => format!("{API_PATH}/eligibilityScheduleRequests"),
        }
    }

    /// Collection of the resulting schedules.
    #[must_use]
    pub fn schedules_path(self) -> String {
        match self {
            Self::Assignment => format!("{API_PATH}/assignmentSchedules"),
            Self::Eligibility => format!("{API_PATH}/eligibilitySchedules"),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assignment => "assignment schedule",
            Self::Eligibility => "eligibility schedule",
        })
    }
}

/// Identity of a schedule, `{groupId}_{accessId}_{scheduleId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleId {
    group_id: ObjectId,
    access_id: String,
    value: String,
}

impl ScheduleId {
    /// Parses a `targetScheduleId`. The group segment must be a lowercase
    /// hyphenated UUID so the identity is stored exactly as given.
    pub fn parse(value: &str) -> ResourceResult<Self> {
        let invalid = |reason: String| {
            ResourceError::InvalidResponse(format!("invalid schedule ID {value:?}: {reason}"))
        };

        let mut segments = value.splitn(3, '_');
        let (Some(group), Some(access_id), Some(schedule)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(invalid("expected {groupId}_{accessId}_{scheduleId}".to_string()));
        };

        let group_id = ObjectId::parse(group).map_err(|e| invalid(e.to_string()))?;
        if group_id.to_string() != group {
            return Err(invalid("group ID is not a lowercase hyphenated UUID".to_string()));
        }
        if !ACCESS_IDS.contains(&access_id) {
            return Err(invalid(format!("unknown access ID {access_id:?}")));
        }
        if schedule.is_empty() {
            return Err(invalid("schedule segment is empty".to_string()));
        }

        Ok(Self {
            group_id,
            access_id: access_id.to_string(),
            value: value.to_string(),
        })
    }

    #[must_use]
    pub fn group_id(&self) -> ObjectId {
        self.group_id
    }

    #[must_use]
    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(self.value.clone())
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// How a schedule in a given status is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The request has not produced an active schedule yet: cancel it.
    Cancel,
    /// The schedule is active: post an `adminRemove` request.
    Revoke,
    /// Nothing left to remove.
    AlreadyGone,
}

impl Teardown {
    /// Teardown for a request status, `None` if the status is unknown.
    #[must_use]
    pub fn for_status(status: &str) -> Option<Self> {
        match status {
            STATUS_DENIED
            | STATUS_FAILED
            | STATUS_GRANTED
            | STATUS_PENDING_ADMIN_DECISION
            | STATUS_PENDING_APPROVAL
            | STATUS_PENDING_PROVISIONING
            | STATUS_PENDING_SCHEDULE_CREATION => Some(Self::Cancel),
            STATUS_PROVISIONED | STATUS_SCHEDULE_CREATED => Some(Self::Revoke),
            STATUS_CANCELED | STATUS_REVOKED => Some(Self::AlreadyGone),
            _ => None,
        }
    }
}

/// Schedule model. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegedAccessGroupSchedule {
    /// Target schedule ID, assigned by the directory.
    pub id: Option<String>,
    /// Latest request for this schedule.
    pub request_id: Option<String>,
    /// Status of the latest request.
    pub status: String,

    pub group_id: String,
    pub principal_id: String,
    /// `member` or `owner`.
    pub assignment_type: String,
    pub justification: String,
    pub ticket_number: String,
    pub ticket_system: String,

    /// RFC 3339 start; empty starts immediately.
    pub start_date: String,
    /// RFC 3339 end.
    pub expiration_date: String,
    /// ISO 8601 duration such as `PT8H`.
    pub duration: String,
    pub permanent_assignment: bool,
}

fn string_at(object: &RemoteObject, path: &str) -> String {
    object
        .path(path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl PrivilegedAccessGroupSchedule {
    pub fn new(
        group_id: impl Into<String>,
        principal_id: impl Into<String>,
        assignment_type: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            principal_id: principal_id.into(),
            assignment_type: assignment_type.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns the first [`ResourceError::Validation`] found.
    pub fn validate(&self) -> ResourceResult<()> {
        check("group_id", is_uuid(&self.group_id))?;
        check("principal_id", is_uuid(&self.principal_id))?;
        check(
            "assignment_type",
            string_in_slice(&self.assignment_type, ACCESS_IDS),
        )?;

        let expirations = [
            !self.expiration_date.is_empty(),
            !self.duration.is_empty(),
            self.permanent_assignment,
        ];
        if expirations.iter().filter(|set| **set).count() != 1 {
            return Err(ResourceError::Validation {
                field: "expiration_date",
                message: "exactly one of expiration_date, duration or permanent_assignment must be set"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn schedule_info(&self) -> Value {
        let expiration = if self.permanent_assignment {
            json!({"type": EXPIRATION_NONE})
        } else if !self.expiration_date.is_empty() {
            json!({"type": EXPIRATION_AFTER_DATE_TIME, "endDateTime": self.expiration_date})
        } else {
            json!({"type": EXPIRATION_AFTER_DURATION, "duration": self.duration})
        };

        let mut info = json!({"expiration": expiration});
        if !self.start_date.is_empty() {
            info["startDateTime"] = Value::String(self.start_date.clone());
        }
        info
    }

    fn subject(&self, action: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("accessId".to_string(), json!(self.assignment_type));
        attributes.insert("principalId".to_string(), json!(self.principal_id));
        attributes.insert("groupId".to_string(), json!(self.group_id));
        attributes.insert("action".to_string(), json!(action));
        attributes
    }

    /// Body of an `adminAssign` request.
    #[must_use]
    pub fn to_request(&self) -> Attributes {
        let mut attributes = self.subject(ACTION_ADMIN_ASSIGN);
        attributes.insert("justification".to_string(), json!(self.justification));
        attributes.insert("scheduleInfo".to_string(), self.schedule_info());
        if !self.ticket_number.is_empty() || !self.ticket_system.is_empty() {
            attributes.insert(
                "ticketInfo".to_string(),
                json!({"ticketNumber": self.ticket_number, "ticketSystem": self.ticket_system}),
            );
        }
        attributes
    }

    /// Body of the `adminRemove` request revoking an active schedule.
    #[must_use]
    pub fn to_removal(&self) -> Attributes {
        self.subject(ACTION_ADMIN_REMOVE)
    }

    fn apply_schedule_info(&mut self, object: &RemoteObject) {
        self.start_date = string_at(object, "scheduleInfo.startDateTime");
        self.expiration_date = string_at(object, "scheduleInfo.expiration.endDateTime");
        self.duration = string_at(object, "scheduleInfo.expiration.duration");
        self.permanent_assignment =
            object.path("scheduleInfo.expiration.type").and_then(Value::as_str)
                == Some(EXPIRATION_NONE);
    }

    /// Refreshes the model from the latest request.
    fn apply_request(&mut self, request: &RemoteObject) {
        self.request_id = Some(request.id.to_string());
        self.assignment_type = string_at(request, "accessId");
        self.group_id = string_at(request, "groupId");
        self.principal_id = string_at(request, "principalId");
        self.justification = string_at(request, "justification");
        self.status = string_at(request, "status");
        if request.path("ticketInfo").is_some_and(|t| !t.is_null()) {
            self.ticket_number = string_at(request, "ticketInfo.ticketNumber");
            self.ticket_system = string_at(request, "ticketInfo.ticketSystem");
        }
        self.apply_schedule_info(request);
    }

    /// Refreshes the model from the schedule once its requests have expired.
    /// Justification and ticket details only live on requests.
    fn apply_schedule(&mut self, schedule: &RemoteObject) {
        self.assignment_type = string_at(schedule, "accessId");
        self.group_id = string_at(schedule, "groupId");
        self.principal_id = string_at(schedule, "principalId");
        self.status = string_at(schedule, "status");
        self.apply_schedule_info(schedule);
    }

    fn schedule_id(&self) -> ResourceResult<ScheduleId> {
        let id = self.id.as_deref().ok_or_else(|| {
            ResourceError::InvalidResponse("schedule has no ID in state".to_string())
        })?;
        ScheduleId::parse(id)
    }
}

/// Lifecycle of one kind of privileged access group schedule.
///
/// The coordinator drives the request collection; the schedule collection
/// is only read.
pub struct PrivilegedAccessGroupSchedules {
    kind: ScheduleKind,
    schedules: Arc<dyn DirectoryClient>,
    coordinator: LifecycleCoordinator,
}

impl PrivilegedAccessGroupSchedules {
    pub fn new(
        kind: ScheduleKind,
        requests: Arc<dyn DirectoryClient>,
        schedules: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
    ) -> Self {
        Self::with_config(
            kind,
            requests,
            schedules,
            locks,
            CoordinatorConfig::new(kind.resource_type()),
        )
    }

    pub fn with_config(
        kind: ScheduleKind,
        requests: Arc<dyn DirectoryClient>,
        schedules: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            kind,
            schedules,
            coordinator: LifecycleCoordinator::with_locks(requests, locks, config),
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    fn requests(&self) -> &dyn DirectoryClient {
        self.coordinator.client().as_ref()
    }

    /// Posts an `adminAssign` request and adopts the schedule it targets.
    ///
    /// # Errors
    ///
    /// [`ResourceError::RequestFailed`] if the directory accepted the request
    /// but marked it failed.
    pub async fn create(
        &self,
        model: &PrivilegedAccessGroupSchedule,
    ) -> ResourceResult<PrivilegedAccessGroupSchedule> {
        model.validate()?;
        let ctx = self.coordinator.context(Operation::Create);
        let request = self.submit(&ctx, model).await?;

        let target = request
            .str_attr("targetScheduleId")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ResourceError::InvalidResponse(format!(
                    "{} request {} has no target schedule ID",
                    self.kind, request.id
                ))
            })?;
        let id = ScheduleId::parse(target)?;
        info!("Created {} {} from request {}", self.kind, id, request.id);

        let mut created = model.clone();
        created.id = Some(id.to_string());
        created.request_id = Some(request.id.to_string());
        created.status = string_at(&request, "status");
        Ok(created)
    }

    /// Current state, or `None` when neither a request nor the schedule is
    /// left.
    ///
    /// Details come from the newest request targeting the schedule; once all
    /// requests have expired they come from the schedule itself.
    pub async fn read(
        &self,
        state: &PrivilegedAccessGroupSchedule,
    ) -> ResourceResult<Option<PrivilegedAccessGroupSchedule>> {
        let id = state.schedule_id()?;
        let ctx = self.coordinator.context(Operation::Read);

        let schedule = remote(&ctx, self.schedules.get(&id.identity(), RetryPolicy::Standard)).await;
        let schedule = match schedule {
            Ok(response) => Some(response.value),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                return Err(ResourceError::client(format!("retrieving {} {id}", self.kind), e));
            }
        };

        let query = Query::eq("groupId", &id.group_id().to_string())
            .and_eq("targetScheduleId", id.as_str())
            .order_by("createdDateTime", Direction::Descending);
        let requests = remote(&ctx, self.requests().list(&query, RetryPolicy::Standard))
            .await
            .map_err(|e| ResourceError::client(format!("listing requests for {} {id}", self.kind), e))?
            .value;

        let mut model = state.clone();
        match (requests.first(), schedule) {
            (Some(request), _) => model.apply_request(request),
            (None, Some(schedule)) => model.apply_schedule(&schedule),
            (None, None) => {
                warn!("{} {} was not found - removing from state", self.kind, id);
                return Ok(None);
            }
        }
        Ok(Some(model))
    }

    /// Posts a new `adminAssign` request carrying the desired schedule.
    pub async fn update(
        &self,
        prior: &PrivilegedAccessGroupSchedule,
        desired: &PrivilegedAccessGroupSchedule,
    ) -> ResourceResult<PrivilegedAccessGroupSchedule> {
        desired.validate()?;
        let id = prior.schedule_id()?;
        let ctx = self.coordinator.context(Operation::Update);
        let request = self.submit(&ctx, desired).await?;
        debug!("Updated {} {} with request {}", self.kind, id, request.id);

        let mut updated = desired.clone();
        updated.id = Some(id.to_string());
        updated.request_id = Some(request.id.to_string());
        updated.status = string_at(&request, "status");
        Ok(updated)
    }

    /// Tears the schedule down according to the status last read.
    ///
    /// Pending and granted requests are cancelled, active schedules are
    /// revoked, and cancelled or revoked ones are already gone. A 404 from
    /// the cancel or revoke call also means the schedule is gone.
    ///
    /// # Errors
    ///
    /// [`ResourceError::UnknownStatus`] if the status is none of the above.
    pub async fn delete(
        &self,
        state: &PrivilegedAccessGroupSchedule,
    ) -> ResourceResult<DeleteOutcome> {
        let id = state.schedule_id()?;
        let teardown =
            Teardown::for_status(&state.status).ok_or_else(|| ResourceError::UnknownStatus {
                resource_type: self.kind.resource_type(),
                id: id.to_string(),
                status: state.status.clone(),
            })?;
        let ctx = self.coordinator.context(Operation::Delete);

        let result = match teardown {
            Teardown::AlreadyGone => {
                debug!("{} {} is already {}", self.kind, id, state.status);
                return Ok(DeleteOutcome::AlreadyGone);
            }
            Teardown::Cancel => {
                let request = state
                    .request_id
                    .as_deref()
                    .map_or_else(|| id.identity(), ResourceIdentity::new);
                remote(&ctx, self.requests().invoke(&request, "cancel", RetryPolicy::Standard))
                    .await
                    .map(|_| ())
            }
            Teardown::Revoke => remote(
                &ctx,
                self.requests().create(&state.to_removal(), RetryPolicy::Standard),
            )
            .await
            .map(|_| ()),
        };

        match result {
            Ok(()) => {
                info!("Removed {} {} ({:?})", self.kind, id, teardown);
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!("{} {} was already gone", self.kind, id);
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(e) => Err(ResourceError::client(
                format!("removing {} {id} ({teardown:?})", self.kind),
                e,
            )),
        }
    }

    /// Posts an `adminAssign` request through the coordinator and rejects it
    /// if the directory marked it failed.
    async fn submit(
        &self,
        ctx: &OperationContext,
        model: &PrivilegedAccessGroupSchedule,
    ) -> ResourceResult<RemoteObject> {
        let request = self
            .coordinator
            .create(ctx, CreateRequest::new(model.to_request()))
            .await?;
        if request.str_attr("status") == Some(STATUS_FAILED) {
            return Err(ResourceError::RequestFailed {
                resource_type: self.kind.resource_type(),
                request_id: request.id.to_string(),
            });
        }
        Ok(request)
    }
}

async fn remote<T>(
    ctx: &OperationContext,
    call: impl std::future::Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    ctx.run(call).await.unwrap_or(Err(ClientError::Timeout))
}

impl fmt::Debug for PrivilegedAccessGroupSchedules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegedAccessGroupSchedules")
            .field("kind", &self.kind)
            .field("schedules", &self.schedules.object_type())
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "2a1f7c3e-9b5d-4e0a-8c61-3f0d2b7e4a19";
    const PRINCIPAL: &str = "c4d8e2a0-51f3-4b9e-a7c2-6e1b0f9d3a58";

    #[test]
    fn teardown_follows_status() {
        for status in [
            STATUS_DENIED,
            STATUS_FAILED,
            STATUS_GRANTED,
            STATUS_PENDING_ADMIN_DECISION,
            STATUS_PENDING_APPROVAL,
            STATUS_PENDING_PROVISIONING,
            STATUS_PENDING_SCHEDULE_CREATION,
        ] {
            assert_eq!(Teardown::for_status(status), Some(Teardown::Cancel), "{status}");
        }
        assert_eq!(Teardown::for_status(STATUS_PROVISIONED), Some(Teardown::Revoke));
        assert_eq!(Teardown::for_status(STATUS_SCHEDULE_CREATED), Some(Teardown::Revoke));
        assert_eq!(Teardown::for_status(STATUS_CANCELED), Some(Teardown::AlreadyGone));
        assert_eq!(Teardown::for_status(STATUS_REVOKED), Some(Teardown::AlreadyGone));
        assert_eq!(Teardown::for_status("Exploded"), None);
        assert_eq!(Teardown::for_status(""), None);
    }

    #[test]
    fn schedule_id_splits_segments() {
        let id = ScheduleId::parse(&format!("{GROUP}_member_a1b2c3")).unwrap();
        assert_eq!(id.group_id().to_string(), GROUP);
        assert_eq!(id.access_id(), "member");
        assert_eq!(id.to_string(), format!("{GROUP}_member_a1b2c3"));
    }

    #[test]
    fn schedule_id_rejects_malformed_values() {
        assert!(ScheduleId::parse("nope").is_err());
        assert!(ScheduleId::parse(&format!("{GROUP}_admin_a1")).is_err());
        assert!(ScheduleId::parse(&format!("{GROUP}_owner_")).is_err());
        assert!(ScheduleId::parse(&format!("{}_owner_a1", GROUP.to_uppercase())).is_err());
    }

    #[test]
    fn request_carries_exactly_one_expiration() {
        let mut model = PrivilegedAccessGroupSchedule::new(GROUP, PRINCIPAL, "member");
        model.duration = "PT8H".into();
        model.start_date = "2030-01-01T00:00:00Z".into();
        let request = Value::Object(model.to_request());
        assert_eq!(request["action"], json!("adminAssign"));
        assert_eq!(
            request["scheduleInfo"],
            json!({
                "startDateTime": "2030-01-01T00:00:00Z",
                "expiration": {"type": "afterDuration", "duration": "PT8H"}
            })
        );
        assert!(request.get("ticketInfo").is_none());

        model.duration.clear();
        model.permanent_assignment = true;
        let request = Value::Object(model.to_request());
        assert_eq!(request["scheduleInfo"]["expiration"], json!({"type": "noExpiration"}));
    }

    #[test]
    fn validation_requires_one_expiration() {
        let mut model = PrivilegedAccessGroupSchedule::new(GROUP, PRINCIPAL, "member");
        assert!(model.validate().unwrap_err().is_validation());

        model.duration = "PT1H".into();
        assert!(model.validate().is_ok());

        model.permanent_assignment = true;
        assert!(model.validate().is_err());

        model.permanent_assignment = false;
        model.assignment_type = "admin".into();
        assert!(model.validate().is_err());

        model.assignment_type = "owner".into();
        model.group_id = "not-a-uuid".into();
        assert!(model.validate().is_err());
    }

    #[test]
    fn removal_only_names_the_subject() {
        let model = PrivilegedAccessGroupSchedule::new(GROUP, PRINCIPAL, "owner");
        let removal = Value::Object(model.to_removal());
        assert_eq!(
            removal,
            json!({"accessId": "owner", "principalId": PRINCIPAL, "groupId": GROUP, "action": "adminRemove"})
        );
    }
}
