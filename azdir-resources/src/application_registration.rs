//! `azuread_application_registration`: the core properties of an
//! application object.
//!
//! The model is flat; on the wire most fields live in nested objects
//! (`info`, `web`, `api`). [`FIELDS`] maps one to the other and drives both
//! the create payload and the partial update diff.

use crate::error::{ResourceError, ResourceResult};
use crate::validation::{
    check, int_between, is_http_or_https_url, string_in_slice, string_is_not_empty,
    string_len_between,
};
use azdir_client::{Attributes, DirectoryClient, RemoteObject};
use azdir_lifecycle::{
    AttributeChanges, CoordinatorConfig, CreateRequest, DeleteOutcome, LifecycleCoordinator,
    NamedLocks, Operation, ReadOutcome, ResourceRef,
};
use azdir_types::{LockKey, ObjectId, ResourceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const RESOURCE_TYPE: &str = "azuread_application_registration";

/// Lock scope shared by every resource mutating an application object.
pub const LOCK_SCOPE: &str = "azuread_application";

pub const DEFAULT_SIGN_IN_AUDIENCE: &str = "AzureADMyOrg";

pub const DEFAULT_ACCESS_TOKEN_VERSION: i64 = 2;

pub const SIGN_IN_AUDIENCES: &[&str] = &[
    "AzureADMyOrg",
    "AzureADMultipleOrgs",
    "AzureADandPersonalMicrosoftAccount",
    "PersonalMicrosoftAccount",
];

pub const GROUP_MEMBERSHIP_CLAIMS: &[&str] = &[
    "All",
    "None",
    "ApplicationGroup",
    "DirectoryRole",
    "SecurityGroup",
];

const MAX_DESCRIPTION_LEN: usize = 1024;

/// Writable model fields and the attribute paths they are sent as.
pub const FIELDS: &[(&str, &str)] = &[
    ("display_name", "displayName"),
    ("description", "description"),
    ("group_membership_claims", "groupMembershipClaims"),
    ("notes", "notes"),
    ("service_management_reference", "serviceManagementReference"),
    ("sign_in_audience", "signInAudience"),
    ("requested_access_token_version", "api.requestedAccessTokenVersion"),
    ("marketing_url", "info.marketingUrl"),
    ("privacy_statement_url", "info.privacyStatementUrl"),
    ("support_url", "info.supportUrl"),
    ("terms_of_service_url", "info.termsOfServiceUrl"),
    ("homepage_url", "web.homePageUrl"),
    ("logout_url", "web.logoutUrl"),
    (
        "implicit_access_token_issuance_enabled",
        "web.implicitGrantSettings.enableAccessTokenIssuance",
    ),
    (
        "implicit_id_token_issuance_enabled",
        "web.implicitGrantSettings.enableIdTokenIssuance",
    ),
];

/// Application registration model. Empty strings mean "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRegistration {
    /// Object ID, assigned by the directory.
    pub object_id: Option<ObjectId>,
    /// Client (application) ID, assigned by the directory.
    pub client_id: Option<String>,
    pub publisher_domain: Option<String>,
    pub disabled_by_microsoft: Option<String>,

    pub display_name: String,
    pub description: String,
    pub notes: String,
    pub group_membership_claims: BTreeSet<String>,
    pub service_management_reference: String,
    pub sign_in_audience: String,
    pub requested_access_token_version: i64,

    pub homepage_url: String,
    pub logout_url: String,
    pub marketing_url: String,
    pub privacy_statement_url: String,
    pub support_url: String,
    pub terms_of_service_url: String,

    pub implicit_access_token_issuance_enabled: bool,
    pub implicit_id_token_issuance_enabled: bool,
}

impl Default for ApplicationRegistration {
    fn default() -> Self {
        Self {
            object_id: None,
            client_id: None,
            publisher_domain: None,
            disabled_by_microsoft: None,
            display_name: String::new(),
            description: String::new(),
            notes: String::new(),
            group_membership_claims: BTreeSet::new(),
            service_management_reference: String::new(),
            sign_in_audience: DEFAULT_SIGN_IN_AUDIENCE.to_string(),
            requested_access_token_version: DEFAULT_ACCESS_TOKEN_VERSION,
            homepage_url: String::new(),
            logout_url: String::new(),
            marketing_url: String::new(),
            privacy_statement_url: String::new(),
            support_url: String::new(),
            terms_of_service_url: String::new(),
            implicit_access_token_issuance_enabled: false,
            implicit_id_token_issuance_enabled: false,
        }
    }
}

/// Empty strings are sent as `null` so the remote value is cleared.
fn nullable(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

fn string_at(object: &RemoteObject, path: &str) -> String {
    object
        .path(path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_at(object: &RemoteObject, path: &str) -> bool {
    object.path(path).and_then(Value::as_bool).unwrap_or(false)
}

impl ApplicationRegistration {
    /// Model with the given display name and defaults elsewhere.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Checks every argument.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError::Validation`] found.
    pub fn validate(&self) -> ResourceResult<()> {
        check("display_name", string_is_not_empty(&self.display_name))?;
        check(
            "description",
            string_len_between(&self.description, 0, MAX_DESCRIPTION_LEN),
        )?;
        for claim in &self.group_membership_claims {
            check(
                "group_membership_claims",
                string_in_slice(claim, GROUP_MEMBERSHIP_CLAIMS),
            )?;
        }
        check(
            "sign_in_audience",
            string_in_slice(&self.sign_in_audience, SIGN_IN_AUDIENCES),
        )?;
        check(
            "requested_access_token_version",
            int_between(self.requested_access_token_version, 1, 2),
        )?;

        for (field, url) in [
            ("homepage_url", &self.homepage_url),
            ("logout_url", &self.logout_url),
            ("marketing_url", &self.marketing_url),
            ("privacy_statement_url", &self.privacy_statement_url),
            ("support_url", &self.support_url),
            ("terms_of_service_url", &self.terms_of_service_url),
        ] {
            if !url.is_empty() {
                check(field, is_http_or_https_url(url))?;
            }
        }
        Ok(())
    }

    /// Wire value of a field from [`FIELDS`].
    fn value_of(&self, field: &str) -> Value {
        match field {
            "display_name" => Value::String(self.display_name.clone()),
            "description" => nullable(&self.description),
            "group_membership_claims" => {
                let claims: Vec<&str> = self
                    .group_membership_claims
                    .iter()
                    .map(String::as_str)
                    .collect();
                nullable(&claims.join(","))
            }
            "notes" => nullable(&self.notes),
            "service_management_reference" => nullable(&self.service_management_reference),
            "sign_in_audience" => Value::String(self.sign_in_audience.clone()),
            "requested_access_token_version" => Value::from(self.requested_access_token_version),
            "marketing_url" => nullable(&self.marketing_url),
            "privacy_statement_url" => nullable(&self.privacy_statement_url),
            "support_url" => nullable(&self.support_url),
            "terms_of_service_url" => nullable(&self.terms_of_service_url),
            "homepage_url" => nullable(&self.homepage_url),
            "logout_url" => nullable(&self.logout_url),
            "implicit_access_token_issuance_enabled" => {
                Value::Bool(self.implicit_access_token_issuance_enabled)
            }
            "implicit_id_token_issuance_enabled" => {
                Value::Bool(self.implicit_id_token_issuance_enabled)
            }
            _ => Value::Null,
        }
    }

    /// Full payload of the writable fields.
    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        let mut changes = AttributeChanges::new();
        for (field, path) in FIELDS {
            changes.set(*path, self.value_of(field));
        }
        changes.to_payload()
    }

    /// Paths whose value differs between `prior` and `self`.
    #[must_use]
    pub fn changes_from(&self, prior: &Self) -> AttributeChanges {
        AttributeChanges::diff(
            &prior.to_attributes(),
            &self.to_attributes(),
            FIELDS.iter().map(|(_, path)| *path),
        )
    }

    /// Rebuilds the model from a remote application object.
    ///
    /// # Errors
    ///
    /// Fails if the object ID is not a UUID.
    pub fn from_remote(object: &RemoteObject) -> ResourceResult<Self> {
        let object_id = ObjectId::parse(object.id.as_str())?;
        let optional = |name: &str| object.str_attr(name).map(str::to_string);

        Ok(Self {
            object_id: Some(object_id),
            client_id: optional("appId"),
            publisher_domain: optional("publisherDomain"),
            disabled_by_microsoft: object
                .path("disabledByMicrosoftStatus")
                .filter(|v| !v.is_null())
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string)),

            display_name: string_at(object, "displayName"),
            description: string_at(object, "description"),
            notes: string_at(object, "notes"),
            group_membership_claims: string_at(object, "groupMembershipClaims")
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            service_management_reference: string_at(object, "serviceManagementReference"),
            sign_in_audience: string_at(object, "signInAudience"),
            requested_access_token_version: object
                .path("api.requestedAccessTokenVersion")
                .and_then(Value::as_i64)
                .unwrap_or(DEFAULT_ACCESS_TOKEN_VERSION),

            homepage_url: string_at(object, "web.homePageUrl"),
            logout_url: string_at(object, "web.logoutUrl"),
            marketing_url: string_at(object, "info.marketingUrl"),
            privacy_statement_url: string_at(object, "info.privacyStatementUrl"),
            support_url: string_at(object, "info.supportUrl"),
            terms_of_service_url: string_at(object, "info.termsOfServiceUrl"),

            implicit_access_token_issuance_enabled: bool_at(
                object,
                "web.implicitGrantSettings.enableAccessTokenIssuance",
            ),
            implicit_id_token_issuance_enabled: bool_at(
                object,
                "web.implicitGrantSettings.enableIdTokenIssuance",
            ),
        })
    }
}

/// Lifecycle of application registrations.
#[derive(Debug)]
pub struct ApplicationRegistrations {
    coordinator: LifecycleCoordinator,
}

impl ApplicationRegistrations {
    /// Default configuration: ten minutes for create and update.
    #[must_use]
    pub fn default_config() -> CoordinatorConfig {
        let mut config = CoordinatorConfig::new(RESOURCE_TYPE);
        config.timeouts.create_secs = 600;
        config.timeouts.update_secs = 600;
        config
    }

    pub fn new(client: Arc<dyn DirectoryClient>, locks: Arc<NamedLocks>) -> Self {
        Self::with_config(client, locks, Self::default_config())
    }

    pub fn with_config(
        client: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            coordinator: LifecycleCoordinator::with_locks(client, locks, config),
        }
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    /// Creates the application and returns its state as the directory
    /// reports it.
    pub async fn create(
        &self,
        model: &ApplicationRegistration,
    ) -> ResourceResult<ApplicationRegistration> {
        model.validate()?;
        let ctx = self.coordinator.context(Operation::Create);

        // The object ID is server assigned, so there is nothing to probe.
        let created = self
            .coordinator
            .create(&ctx, CreateRequest::new(model.to_attributes()))
            .await?;
        ApplicationRegistration::from_remote(&created)
    }

    /// Current state, or `None` once the application is gone.
    pub async fn read(&self, object_id: ObjectId) -> ResourceResult<Option<ApplicationRegistration>> {
        let ctx = self.coordinator.context(Operation::Read);
        match self
            .coordinator
            .read(&ctx, &ResourceIdentity::from(object_id))
            .await?
        {
            ReadOutcome::Present(object) => Ok(Some(ApplicationRegistration::from_remote(&object)?)),
            ReadOutcome::Gone => Ok(None),
        }
    }

    /// Sends the fields that differ between `prior` and `desired`.
    pub async fn update(
        &self,
        prior: &ApplicationRegistration,
        desired: &ApplicationRegistration,
    ) -> ResourceResult<()> {
        desired.validate()?;
        let object_id = prior.object_id.ok_or_else(|| {
            ResourceError::InvalidResponse("application has no object ID in state".to_string())
        })?;

        let changes = desired.changes_from(prior);
        debug!(
            "Application {} changed: {:?}",
            object_id,
            changes.paths().collect::<Vec<_>>()
        );

        let ctx = self.coordinator.context(Operation::Update);
        let target = ResourceRef::new(object_id).locked_by(LockKey::for_object(LOCK_SCOPE, object_id));
        self.coordinator.update(&ctx, &target, &changes).await?;
        Ok(())
    }

    /// Deletes the application and waits until it is gone.
    pub async fn delete(&self, object_id: ObjectId) -> ResourceResult<DeleteOutcome> {
        let ctx = self.coordinator.context(Operation::Delete);
        Ok(self
            .coordinator
            .delete(&ctx, &ResourceRef::new(object_id))
            .await?)
    }
}
