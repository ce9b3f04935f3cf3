//! User data source: looks up one existing user.
//!
//! A user is selected by exactly one of object ID, user principal name,
//! mail, mail nickname or employee ID. Non-ID selectors list users with an
//! `eq` filter and must match exactly one. Lookups never retry, so a
//! throttled or missing user is reported straight away.

use crate::error::{ResourceError, ResourceResult};
use crate::validation::{check, is_uuid, string_is_not_empty};
use azdir_client::{ClientError, DirectoryClient, Query, RemoteObject, RetryPolicy};
use azdir_lifecycle::OperationContext;
use azdir_types::{ObjectId, ResourceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default lookup deadline.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// How a user is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    ObjectId(ObjectId),
    UserPrincipalName(String),
    Mail(String),
    MailNickname(String),
    EmployeeId(String),
}

impl UserSelector {
    /// Attribute matched by the `$filter`; `None` for object ID lookups.
    #[must_use]
    pub fn filter_attribute(&self) -> Option<&'static str> {
        match self {
            Self::ObjectId(_) => None,
            Self::UserPrincipalName(_) => Some("userPrincipalName"),
            Self::Mail(_) => Some("mail"),
            Self::MailNickname(_) => Some("mailNickname"),
            Self::EmployeeId(_) => Some("employeeId"),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::ObjectId(_) => "object ID",
            Self::UserPrincipalName(_) => "UPN",
            Self::Mail(_) => "mail",
            Self::MailNickname(_) => "email alias",
            Self::EmployeeId(_) => "employee ID",
        }
    }

    fn value(&self) -> String {
        match self {
            Self::ObjectId(id) => id.to_string(),
            Self::UserPrincipalName(v)
            | Self::Mail(v)
            | Self::MailNickname(v)
            | Self::EmployeeId(v) => v.clone(),
        }
    }
}

impl fmt::Display for UserSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.description(), self.value())
    }
}

/// Data source arguments; exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserArguments {
    pub object_id: Option<String>,
    pub user_principal_name: Option<String>,
    pub mail: Option<String>,
    pub mail_nickname: Option<String>,
    pub employee_id: Option<String>,
}

impl UserArguments {
    /// Resolves the single selector.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Validation`] unless exactly one argument is set and
    /// non-empty.
    pub fn selector(&self) -> ResourceResult<UserSelector> {
        let given: Vec<(&'static str, &str)> = [
            ("object_id", &self.object_id),
            ("user_principal_name", &self.user_principal_name),
            ("mail", &self.mail),
            ("mail_nickname", &self.mail_nickname),
            ("employee_id", &self.employee_id),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect();

        if given.len() != 1 {
            return Err(ResourceError::Validation {
                field: "object_id",
                message: "exactly one of `object_id`, `user_principal_name`, `mail`, \
                          `mail_nickname` or `employee_id` must be supplied"
                    .to_string(),
            });
        }
        let (field, value) = given[0];
        check(field, string_is_not_empty(value))?;

        Ok(match field {
            "object_id" => {
                check(field, is_uuid(value))?;
                UserSelector::ObjectId(ObjectId::parse(value)?)
            }
            "user_principal_name" => UserSelector::UserPrincipalName(value.to_string()),
            "mail" => UserSelector::Mail(value.to_string()),
            "mail_nickname" => UserSelector::MailNickname(value.to_string()),
            _ => UserSelector::EmployeeId(value.to_string()),
        })
    }
}

/// A user as exposed by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub object_id: ObjectId,
    pub account_enabled: bool,
    pub display_name: String,
    pub given_name: String,
    pub surname: String,
    pub user_principal_name: String,
    pub mail: String,
    pub mail_nickname: String,
    pub employee_id: String,
    pub employee_type: String,
    pub job_title: String,
    pub department: String,
    pub company_name: String,
    pub office_location: String,
    pub usage_location: String,
    pub user_type: String,
    pub cost_center: String,
    pub division: String,
    pub other_mails: Vec<String>,
    pub proxy_addresses: Vec<String>,
    pub onpremises_sync_enabled: bool,
    pub onpremises_user_principal_name: String,
    /// Empty when the user has no manager.
    pub manager_id: Option<ObjectId>,
}

fn strings(object: &RemoteObject, name: &str) -> Vec<String> {
    object
        .attributes
        .get(name)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl DirectoryUser {
    /// Maps a remote user object.
    ///
    /// # Errors
    ///
    /// Fails if the object ID is not a UUID.
    pub fn from_remote(object: &RemoteObject, manager_id: Option<ObjectId>) -> ResourceResult<Self> {
        let text = |path: &str| {
            object
                .path(path)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let flag = |path: &str| object.path(path).and_then(Value::as_bool).unwrap_or(false);

        Ok(Self {
            object_id: ObjectId::parse(object.id.as_str())?,
            account_enabled: flag("accountEnabled"),
            display_name: text("displayName"),
            given_name: text("givenName"),
            surname: text("surname"),
            user_principal_name: text("userPrincipalName"),
            mail: text("mail"),
            mail_nickname: text("mailNickname"),
            employee_id: text("employeeId"),
            employee_type: text("employeeType"),
            job_title: text("jobTitle"),
            department: text("department"),
            company_name: text("companyName"),
            office_location: text("officeLocation"),
            usage_location: text("usageLocation"),
            user_type: text("userType"),
            cost_center: text("employeeOrgData.costCenter"),
            division: text("employeeOrgData.division"),
            other_mails: strings(object, "otherMails"),
            proxy_addresses: strings(object, "proxyAddresses"),
            onpremises_sync_enabled: flag("onPremisesSyncEnabled"),
            onpremises_user_principal_name: text("onPremisesUserPrincipalName"),
            manager_id,
        })
    }
}

/// Looks up users.
pub struct UserLookup {
    users: Arc<dyn DirectoryClient>,
    managers: Arc<dyn DirectoryClient>,
    timeout: Duration,
}

impl UserLookup {
    /// `users` serves the user collection; `managers` resolves the manager
    /// of a user ID.
    pub fn new(users: Arc<dyn DirectoryClient>, managers: Arc<dyn DirectoryClient>) -> Self {
        Self {
            users,
            managers,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Finds the user matching `selector`, together with its manager.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] when nothing matches,
    /// [`ResourceError::Ambiguous`] when a filter matches several users.
    pub async fn find(&self, selector: &UserSelector) -> ResourceResult<DirectoryUser> {
        let ctx = OperationContext::with_timeout(self.timeout);
        let user = match selector {
            UserSelector::ObjectId(id) => self.get(&ctx, selector, *id).await?,
            _ => self.search(&ctx, selector).await?,
        };
        let manager_id = self.manager_of(&ctx, &user).await?;
        DirectoryUser::from_remote(&user, manager_id)
    }

    async fn get(
        &self,
        ctx: &OperationContext,
        selector: &UserSelector,
        id: ObjectId,
    ) -> ResourceResult<RemoteObject> {
        let result = ctx
            .run(self.users.get(&ResourceIdentity::from(id), RetryPolicy::Disabled))
            .await
            .unwrap_or(Err(ClientError::Timeout));
        match result {
            Ok(response) => Ok(response.value),
            Err(e) if e.is_not_found() => {
                Err(ResourceError::NotFound(format!("User not found with {selector}")))
            }
            Err(e) => Err(ResourceError::client(format!("retrieving user with {selector}"), e)),
        }
    }

    async fn search(
        &self,
        ctx: &OperationContext,
        selector: &UserSelector,
    ) -> ResourceResult<RemoteObject> {
        let Some(attribute) = selector.filter_attribute() else {
            return Err(ResourceError::InvalidResponse(format!(
                "{selector} cannot be used as a filter"
            )));
        };
        let query = Query::eq(attribute, &selector.value());
        debug!("Finding user with filter {:?}", query.filter);

        let mut users = ctx
            .run(self.users.list(&query, RetryPolicy::Disabled))
            .await
            .unwrap_or(Err(ClientError::Timeout))
            .map_err(|e| ResourceError::client(format!("finding user with {selector}"), e))?
            .value;

        match users.len() {
            0 => Err(ResourceError::NotFound(format!("User not found with {selector}"))),
            1 => Ok(users.remove(0)),
            n => Err(ResourceError::Ambiguous(format!(
                "More than one user ({n}) found with {selector}"
            ))),
        }
    }

    /// A 404 means the user has no manager.
    async fn manager_of(
        &self,
        ctx: &OperationContext,
        user: &RemoteObject,
    ) -> ResourceResult<Option<ObjectId>> {
        let result = ctx
            .run(self.managers.get(&user.id, RetryPolicy::Disabled))
            .await
            .unwrap_or(Err(ClientError::Timeout));
        match result {
            Ok(response) => match response.value.str_attr("id") {
                Some(id) => Ok(Some(ObjectId::parse(id)?)),
                None => Ok(None),
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ResourceError::client(
                format!("retrieving manager for user with object ID {}", user.id),
                e,
            )),
        }
    }
}

impl fmt::Debug for UserLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLookup")
            .field("users", &self.users.object_type())
            .field("managers", &self.managers.object_type())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_argument() {
        let none = UserArguments::default();
        assert!(none.selector().unwrap_err().is_validation());

        let two = UserArguments {
            mail: Some("a@contoso.com".into()),
            employee_id: Some("E1".into()),
            ..Default::default()
        };
        assert!(two.selector().is_err());

        let one = UserArguments {
            mail_nickname: Some("jdoe".into()),
            ..Default::default()
        };
        assert_eq!(one.selector().unwrap(), UserSelector::MailNickname("jdoe".into()));
    }

    #[test]
    fn empty_argument_is_rejected() {
        let args = UserArguments {
            user_principal_name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            args.selector(),
            Err(ResourceError::Validation { field: "user_principal_name", .. })
        ));
    }

    #[test]
    fn object_id_must_be_uuid() {
        let args = UserArguments {
            object_id: Some("nope".into()),
            ..Default::default()
        };
        assert!(args.selector().unwrap_err().is_validation());
    }

    #[test]
    fn selector_display_names_the_lookup() {
        let selector = UserSelector::UserPrincipalName("jdoe@contoso.com".into());
        assert_eq!(selector.to_string(), "UPN: \"jdoe@contoso.com\"");
        assert_eq!(selector.filter_attribute(), Some("userPrincipalName"));
    }
}
