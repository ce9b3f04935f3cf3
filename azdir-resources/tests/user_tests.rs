mod common;

use azdir_client::mock::{CallKind, MockDirectory};
use azdir_client::{ClientError, DirectoryClient, RemoteObject, RetryPolicy};
use azdir_resources::{ResourceError, UserArguments, UserLookup, UserSelector};
use azdir_types::ObjectId;
use common::{attrs, object};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    users: Arc<MockDirectory>,
    managers: Arc<MockDirectory>,
    lookup: UserLookup,
}

fn fixture() -> Fixture {
    common::init_tracing();
    let users = Arc::new(MockDirectory::new("user"));
    let managers = Arc::new(MockDirectory::new("manager"));
    let users_client: Arc<dyn DirectoryClient> = users.clone();
    let managers_client: Arc<dyn DirectoryClient> = managers.clone();
    Fixture {
        lookup: UserLookup::new(users_client, managers_client),
        users,
        managers,
    }
}

fn add_user(f: &Fixture, upn: &str, mail: &str) -> ObjectId {
    let id = ObjectId::new();
    f.users.insert(object(
        &id.to_string(),
        attrs(json!({
            "userPrincipalName": upn,
            "mail": mail,
            "mailNickname": upn.split('@').next().unwrap(),
            "displayName": "Test User",
            "accountEnabled": true,
            "otherMails": ["alt@contoso.com"],
            "employeeOrgData": {"costCenter": "CC-1", "division": "Retail"}
        })),
    ));
    id
}

fn set_manager(f: &Fixture, user: ObjectId, manager: ObjectId) {
    f.managers.insert(RemoteObject::new(
        user,
        attrs(json!({"id": manager.to_string()})),
    ));
}

#[tokio::test]
async fn finds_user_by_principal_name_with_quote() {
    let f = fixture();
    let id = add_user(&f, "o'neil@contoso.com", "oneil@contoso.com");
    add_user(&f, "jdoe@contoso.com", "jdoe@contoso.com");
    let manager = ObjectId::new();
    set_manager(&f, id, manager);

    let user = f
        .lookup
        .find(&UserSelector::UserPrincipalName("o'neil@contoso.com".into()))
        .await
        .unwrap();

    assert_eq!(user.object_id, id);
    assert_eq!(user.mail_nickname, "o'neil");
    assert_eq!(user.cost_center, "CC-1");
    assert_eq!(user.other_mails, vec!["alt@contoso.com".to_string()]);
    assert!(user.account_enabled);
    assert_eq!(user.manager_id, Some(manager));
}

#[tokio::test]
async fn lookups_never_retry() {
    let f = fixture();
    let id = add_user(&f, "jdoe@contoso.com", "jdoe@contoso.com");

    f.lookup.find(&UserSelector::ObjectId(id)).await.unwrap();

    let calls: Vec<_> = f.users.calls().into_iter().chain(f.managers.calls()).collect();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|c| c.retry == RetryPolicy::Disabled));
}

#[tokio::test]
async fn missing_manager_is_not_an_error() {
    let f = fixture();
    let id = add_user(&f, "jdoe@contoso.com", "jdoe@contoso.com");

    let user = f.lookup.find(&UserSelector::ObjectId(id)).await.unwrap();
    assert_eq!(user.manager_id, None);
}

#[tokio::test]
async fn manager_lookup_failure_is_surfaced() {
    let f = fixture();
    let id = add_user(&f, "jdoe@contoso.com", "jdoe@contoso.com");
    f.managers
        .fail_next(CallKind::Get, ClientError::api(500, "InternalServerError", "boom"));

    let err = f.lookup.find(&UserSelector::ObjectId(id)).await.unwrap_err();
    assert!(matches!(err, ResourceError::Client { ref source, .. } if source.status() == Some(500)));
}

#[tokio::test]
async fn shared_mail_is_ambiguous() {
    let f = fixture();
    add_user(&f, "a@contoso.com", "shared@contoso.com");
    add_user(&f, "b@contoso.com", "shared@contoso.com");

    let err = f
        .lookup
        .find(&UserSelector::Mail("shared@contoso.com".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::Ambiguous(_)));
}

#[tokio::test]
async fn no_match_is_not_found() {
    let f = fixture();
    add_user(&f, "a@contoso.com", "a@contoso.com");

    let err = f
        .lookup
        .find(&UserSelector::EmployeeId("E-404".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(ref m) if m.contains("employee ID")));

    let err = f
        .lookup
        .find(&UserSelector::ObjectId(ObjectId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));
}

#[tokio::test]
async fn arguments_resolve_to_selector() {
    let f = fixture();
    let id = add_user(&f, "jdoe@contoso.com", "jdoe@contoso.com");
    let args: UserArguments = serde_json::from_value(json!({"mail_nickname": "jdoe"})).unwrap();

    let user = f.lookup.find(&args.selector().unwrap()).await.unwrap();
    assert_eq!(user.object_id, id);
}
