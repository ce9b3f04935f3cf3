mod common;

use azdir_client::mock::{CallKind, MockDirectory};
use azdir_client::DirectoryClient;
use azdir_lifecycle::{DeleteOutcome, NamedLocks};
use azdir_resources::{ApplicationRegistration, ApplicationRegistrations, ResourceError};
use common::attrs;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn setup() -> (Arc<MockDirectory>, ApplicationRegistrations) {
    common::init_tracing();
    let mock = Arc::new(MockDirectory::new("application"));
    let client: Arc<dyn DirectoryClient> = mock.clone();
    let apps = ApplicationRegistrations::new(client, Arc::new(NamedLocks::new()));
    (mock, apps)
}

fn model() -> ApplicationRegistration {
    ApplicationRegistration {
        description: "Payroll".into(),
        notes: "owned by finance".into(),
        marketing_url: "https://contoso.com/payroll".into(),
        support_url: "https://contoso.com/support".into(),
        group_membership_claims: ["SecurityGroup".to_string()].into(),
        ..ApplicationRegistration::new("payroll")
    }
}

#[tokio::test(start_paused = true)]
async fn create_returns_directory_state() {
    let (mock, apps) = setup();
    let desired = model();

    let created = apps.create(&desired).await.unwrap();

    let object_id = created.object_id.expect("object ID assigned");
    assert_eq!(
        created,
        ApplicationRegistration {
            object_id: Some(object_id),
            ..desired
        }
    );
    let sent = &mock.calls_of(CallKind::Create)[0];
    let payload = sent.payload.as_ref().unwrap();
    assert_eq!(payload["info"]["marketingUrl"], json!("https://contoso.com/payroll"));
    assert_eq!(payload["info"]["privacyStatementUrl"], json!(null));
    assert_eq!(payload["groupMembershipClaims"], json!("SecurityGroup"));
}

#[tokio::test(start_paused = true)]
async fn read_rebuilds_the_model() {
    let (_mock, apps) = setup();
    let created = apps.create(&model()).await.unwrap();

    let read = apps.read(created.object_id.unwrap()).await.unwrap();
    assert_eq!(read, Some(created));
}

#[tokio::test(start_paused = true)]
async fn update_sends_only_changed_paths() {
    let (mock, apps) = setup();
    let prior = apps.create(&model()).await.unwrap();

    let desired = ApplicationRegistration {
        support_url: "https://help.contoso.com".into(),
        notes: String::new(),
        implicit_id_token_issuance_enabled: true,
        ..prior.clone()
    };
    apps.update(&prior, &desired).await.unwrap();

    let updates = mock.calls_of(CallKind::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].payload,
        Some(attrs(json!({
            "notes": null,
            "info": {"supportUrl": "https://help.contoso.com"},
            "web": {"implicitGrantSettings": {"enableIdTokenIssuance": true}}
        })))
    );

    let read = apps.read(prior.object_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(read.marketing_url, "https://contoso.com/payroll");
    assert_eq!(read.support_url, "https://help.contoso.com");
    assert!(read.notes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unchanged_update_makes_no_call() {
    let (mock, apps) = setup();
    let prior = apps.create(&model()).await.unwrap();

    apps.update(&prior, &prior.clone()).await.unwrap();
    assert!(mock.calls_of(CallKind::Update).is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_model_makes_no_call() {
    let (mock, apps) = setup();
    let invalid = ApplicationRegistration {
        sign_in_audience: "Everyone".into(),
        ..model()
    };

    let err = apps.create(&invalid).await.unwrap_err();
    assert!(matches!(err, ResourceError::Validation { field: "sign_in_audience", .. }));
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_then_read_is_gone() {
    let (_mock, apps) = setup();
    let created = apps.create(&model()).await.unwrap();
    let object_id = created.object_id.unwrap();

    assert_eq!(apps.delete(object_id).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(apps.read(object_id).await.unwrap(), None);
    assert_eq!(apps.delete(object_id).await.unwrap(), DeleteOutcome::AlreadyGone);
}

#[tokio::test(start_paused = true)]
async fn update_requires_object_id() {
    let (_mock, apps) = setup();
    let err = apps.update(&model(), &model()).await.unwrap_err();
    assert!(matches!(err, ResourceError::InvalidResponse(_)));
}
