mod common;

use azdir_client::mock::{CallKind, MockDirectory, RecordedCall};
use azdir_client::{ClientError, DirectoryClient, MEMBER_ID_ATTRIBUTE};
use azdir_lifecycle::{DeleteOutcome, LifecycleError, NamedLocks};
use azdir_resources::{AdministrativeUnitMember, AdministrativeUnitMembers, ResourceError};
use azdir_types::ObjectId;
use common::{attrs, object};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    units: Arc<MockDirectory>,
    objects: Arc<MockDirectory>,
    links: Arc<MockDirectory>,
    members: AdministrativeUnitMembers,
}

fn fixture(links: MockDirectory) -> Fixture {
    common::init_tracing();
    let units = Arc::new(MockDirectory::new("administrative unit"));
    let objects = Arc::new(MockDirectory::new("directory object"));
    let links = Arc::new(links);
    let units_client: Arc<dyn DirectoryClient> = units.clone();
    let objects_client: Arc<dyn DirectoryClient> = objects.clone();
    let links_client: Arc<dyn DirectoryClient> = links.clone();
    let members = AdministrativeUnitMembers::new(
        units_client,
        objects_client,
        links_client,
        Arc::new(NamedLocks::new()),
    );
    Fixture {
        units,
        objects,
        links,
        members,
    }
}

fn links() -> MockDirectory {
    MockDirectory::references("administrative unit member", "member")
}

fn with_unit(f: &Fixture) -> ObjectId {
    let unit = ObjectId::new();
    f.units.insert(object(&unit.to_string(), attrs(json!({"displayName": "Finance"}))));
    unit
}

fn with_member(f: &Fixture) -> ObjectId {
    let member = ObjectId::new();
    f.objects.insert(object(
        &member.to_string(),
        attrs(json!({"@odata.type": "#microsoft.graph.user"})),
    ));
    member
}

#[tokio::test(start_paused = true)]
async fn create_adds_member_and_waits_for_visibility() {
    let f = fixture(links().with_visibility_lag(1));
    let member = AdministrativeUnitMember::new(with_unit(&f), with_member(&f));

    f.members.create(member).await.unwrap();

    assert!(f.links.contains(&member.identity()));
    // probe, one hidden read, three visible reads
    assert_eq!(f.links.calls_of(CallKind::Get).len(), 5);
    let id = member.identity().to_string();
    assert_eq!(f.members.read(&id).await.unwrap(), Some(member));
}

#[tokio::test(start_paused = true)]
async fn missing_unit_is_reported_before_any_mutation() {
    let f = fixture(links());
    let unit = ObjectId::new();
    let member = AdministrativeUnitMember::new(unit, ObjectId::new());

    let err = f.members.create(member).await.unwrap_err();

    assert!(matches!(err, ResourceError::ParentNotFound { id, .. } if id == unit));
    assert!(f.links.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_member_is_reported_before_any_mutation() {
    let f = fixture(links());
    let missing = ObjectId::new();
    let member = AdministrativeUnitMember::new(with_unit(&f), missing);

    let err = f.members.create(member).await.unwrap_err();

    assert!(matches!(err, ResourceError::MemberNotFound { id } if id == missing));
    assert!(f.links.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn member_lookup_failure_is_surfaced() {
    let f = fixture(links());
    let member = AdministrativeUnitMember::new(with_unit(&f), with_member(&f));
    f.objects.fail_next(
        CallKind::Get,
        ClientError::api(403, "Authorization_RequestDenied", "Insufficient privileges"),
    );

    let err = f.members.create(member).await.unwrap_err();

    match err {
        ResourceError::Client { source, .. } => assert_eq!(source.status(), Some(403)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(f.links.mutating_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn existing_membership_must_be_imported() {
    let f = fixture(links());
    let member = AdministrativeUnitMember::new(with_unit(&f), with_member(&f));
    f.members.create(member).await.unwrap();

    let err = f.members.create(member).await.unwrap_err();

    assert!(matches!(
        err,
        ResourceError::Lifecycle(LifecycleError::AlreadyExists { .. })
    ));
    assert_eq!(f.links.calls_of(CallKind::Create).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_is_idempotent() {
    let f = fixture(links().with_deletion_lag(1));
    let member = AdministrativeUnitMember::new(with_unit(&f), with_member(&f));
    f.members.create(member).await.unwrap();

    assert_eq!(f.members.delete(member).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(f.members.delete(member).await.unwrap(), DeleteOutcome::AlreadyGone);
    assert_eq!(f.members.read(&member.identity().to_string()).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn read_rejects_malformed_identity() {
    let f = fixture(links());
    let err = f.members.read("not/a/member").await.unwrap_err();
    assert!(matches!(err, ResourceError::InvalidId(_)));
}

#[tokio::test(start_paused = true)]
async fn imported_identity_must_already_be_canonical() {
    let f = fixture(links());
    let unit = "7d3c1f4a-2b6e-4c9d-8a51-0e2f6b9c3d14";
    let member = "0e2f6b9c-3d14-4a51-8c9d-7d3c1f4a2b6e";

    let upper = format!("{}/member/{}", unit.to_uppercase(), member.to_uppercase());
    assert!(matches!(f.members.read(&upper).await.unwrap_err(), ResourceError::InvalidId(_)));

    let simple = format!("{}/member/{member}", unit.replace('-', ""));
    assert!(matches!(f.members.read(&simple).await.unwrap_err(), ResourceError::InvalidId(_)));

    let canonical = format!("{unit}/member/{member}");
    let parsed = AdministrativeUnitMember::parse(&canonical).unwrap();
    assert_eq!(parsed.identity().as_str(), canonical);
    assert!(f.links.calls().is_empty());
}

/// Member object ID a recorded call is about.
fn member_of(call: &RecordedCall) -> Option<String> {
    if let Some(identity) = &call.identity {
        return identity.as_str().rsplit('/').next().map(str::to_string);
    }
    call.payload
        .as_ref()
        .and_then(|p| p.get(MEMBER_ID_ATTRIBUTE))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn span(calls: &[RecordedCall], member: ObjectId) -> (usize, usize) {
    let member = member.to_string();
    let positions: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| member_of(c).as_deref() == Some(member.as_str()))
        .map(|(i, _)| i)
        .collect();
    (positions[0], positions[positions.len() - 1])
}

#[tokio::test(start_paused = true)]
async fn concurrent_adds_to_one_unit_are_serialized() {
    let f = fixture(links().with_latency(Duration::from_millis(50)));
    let unit = with_unit(&f);
    let a = AdministrativeUnitMember::new(unit, with_member(&f));
    let b = AdministrativeUnitMember::new(unit, with_member(&f));

    let (ra, rb) = tokio::join!(f.members.create(a), f.members.create(b));
    ra.unwrap();
    rb.unwrap();

    let calls = f.links.calls();
    let (a_first, a_last) = span(&calls, a.member_object_id);
    let (b_first, b_last) = span(&calls, b.member_object_id);
    assert!(a_last < b_first || b_last < a_first, "interleaved: {calls:?}");
}
