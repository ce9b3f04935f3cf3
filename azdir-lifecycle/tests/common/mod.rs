//! Shared test helpers for lifecycle tests.

#![allow(dead_code)]

use azdir_client::mock::{MockDirectory, RecordedCall};
use azdir_client::{Attributes, DirectoryClient, RemoteObject};
use azdir_lifecycle::{CoordinatorConfig, LifecycleCoordinator, NamedLocks};
use serde_json::Value;
use std::sync::Arc;

/// Installs a subscriber honouring `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Converts a JSON object literal into an attribute map.
pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A remote object whose `id` attribute matches its identity.
pub fn object(id: &str, mut attributes: Attributes) -> RemoteObject {
    attributes.insert("id".to_string(), Value::String(id.to_string()));
    RemoteObject::new(id, attributes)
}

/// Coordinator over `mock` with default polling.
pub fn coordinator(mock: &Arc<MockDirectory>) -> LifecycleCoordinator {
    let client: Arc<dyn DirectoryClient> = mock.clone();
    LifecycleCoordinator::new(client, CoordinatorConfig::new("azuread_application"))
}

/// Coordinator over `mock` sharing `locks`.
pub fn coordinator_with_locks(
    mock: &Arc<MockDirectory>,
    locks: Arc<NamedLocks>,
) -> LifecycleCoordinator {
    let client: Arc<dyn DirectoryClient> = mock.clone();
    LifecycleCoordinator::with_locks(client, locks, CoordinatorConfig::new("azuread_application"))
}

/// Identity a recorded call is about: its target, or the `id` in its payload.
pub fn call_owner(call: &RecordedCall) -> Option<String> {
    if let Some(identity) = &call.identity {
        return Some(identity.to_string());
    }
    call.payload
        .as_ref()
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Indices in `calls` of the calls about `owner`.
pub fn positions(calls: &[RecordedCall], owner: &str) -> Vec<usize> {
    calls
        .iter()
        .enumerate()
        .filter(|(_, c)| call_owner(c).as_deref() == Some(owner))
        .map(|(i, _)| i)
        .collect()
}
