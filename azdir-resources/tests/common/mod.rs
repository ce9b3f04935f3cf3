//! Shared test helpers for resource tests.

#![allow(dead_code)]

use azdir_client::{Attributes, RemoteObject};
use serde_json::Value;

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
