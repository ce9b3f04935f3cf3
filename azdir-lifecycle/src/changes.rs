//! Partial-update payloads.
//!
//! An update must only send attributes the caller actually changed, or it
//! would overwrite values managed elsewhere. Changes are keyed by dotted
//! paths (`web.implicitGrantSettings.enableIdTokenIssuance`) and expanded into
//! nested objects when the payload is built.

use azdir_client::Attributes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Set of changed attributes, keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeChanges {
    changes: BTreeMap<String, Value>,
}

impl AttributeChanges {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the values of the flagged paths from `desired`. A flagged path
    /// missing from `desired` is sent as `null`.
    pub fn from_flagged<'a>(
        desired: &Attributes,
        changed: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut changes = Self::new();
        for path in changed {
            let value = lookup(desired, path).cloned().unwrap_or(Value::Null);
            changes.set(path, value);
        }
        changes
    }

    /// Flags every path in `paths` whose value differs between `prior` and
    /// `desired`.
    pub fn diff<'a>(
        prior: &Attributes,
        desired: &Attributes,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut changes = Self::new();
        for path in paths {
            let before = lookup(prior, path).unwrap_or(&Value::Null);
            let after = lookup(desired, path).unwrap_or(&Value::Null);
            if before != after {
                changes.set(path, after.clone());
            }
        }
        changes
    }

    /// Records a change.
    pub fn set(&mut self, path: impl Into<String>, value: Value) -> &mut Self {
        self.changes.insert(path.into(), value);
        self
    }

    /// Changed paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Builds the request body, expanding dotted paths into nested objects.
    #[must_use]
    pub fn to_payload(&self) -> Attributes {
        let mut payload = Map::new();
        for (path, value) in &self.changes {
            let mut segments: Vec<&str> = path.split('.').collect();
            let Some(leaf) = segments.pop() else {
                continue;
            };

            let mut current = &mut payload;
            for segment in segments {
                let slot = current
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                let Value::Object(next) = slot else {
                    unreachable!("slot was just made an object");
                };
                current = next;
            }
            current.insert(leaf.to_string(), value.clone());
        }
        payload
    }
}

/// Looks up a dotted path in an attribute map.
pub fn lookup<'a>(attributes: &'a Attributes, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = attributes.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}
