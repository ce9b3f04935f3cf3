//! In-memory directory for testing.
//!
//! `MockDirectory` behaves like an eventually-consistent directory: newly
//! created objects can stay invisible for a configurable number of reads and
//! deleted objects can linger the same way. Every call is recorded so tests
//! can assert on what was sent.

use crate::client::{ApiResponse, Attributes, DirectoryClient, RemoteObject, RetryPolicy};
use crate::error::{ClientError, ClientResult};
use crate::graph::{MEMBER_ID_ATTRIBUTE, PARENT_ID_ATTRIBUTE};
use crate::query::{Direction, Query};
use async_trait::async_trait;
use azdir_types::ResourceIdentity;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Kind of call made against the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Get,
    Create,
    Update,
    Delete,
    List,
    Invoke,
}

impl CallKind {
    /// Create, update, delete and bound actions.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete | Self::Invoke)
    }
}

/// A call as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub identity: Option<ResourceIdentity>,
    pub payload: Option<Attributes>,
    /// Action name of an [`CallKind::Invoke`] call.
    pub action: Option<String>,
    pub retry: RetryPolicy,
}

#[derive(Debug)]
struct Entry {
    object: RemoteObject,
    /// Reads that still answer 404 after creation.
    hidden_reads: u32,
    /// Reads that still return the object after deletion.
    lingering_reads: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ResourceIdentity, Entry>,
    calls: Vec<RecordedCall>,
    failures: HashMap<CallKind, VecDeque<ClientError>>,
}

/// In-memory [`DirectoryClient`].
#[derive(Debug)]
pub struct MockDirectory {
    object_type: String,
    reference_kind: Option<String>,
    visibility_lag: u32,
    deletion_lag: u32,
    latency: Duration,
    server_attributes: Attributes,
    state: Mutex<State>,
}

impl MockDirectory {
    /// Creates an empty, immediately consistent directory.
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            reference_kind: None,
            visibility_lag: 0,
            deletion_lag: 0,
            latency: Duration::ZERO,
            server_attributes: Attributes::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a directory of `$ref` links; created objects get
    /// `{parent}/{kind}/{member}` identities built from
    /// [`PARENT_ID_ATTRIBUTE`] and [`MEMBER_ID_ATTRIBUTE`].
    pub fn references(object_type: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            reference_kind: Some(kind.into()),
            ..Self::new(object_type)
        }
    }

    /// Number of reads answering 404 after an object is created.
    #[must_use]
    pub fn with_visibility_lag(mut self, reads: u32) -> Self {
        self.visibility_lag = reads;
        self
    }

    /// Number of reads still returning an object after it is deleted.
    #[must_use]
    pub fn with_deletion_lag(mut self, reads: u32) -> Self {
        self.deletion_lag = reads;
        self
    }

    /// Simulated latency of every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Attributes the server fills in on every created object, such as a
    /// request status.
    #[must_use]
    pub fn with_server_attributes(mut self, attributes: Attributes) -> Self {
        self.server_attributes = attributes;
        self
    }

    /// Seeds a visible object.
    pub fn insert(&self, object: RemoteObject) {
        self.state.lock().unwrap().objects.insert(
            object.id.clone(),
            Entry {
                object,
                hidden_reads: 0,
                lingering_reads: None,
            },
        );
    }

    /// Whether an object exists and has not been deleted, regardless of
    /// replication lag.
    pub fn contains(&self, id: &ResourceIdentity) -> bool {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(id)
            .is_some_and(|e| e.lingering_reads.is_none())
    }

    /// Stored attributes of an object.
    pub fn attributes(&self, id: &ResourceIdentity) -> Option<Attributes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(id)
            .map(|e| e.object.attributes.clone())
    }

    /// Makes the next call of `kind` fail with `error`.
    pub fn fail_next(&self, kind: CallKind, error: ClientError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls of one kind.
    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    /// Number of create/update/delete calls.
    pub fn mutating_call_count(&self) -> usize {
        self.calls().iter().filter(|c| c.kind.is_mutating()).count()
    }

    async fn begin(
        &self,
        kind: CallKind,
        identity: Option<&ResourceIdentity>,
        payload: Option<&Attributes>,
        retry: RetryPolicy,
    ) -> ClientResult<()> {
        self.record(RecordedCall {
            kind,
            identity: identity.cloned(),
            payload: payload.cloned(),
            action: None,
            retry,
        })
        .await
    }

    async fn record(&self, call: RecordedCall) -> ClientResult<()> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            let kind = call.kind;
            state.calls.push(call);
            state.failures.get_mut(&kind).and_then(VecDeque::pop_front)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn identity_for(&self, attributes: &Attributes) -> ResourceIdentity {
        if let Some(id) = attributes.get("id").and_then(Value::as_str) {
            return ResourceIdentity::new(id);
        }
        if let (Some(kind), Some(parent), Some(member)) = (
            &self.reference_kind,
            attributes.get(PARENT_ID_ATTRIBUTE).and_then(Value::as_str),
            attributes.get(MEMBER_ID_ATTRIBUTE).and_then(Value::as_str),
        ) {
            return ResourceIdentity::new(format!("{parent}/{kind}/{member}"));
        }
        ResourceIdentity::new(uuid::Uuid::new_v4().to_string())
    }
}

fn merge(target: &mut Attributes, changes: &Attributes) {
    for (key, value) in changes {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge(existing, nested),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Parses the `field eq 'value' and ...` filters produced by [`Query::eq`]
/// and [`Query::and_eq`].
fn parse_eq_filter(filter: &str) -> Option<Vec<(&str, String)>> {
    let mut clauses = Vec::new();
    let mut rest = filter.trim();
    loop {
        let (field, after) = rest.split_once(" eq '")?;
        let mut value = String::new();
        let mut chars = after.char_indices().peekable();
        let end = loop {
            let (i, c) = chars.next()?;
            if c != '\'' {
                value.push(c);
            } else if chars.peek().is_some_and(|(_, next)| *next == '\'') {
                chars.next();
                value.push('\'');
            } else {
                break i + 1;
            }
        };
        clauses.push((field.trim(), value));

        let tail = after[end..].trim_start();
        if tail.is_empty() {
            return Some(clauses);
        }
        rest = tail.strip_prefix("and ")?;
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    fn object_type(&self) -> &str {
        &self.object_type
    }

    async fn get(
        &self,
        id: &ResourceIdentity,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>> {
        self.begin(CallKind::Get, Some(id), None, retry).await?;

        let mut state = self.state.lock().unwrap();
        let not_found = || ClientError::not_found(format!("{} {id} does not exist", self.object_type));
        let entry = state.objects.get_mut(id).ok_or_else(not_found)?;

        if entry.hidden_reads > 0 {
            entry.hidden_reads -= 1;
            return Err(not_found());
        }
        let lingering = entry.lingering_reads;
        match lingering {
            Some(0) => {
                state.objects.remove(id);
                Err(not_found())
            }
            Some(n) => {
                entry.lingering_reads = Some(n - 1);
                Ok(ApiResponse::new(entry.object.clone(), 200))
            }
            None => Ok(ApiResponse::new(entry.object.clone(), 200)),
        }
    }

    async fn create(
        &self,
        attributes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>> {
        self.begin(CallKind::Create, None, Some(attributes), retry).await?;

        let id = self.identity_for(attributes);
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&id) {
            return Err(ClientError::api(
                400,
                "Request_BadRequest",
                "One or more added object references already exist",
            ));
        }

        let mut stored = attributes.clone();
        for (key, value) in &self.server_attributes {
            stored.insert(key.clone(), value.clone());
        }
        stored.insert("id".to_string(), Value::String(id.to_string()));
        let object = RemoteObject::new(id.clone(), stored);
        state.objects.insert(
            id,
            Entry {
                object: object.clone(),
                hidden_reads: self.visibility_lag,
                lingering_reads: None,
            },
        );
        Ok(ApiResponse::new(object, 201))
    }

    async fn update(
        &self,
        id: &ResourceIdentity,
        changes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<u16> {
        self.begin(CallKind::Update, Some(id), Some(changes), retry).await?;

        let mut state = self.state.lock().unwrap();
        match state.objects.get_mut(id) {
            Some(entry) if entry.lingering_reads.is_none() => {
                merge(&mut entry.object.attributes, changes);
                Ok(204)
            }
            _ => Err(ClientError::not_found(format!(
                "{} {id} does not exist",
                self.object_type
            ))),
        }
    }

    async fn delete(&self, id: &ResourceIdentity, retry: RetryPolicy) -> ClientResult<u16> {
        self.begin(CallKind::Delete, Some(id), None, retry).await?;

        let mut state = self.state.lock().unwrap();
        let deletion_lag = self.deletion_lag;
        match state.objects.get_mut(id) {
            Some(entry) if entry.lingering_reads.is_none() => {
                if deletion_lag == 0 {
                    state.objects.remove(id);
                } else {
                    entry.lingering_reads = Some(deletion_lag);
                }
                Ok(204)
            }
            _ => Err(ClientError::not_found(format!(
                "{} {id} does not exist",
                self.object_type
            ))),
        }
    }

    async fn list(
        &self,
        query: &Query,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<Vec<RemoteObject>>> {
        self.begin(CallKind::List, None, None, retry).await?;

        let clauses = match query.filter.as_deref() {
            Some(filter) => parse_eq_filter(filter).ok_or_else(|| {
                ClientError::api(400, "BadRequest", format!("unsupported filter: {filter}"))
            })?,
            None => Vec::new(),
        };

        let state = self.state.lock().unwrap();
        let mut objects: Vec<RemoteObject> = state
            .objects
            .values()
            .filter(|e| e.hidden_reads == 0 && e.lingering_reads.is_none())
            .map(|e| e.object.clone())
            .filter(|o| {
                clauses
                    .iter()
                    .all(|(field, value)| o.str_attr(field) == Some(value.as_str()))
            })
            .collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(order) = &query.order_by {
            objects.sort_by(|a, b| {
                let ordering = a.str_attr(&order.field).cmp(&b.str_attr(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        Ok(ApiResponse::new(objects, 200))
    }

    async fn invoke(
        &self,
        id: &ResourceIdentity,
        action: &str,
        retry: RetryPolicy,
    ) -> ClientResult<u16> {
        self.record(RecordedCall {
            kind: CallKind::Invoke,
            identity: Some(id.clone()),
            payload: None,
            action: Some(action.to_string()),
            retry,
        })
        .await?;

        let state = self.state.lock().unwrap();
        match state.objects.get(id) {
            Some(entry) if entry.lingering_reads.is_none() => Ok(204),
            _ => Err(ClientError::not_found(format!(
                "{} {id} does not exist",
                self.object_type
            ))),
        }
    }
}
