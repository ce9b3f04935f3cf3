//! Resource lifecycle coordinator.
//!
//! Sequences create/read/update/delete calls against a [`DirectoryClient`]:
//! existence probe before create, parent lock around mutations, and a
//! consistency poll after create and delete so the caller only sees success
//! once the change is visible to subsequent reads.

use crate::changes::AttributeChanges;
use crate::config::{CoordinatorConfig, PollConfig};
use crate::context::OperationContext;
use crate::error::{LifecycleError, LifecycleResult, Operation};
use crate::locks::{NamedLockGuard, NamedLocks};
use crate::poll::{poll_until, Observation, PollError};
use azdir_client::{Attributes, ClientError, ClientResult, DirectoryClient, RemoteObject, RetryPolicy};
use azdir_types::{LockKey, ResourceIdentity};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Input of [`LifecycleCoordinator::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    /// Identity the object will have, when known up front. Enables the
    /// existence probe.
    pub identity: Option<ResourceIdentity>,
    /// Parent lock held for the whole operation.
    pub lock: Option<LockKey>,
    /// Body of the create call.
    pub attributes: Attributes,
}

impl CreateRequest {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            identity: None,
            lock: None,
            attributes,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<ResourceIdentity>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn locked_by(mut self, key: LockKey) -> Self {
        self.lock = Some(key);
        self
    }
}

/// An existing object targeted by update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub identity: ResourceIdentity,
    pub lock: Option<LockKey>,
}

impl ResourceRef {
    pub fn new(identity: impl Into<ResourceIdentity>) -> Self {
        Self {
            identity: identity.into(),
            lock: None,
        }
    }

    #[must_use]
    pub fn locked_by(mut self, key: LockKey) -> Self {
        self.lock = Some(key);
        self
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The object exists.
    Present(RemoteObject),
    /// The object no longer exists; the caller should drop it from state.
    Gone,
}

impl ReadOutcome {
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }

    /// The object, if present.
    #[must_use]
    pub fn into_present(self) -> Option<RemoteObject> {
        match self {
            Self::Present(object) => Some(object),
            Self::Gone => None,
        }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object was deleted and its absence observed.
    Deleted,
    /// The object was already absent.
    AlreadyGone,
}

/// Runs a remote call under the context's deadline.
async fn run_remote<T, F>(ctx: &OperationContext, call: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    ctx.run(call).await.unwrap_or(Err(ClientError::Timeout))
}

/// Coordinates the lifecycle of one directory object type.
pub struct LifecycleCoordinator {
    client: Arc<dyn DirectoryClient>,
    locks: Arc<NamedLocks>,
    config: CoordinatorConfig,
}

impl LifecycleCoordinator {
    /// Creates a coordinator with its own lock registry.
    pub fn new(client: Arc<dyn DirectoryClient>, config: CoordinatorConfig) -> Self {
        Self::with_locks(client, Arc::new(NamedLocks::new()), config)
    }

    /// Creates a coordinator sharing `locks` with other coordinators, so
    /// resource types mutating the same parent serialize against each other.
    pub fn with_locks(
        client: Arc<dyn DirectoryClient>,
        locks: Arc<NamedLocks>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            client,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn DirectoryClient> {
        &self.client
    }

    pub fn locks(&self) -> &Arc<NamedLocks> {
        &self.locks
    }

    /// A context bounded by the configured timeout of `operation`.
    #[must_use]
    pub fn context(&self, operation: Operation) -> OperationContext {
        self.config.context(operation)
    }

    fn remote(
        &self,
        operation: Operation,
        identity: impl ToString,
        source: ClientError,
    ) -> LifecycleError {
        LifecycleError::Remote {
            operation,
            resource_type: self.config.resource_type.clone(),
            identity: identity.to_string(),
            source,
        }
    }

    async fn lock(
        &self,
        key: Option<&LockKey>,
        ctx: &OperationContext,
    ) -> LifecycleResult<Option<NamedLockGuard>> {
        match key {
            Some(key) => Ok(Some(self.locks.acquire_until(key, ctx).await?)),
            None => Ok(None),
        }
    }

    /// Creates an object and waits until it is visible.
    ///
    /// When the request carries an identity, the object is probed first and
    /// an existing object fails with [`LifecycleError::AlreadyExists`]
    /// without any mutating call.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ConsistencyTimeout`] means the create call succeeded
    /// but the object did not settle in time; it may exist remotely.
    #[instrument(skip(self, ctx, request), fields(resource_type = %self.config.resource_type))]
    pub async fn create(
        &self,
        ctx: &OperationContext,
        request: CreateRequest,
    ) -> LifecycleResult<RemoteObject> {
        let _guard = self.lock(request.lock.as_ref(), ctx).await?;

        if let Some(identity) = &request.identity {
            match run_remote(ctx, self.client.get(identity, RetryPolicy::Disabled)).await {
                Ok(_) => {
                    return Err(LifecycleError::AlreadyExists {
                        resource_type: self.config.resource_type.clone(),
                        identity: identity.clone(),
                    });
                }
                Err(e) if e.is_not_found() => {
                    debug!("{} {} does not exist yet", self.config.resource_type, identity);
                }
                Err(e) => {
                    return Err(self.remote(Operation::Create, identity, e));
                }
            }
        }

        let label = request
            .identity
            .as_ref()
            .map_or_else(|| self.config.resource_type.clone(), ToString::to_string);
        let mut created = run_remote(
            ctx,
            self.client.create(&request.attributes, RetryPolicy::Standard),
        )
        .await
        .map_err(|e| self.remote(Operation::Create, &label, e))?
        .value;

        if let Some(identity) = request.identity {
            created.id = identity;
        }
        info!("Created {} {}", self.config.resource_type, created.id);

        self.wait_for(
            ctx,
            Operation::Create,
            &created.id,
            &self.config.visibility,
            Observation::Present,
        )
        .await?;

        Ok(created)
    }

    /// Fetches an object. A 404 is reported as [`ReadOutcome::Gone`].
    #[instrument(skip(self, ctx), fields(resource_type = %self.config.resource_type))]
    pub async fn read(
        &self,
        ctx: &OperationContext,
        identity: &ResourceIdentity,
    ) -> LifecycleResult<ReadOutcome> {
        match run_remote(ctx, self.client.get(identity, RetryPolicy::Standard)).await {
            Ok(response) => Ok(ReadOutcome::Present(response.value)),
            Err(e) if e.is_not_found() => {
                warn!(
                    "{} {} was not found - removing from state",
                    self.config.resource_type, identity
                );
                Ok(ReadOutcome::Gone)
            }
            Err(e) => Err(self.remote(Operation::Read, identity, e)),
        }
    }

    /// Sends only the changed attributes. An empty change set makes no call.
    #[instrument(skip(self, ctx, target, changes), fields(resource_type = %self.config.resource_type, identity = %target.identity))]
    pub async fn update(
        &self,
        ctx: &OperationContext,
        target: &ResourceRef,
        changes: &AttributeChanges,
    ) -> LifecycleResult<()> {
        if changes.is_empty() {
            debug!("No changes to send for {}", target.identity);
            return Ok(());
        }

        let _guard = self.lock(target.lock.as_ref(), ctx).await?;
        let payload = changes.to_payload();
        run_remote(
            ctx,
            self.client
                .update(&target.identity, &payload, RetryPolicy::Standard),
        )
        .await
        .map_err(|e| self.remote(Operation::Update, &target.identity, e))?;

        info!(
            "Updated {} {} ({} attributes)",
            self.config.resource_type,
            target.identity,
            changes.len()
        );
        Ok(())
    }

    /// Deletes an object and waits until it is gone. Deleting an absent
    /// object succeeds with [`DeleteOutcome::AlreadyGone`].
    #[instrument(skip(self, ctx, target), fields(resource_type = %self.config.resource_type, identity = %target.identity))]
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        target: &ResourceRef,
    ) -> LifecycleResult<DeleteOutcome> {
        let _guard = self.lock(target.lock.as_ref(), ctx).await?;

        match run_remote(
            ctx,
            self.client.delete(&target.identity, RetryPolicy::Standard),
        )
        .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!("{} {} was already gone", self.config.resource_type, target.identity);
                return Ok(DeleteOutcome::AlreadyGone);
            }
            Err(e) => return Err(self.remote(Operation::Delete, &target.identity, e)),
        }

        self.wait_for(
            ctx,
            Operation::Delete,
            &target.identity,
            &self.config.deletion,
            Observation::Absent,
        )
        .await?;

        info!("Deleted {} {}", self.config.resource_type, target.identity);
        Ok(DeleteOutcome::Deleted)
    }

    /// Polls the object until `target` settles.
    async fn wait_for(
        &self,
        ctx: &OperationContext,
        operation: Operation,
        identity: &ResourceIdentity,
        config: &PollConfig,
        target: Observation,
    ) -> LifecycleResult<()> {
        let client = &self.client;
        let result = poll_until(ctx, config, target, || async move {
            match client.get(identity, RetryPolicy::Disabled).await {
                Ok(_) => Ok(Observation::Present),
                Err(e) if e.is_not_found() => Ok(Observation::Absent),
                Err(e) => Err(e),
            }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Probe(source)) => Err(self.remote(operation, identity, source)),
            Err(PollError::Timeout { waited, attempts }) => {
                warn!(
                    "Gave up waiting for {} {} after {} attempts",
                    self.config.resource_type, identity, attempts
                );
                Err(LifecycleError::ConsistencyTimeout {
                    operation,
                    resource_type: self.config.resource_type.clone(),
                    identity: identity.clone(),
                    target: match target {
                        Observation::Present => "become visible",
                        Observation::Absent => "be deleted",
                    },
                    waited,
                })
            }
        }
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("object_type", &self.client.object_type())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
