//! Microsoft Graph implementation of [`DirectoryClient`].
//!
//! One `GraphDirectoryClient` serves one object type. Clients for different
//! object types share the HTTP connection pool and the access token through
//! [`GraphDirectoryClient::for_endpoint`].

use crate::client::{ApiResponse, Attributes, DirectoryClient, RemoteObject, RetryPolicy};
use crate::error::{ClientError, ClientResult};
use crate::query::Query;
use async_trait::async_trait;
use azdir_types::{ObjectId, ResourceIdentity, SubResourceId};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Attribute naming the parent object when creating a reference.
pub const PARENT_ID_ATTRIBUTE: &str = "parentObjectId";

/// Attribute naming the referenced object when creating a reference.
pub const MEMBER_ID_ATTRIBUTE: &str = "memberObjectId";

/// Graph client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URL of the Graph endpoint (e.g. `https://graph.microsoft.com`).
    pub api_base_url: String,
    /// API version path segment.
    pub api_version: String,
    /// Maximum retries for throttled or transient responses.
    pub max_retries: u32,
    /// Initial backoff for transient errors, doubled on each retry (ms).
    pub retry_base_delay_ms: u64,
    /// Per-request timeout (seconds).
    pub request_timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://graph.microsoft.com".to_string(),
            api_version: "v1.0".to_string(),
            max_retries: 5,
            retry_base_delay_ms: 1_000,
            request_timeout_secs: 30,
        }
    }
}

/// Where an object type lives in the Graph URL space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A top-level collection such as `applications` or `users`.
    Collection { path: String },
    /// `$ref` links from a parent collection, e.g.
    /// `administrativeUnits/{id}/members`. Identities are
    /// [`SubResourceId`]s whose middle segment is `kind`.
    References {
        parent: String,
        relationship: String,
        kind: String,
    },
    /// A single-valued navigation property such as `users/{id}/manager`.
    /// Identities are those of the source object; only `get` is supported.
    Related { path: String, relationship: String },
}

impl Endpoint {
    pub fn collection(path: impl Into<String>) -> Self {
        Self::Collection { path: path.into() }
    }

    pub fn references(
        parent: impl Into<String>,
        relationship: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self::References {
            parent: parent.into(),
            relationship: relationship.into(),
            kind: kind.into(),
        }
    }

    pub fn related(path: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self::Related {
            path: path.into(),
            relationship: relationship.into(),
        }
    }
}

/// `OData` error response.
#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    message: String,
}

/// One page of a collection response.
#[derive(Debug, Deserialize)]
struct ODataPage {
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Directory client backed by the Microsoft Graph REST API.
#[derive(Debug, Clone)]
pub struct GraphDirectoryClient {
    object_type: String,
    endpoint: Endpoint,
    config: GraphConfig,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl GraphDirectoryClient {
    /// Creates a client for one object type.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        object_type: impl Into<String>,
        endpoint: Endpoint,
        config: GraphConfig,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            object_type: object_type.into(),
            endpoint,
            config,
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns a client for another object type sharing this client's
    /// connection pool, configuration and token.
    #[must_use]
    pub fn for_endpoint(&self, object_type: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            object_type: object_type.into(),
            endpoint,
            config: self.config.clone(),
            http: self.http.clone(),
            token: Arc::clone(&self.token),
        }
    }

    /// Sets the bearer token used for every request.
    pub async fn set_token(&self, access_token: impl Into<String>) {
        *self.token.write().await = Some(access_token.into());
    }

    /// Base URL including the API version.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    async fn access_token(&self) -> ClientResult<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::Auth("no access token configured".to_string()))
    }

    fn object_url(&self, id: &ResourceIdentity) -> ClientResult<String> {
        match &self.endpoint {
            Endpoint::Collection { path } => Ok(format!("{}/{path}/{id}", self.base_url())),
            Endpoint::References {
                parent,
                relationship,
                kind,
            } => {
                let sub = SubResourceId::parse(id.as_str(), kind)?;
                Ok(format!(
                    "{}/{parent}/{}/{relationship}/{}",
                    self.base_url(),
                    sub.parent(),
                    sub.child()
                ))
            }
            Endpoint::Related { path, relationship } => {
                Ok(format!("{}/{path}/{id}/{relationship}", self.base_url()))
            }
        }
    }

    fn unsupported(&self, operation: &'static str) -> ClientError {
        ClientError::Unsupported {
            object_type: self.object_type.clone(),
            operation,
        }
    }

    /// Sends a request, retrying throttled and transient responses when the
    /// policy allows it.
    #[instrument(skip(self, body), fields(object_type = %self.object_type))]
    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
        retry: RetryPolicy,
    ) -> ClientResult<(u16, Option<Value>)> {
        let mut throttle_retries = 0u32;
        let mut transient_retries = 0u32;
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);

        loop {
            let token = self.access_token().await?;

            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(&token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS
                && retry.allows_retry()
                && throttle_retries < self.config.max_retries
            {
                let wait = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map_or(delay, Duration::from_secs);
                throttle_retries += 1;
                warn!(
                    "Throttled, retry {}/{} after {:?}",
                    throttle_retries, self.config.max_retries, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if matches!(
                status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ) && retry.allows_retry()
                && transient_retries < self.config.max_retries
            {
                transient_retries += 1;
                warn!(
                    "Transient error {}, retry {}/{} after {:?}",
                    status, transient_retries, self.config.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if status.is_success() {
                let text = response.text().await?;
                let body = if text.trim().is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(&text)?)
                };
                return Ok((status.as_u16(), body));
            }

            let error_body = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Could not read error body of {} response: {}", status, e);
                    String::new()
                }
            };
            debug!("Request failed with {}: {}", status, error_body);
            if let Ok(odata_error) = serde_json::from_str::<ODataError>(&error_body) {
                return Err(ClientError::api(
                    status.as_u16(),
                    odata_error.error.code,
                    odata_error.error.message,
                ));
            }
            return Err(ClientError::api(
                status.as_u16(),
                status.to_string(),
                error_body,
            ));
        }
    }
}

fn require_body(body: Option<Value>) -> ClientResult<Value> {
    body.ok_or_else(|| ClientError::InvalidResponse("empty response body".to_string()))
}

fn object_attribute(attributes: &Attributes, name: &str) -> ClientResult<ObjectId> {
    let value = attributes
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::InvalidResponse(format!("missing attribute {name:?}")))?;
    Ok(ObjectId::parse(value)?)
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
    fn object_type(&self) -> &str {
        &self.object_type
    }

    async fn get(
        &self,
        id: &ResourceIdentity,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>> {
        let url = self.object_url(id)?;
        let (status, body) = self.send(Method::GET, &url, &[], None, retry).await?;
        let object = match (&self.endpoint, require_body(body)?) {
            (Endpoint::References { .. }, Value::Object(attributes)) => {
                RemoteObject::new(id.clone(), attributes)
            }
            (_, value) => RemoteObject::from_value(value)?,
        };
        Ok(ApiResponse::new(object, status))
    }

    async fn create(
        &self,
        attributes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<RemoteObject>> {
        match &self.endpoint {
            Endpoint::Collection { path } => {
                let url = format!("{}/{path}", self.base_url());
                let body = Value::Object(attributes.clone());
                let (status, body) = self.send(Method::POST, &url, &[], Some(&body), retry).await?;
                Ok(ApiResponse::new(
                    RemoteObject::from_value(require_body(body)?)?,
                    status,
                ))
            }
            Endpoint::References {
                parent,
                relationship,
                kind,
            } => {
                let parent_id = object_attribute(attributes, PARENT_ID_ATTRIBUTE)?;
                let member_id = object_attribute(attributes, MEMBER_ID_ATTRIBUTE)?;
                let url = format!(
                    "{}/{parent}/{parent_id}/{relationship}/$ref",
                    self.base_url()
                );
                let body = json!({
                    "@odata.id": format!("{}/directoryObjects/{member_id}", self.base_url()),
                });
                let (status, _) = self.send(Method::POST, &url, &[], Some(&body), retry).await?;
                let id = SubResourceId::new(parent_id, kind.as_str(), member_id);
                Ok(ApiResponse::new(
                    RemoteObject::new(id, attributes.clone()),
                    status,
                ))
            }
            Endpoint::Related { .. } => Err(self.unsupported("create")),
        }
    }

    async fn update(
        &self,
        id: &ResourceIdentity,
        changes: &Attributes,
        retry: RetryPolicy,
    ) -> ClientResult<u16> {
        if !matches!(self.endpoint, Endpoint::Collection { .. }) {
            return Err(self.unsupported("update"));
        }
        let url = self.object_url(id)?;
        let body = Value::Object(changes.clone());
        let (status, _) = self.send(Method::PATCH, &url, &[], Some(&body), retry).await?;
        Ok(status)
    }

    async fn delete(&self, id: &ResourceIdentity, retry: RetryPolicy) -> ClientResult<u16> {
        let url = match &self.endpoint {
            Endpoint::Collection { .. } => self.object_url(id)?,
            Endpoint::References { .. } => format!("{}/$ref", self.object_url(id)?),
            Endpoint::Related { .. } => return Err(self.unsupported("delete")),
        };
        let (status, _) = self.send(Method::DELETE, &url, &[], None, retry).await?;
        Ok(status)
    }

    async fn list(
        &self,
        query: &Query,
        retry: RetryPolicy,
    ) -> ClientResult<ApiResponse<Vec<RemoteObject>>> {
        let Endpoint::Collection { path } = &self.endpoint else {
            return Err(self.unsupported("list"));
        };

        let mut url = format!("{}/{path}", self.base_url());
        let mut pairs = query.to_pairs();
        let mut objects = Vec::new();

        loop {
            debug!("Fetching page: {}", url);
            let (status, body) = self.send(Method::GET, &url, &pairs, None, retry).await?;
            let page: ODataPage = serde_json::from_value(require_body(body)?)?;
            for value in page.value {
                objects.push(RemoteObject::from_value(value)?);
            }

            match page.next_link {
                Some(next) => {
                    // nextLink already carries the query options.
                    url = next;
                    pairs.clear();
                }
                None => return Ok(ApiResponse::new(objects, status)),
            }
        }
    }

    async fn invoke(
        &self,
        id: &ResourceIdentity,
        action: &str,
        retry: RetryPolicy,
    ) -> ClientResult<u16> {
        if !matches!(self.endpoint, Endpoint::Collection { .. }) {
            return Err(self.unsupported("invoke"));
        }
        let url = format!("{}/{action}", self.object_url(id)?);
        let (status, _) = self.send(Method::POST, &url, &[], None, retry).await?;
        Ok(status)
    }
}
