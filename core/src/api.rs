//! Client for the app API: transactional messages and collections.
//!
//! Authenticates with an app API key sent as a bearer token. Unlike the
//! track API, responses carry data (delivery ids, collection records), so
//! methods return the parsed JSON body.

use std::time::Duration;

use serde_json::Value;

use crate::config::{ClientConfig, ConnectionMode, Credentials};
use crate::dispatch::Dispatcher;
use crate::encode::Identifier;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, Transport};
use crate::region::Region;
use crate::requests::{SendEmailRequest, SendPushRequest};
use crate::retry::RetryPolicy;
use crate::sanitize::{AttributeValue, Attributes, Payload};

pub struct ApiClient {
    dispatcher: Dispatcher,
}

impl ApiClient {
    /// Client for the US region with default settings.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        Self::builder(key).build()
    }

    pub fn builder(key: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(Credentials::bearer(key))
    }

    pub fn base_url(&self) -> &str {
        self.dispatcher.base_url()
    }

    pub fn send_email(&self, request: &SendEmailRequest) -> Result<Value> {
        self.send_message("/v1/send/email", request)
    }

    pub fn send_push(&self, request: &SendPushRequest) -> Result<Value> {
        self.send_message("/v1/send/push", request)
    }

    pub fn list_collections(&self) -> Result<Value> {
        let url = self.dispatcher.url("/v1/collections");
        self.dispatcher.send_json(HttpMethod::Get, &url, Payload::Empty)
    }

    /// Create a collection from inline rows.
    pub fn create_collection(&self, name: &str, data: Vec<Attributes>) -> Result<Value> {
        if name.trim().is_empty() {
            return Err(Error::blank("name", "create_collection"));
        }
        let body = Attributes::new().with("name", name).with("data", rows(data));
        let url = self.dispatcher.url("/v1/collections");
        self.dispatcher.send_json(HttpMethod::Post, &url, body.into())
    }

    /// Create a collection the platform downloads from `source_url`.
    pub fn create_collection_from_url(&self, name: &str, source_url: &str) -> Result<Value> {
        if name.trim().is_empty() {
            return Err(Error::blank("name", "create_collection_from_url"));
        }
        if source_url.trim().is_empty() {
            return Err(Error::blank("url", "create_collection_from_url"));
        }
        let body = Attributes::new().with("name", name).with("url", source_url);
        let url = self.dispatcher.url("/v1/collections");
        self.dispatcher.send_json(HttpMethod::Post, &url, body.into())
    }

    pub fn get_collection(&self, id: impl Into<Identifier>) -> Result<Value> {
        let url = self.collection_url(id, "get_collection", "")?;
        self.dispatcher.send_json(HttpMethod::Get, &url, Payload::Empty)
    }

    /// Rename a collection and/or replace its rows. Fields left `None` are
    /// not sent.
    pub fn update_collection(
        &self,
        id: impl Into<Identifier>,
        name: Option<&str>,
        data: Option<Vec<Attributes>>,
    ) -> Result<Value> {
        let url = self.collection_url(id, "update_collection", "")?;
        let mut body = Attributes::new();
        if let Some(name) = name {
            body.insert("name", name);
        }
        if let Some(data) = data {
            body.insert("data", rows(data));
        }
        self.dispatcher.send_json(HttpMethod::Put, &url, body.into())
    }

    pub fn delete_collection(&self, id: impl Into<Identifier>) -> Result<()> {
        let url = self.collection_url(id, "delete_collection", "")?;
        self.dispatcher.send(HttpMethod::Delete, &url, Payload::Empty).map(|_| ())
    }

    pub fn get_collection_content(&self, id: impl Into<Identifier>) -> Result<Value> {
        let url = self.collection_url(id, "get_collection_content", "/content")?;
        self.dispatcher.send_json(HttpMethod::Get, &url, Payload::Empty)
    }

    /// Replace every row of a collection.
    pub fn replace_collection_content(&self, id: impl Into<Identifier>, data: Vec<Attributes>) -> Result<Value> {
        let url = self.collection_url(id, "replace_collection_content", "/content")?;
        self.dispatcher.send_json(HttpMethod::Put, &url, Payload::List(data))
    }

    fn send_message<T: serde::Serialize>(&self, path: &str, request: &T) -> Result<Value> {
        let body = serde_json::to_value(request).map_err(|e| Error::Serialization(e.to_string()))?;
        let url = self.dispatcher.url(path);
        self.dispatcher.send_json(HttpMethod::Post, &url, body.into())
    }

    fn collection_url(&self, id: impl Into<Identifier>, operation: &str, suffix: &str) -> Result<String> {
        let id = id.into();
        if id.is_blank() {
            return Err(Error::blank("collection_id", operation));
        }
        Ok(self.dispatcher.url(&format!("/v1/collections/{}{suffix}", id.encoded())))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("dispatcher", &self.dispatcher).finish()
    }
}

fn rows(data: Vec<Attributes>) -> AttributeValue {
    AttributeValue::Json(Value::Array(
        data.into_iter().map(|row| Value::Object(row.into_json())).collect(),
    ))
}

/// Builder for `ApiClient`. An explicit `url` wins over `region`.
pub struct ApiClientBuilder {
    credentials: Credentials,
    url: Option<String>,
    region: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    connection_mode: ConnectionMode,
    transport: Option<Box<dyn Transport>>,
}

impl ApiClientBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            url: None,
            region: None,
            timeout: crate::config::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            connection_mode: ConnectionMode::default(),
            transport: None,
        }
    }

    /// Full base URL, scheme included, e.g. `https://api.customer.io`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Region code (`"us"`, `"eu"`) or a `Region`. Unknown codes fail in `build`.
    pub fn region(mut self, region: impl ToString) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retry.retries = retries;
        self
    }

    pub fn backoff_factor(mut self, factor: Duration) -> Self {
        self.retry.backoff_factor = factor;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    /// Replace the HTTP transport, e.g. with an in-memory fake.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let region = self.region.as_deref().map(str::parse::<Region>).transpose()?;
        let url = match self.url {
            Some(url) => url,
            None => format!("https://{}", region.unwrap_or_default().api_host()),
        };

        let mut config = ClientConfig::new(self.credentials, url);
        config.timeout = self.timeout;
        config.retry = self.retry;
        config.connection_mode = self.connection_mode;

        let dispatcher = match self.transport {
            Some(transport) => Dispatcher::with_transport(config, transport),
            None => Dispatcher::new(config),
        };
        Ok(ApiClient { dispatcher })
    }
}
