//! Client for the track API: customers, events, devices, segments.
//!
//! Every method validates its identifiers, builds the path with encoded
//! segments, and hands the body to the dispatcher. Methods return once the
//! server has answered 200; any other outcome is an `Error`.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{track_base_url, ClientConfig, ConnectionMode, Credentials};
use crate::dispatch::Dispatcher;
use crate::encode::Identifier;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, Transport};
use crate::region::Region;
use crate::retry::RetryPolicy;
use crate::sanitize::{epoch_seconds, AttributeValue, Attributes, Payload};

/// How a customer is addressed in `merge_customers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Id,
    Email,
    CioId,
}

impl IdentifierType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierType::Id => "id",
            IdentifierType::Email => "email",
            IdentifierType::CioId => "cio_id",
        }
    }
}

impl std::str::FromStr for IdentifierType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(IdentifierType::Id),
            "email" => Ok(IdentifierType::Email),
            "cio_id" => Ok(IdentifierType::CioId),
            other => Err(Error::Validation(format!(
                "invalid identifier type {other:?}, expected one of id, email, cio_id"
            ))),
        }
    }
}

/// When a backfilled event happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    At(DateTime<Utc>),
    Seconds(i64),
    /// Textual seconds, parsed when the request is built.
    Text(String),
}

impl EventTime {
    fn to_seconds(&self) -> Result<i64> {
        match self {
            EventTime::At(ts) => Ok(epoch_seconds(ts)),
            EventTime::Seconds(s) => Ok(*s),
            EventTime::Text(text) => text.trim().parse().map_err(|e: std::num::ParseIntError| {
                Error::InvalidTimestamp {
                    value: text.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

impl From<i64> for EventTime {
    fn from(v: i64) -> Self {
        EventTime::Seconds(v)
    }
}

impl From<i32> for EventTime {
    fn from(v: i32) -> Self {
        EventTime::Seconds(i64::from(v))
    }
}

impl From<&str> for EventTime {
    fn from(v: &str) -> Self {
        EventTime::Text(v.to_string())
    }
}

impl From<String> for EventTime {
    fn from(v: String) -> Self {
        EventTime::Text(v)
    }
}

impl From<NaiveDateTime> for EventTime {
    fn from(v: NaiveDateTime) -> Self {
        EventTime::At(v.and_utc())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for EventTime {
    fn from(v: DateTime<Tz>) -> Self {
        EventTime::At(v.with_timezone(&Utc))
    }
}

pub struct TrackClient {
    dispatcher: Dispatcher,
}

impl TrackClient {
    /// Client for the US region with default settings.
    pub fn new(site_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::builder(site_id, api_key).build()
    }

    pub fn builder(site_id: impl Into<String>, api_key: impl Into<String>) -> TrackClientBuilder {
        TrackClientBuilder::new(Credentials::basic(site_id, api_key))
    }

    pub fn base_url(&self) -> &str {
        self.dispatcher.base_url()
    }

    /// Create or update a customer and its attributes.
    pub fn identify(&self, id: impl Into<Identifier>, attributes: Attributes) -> Result<()> {
        let id = required(id, "id", "identify")?;
        let url = self.dispatcher.url(&format!("/customers/{}", id.encoded()));
        self.send(HttpMethod::Put, &url, attributes.into())
    }

    /// Record a named event for a customer.
    pub fn track(&self, customer_id: impl Into<Identifier>, name: &str, data: Attributes) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "track")?;
        let body = Attributes::new().with("name", name).with("data", data_object(data));
        self.send(HttpMethod::Post, &self.events_url(&customer_id), body.into())
    }

    pub fn pageview(&self, customer_id: impl Into<Identifier>, page: &str, data: Attributes) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "pageview")?;
        let body = Attributes::new()
            .with("type", "page")
            .with("name", page)
            .with("data", data_object(data));
        self.send(HttpMethod::Post, &self.events_url(&customer_id), body.into())
    }

    /// Record an event that happened in the past.
    pub fn backfill(
        &self,
        customer_id: impl Into<Identifier>,
        name: &str,
        timestamp: impl Into<EventTime>,
        data: Attributes,
    ) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "backfill")?;
        let timestamp = timestamp.into().to_seconds()?;
        let body = Attributes::new()
            .with("name", name)
            .with("data", data_object(data))
            .with("timestamp", timestamp);
        self.send(HttpMethod::Post, &self.events_url(&customer_id), body.into())
    }

    /// Record an event not tied to a known customer. A blank
    /// `anonymous_id` is left out of the body.
    pub fn track_anonymous(&self, anonymous_id: &str, name: &str, data: Attributes) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::blank("name", "track_anonymous"));
        }
        let mut body = Attributes::new().with("name", name).with("data", data_object(data));
        if !anonymous_id.trim().is_empty() {
            body.insert("anonymous_id", anonymous_id);
        }
        let url = self.dispatcher.url("/events");
        self.send(HttpMethod::Post, &url, body.into())
    }

    /// Delete a customer profile.
    pub fn delete(&self, customer_id: impl Into<Identifier>) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "delete")?;
        let url = self.dispatcher.url(&format!("/customers/{}", customer_id.encoded()));
        self.send(HttpMethod::Delete, &url, Attributes::new().into())
    }

    /// Register a device for push notifications. `data` may carry extra
    /// device attributes; `id` and `platform` always win over it.
    pub fn add_device(
        &self,
        customer_id: impl Into<Identifier>,
        device_id: &str,
        platform: &str,
        data: Attributes,
    ) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "add_device")?;
        if device_id.trim().is_empty() {
            return Err(Error::blank("device_id", "add_device"));
        }
        if platform.trim().is_empty() {
            return Err(Error::blank("platform", "add_device"));
        }

        let device = data.with("id", device_id).with("platform", platform);
        let body = Attributes::new().with("device", data_object(device));
        self.send(HttpMethod::Put, &self.devices_url(&customer_id), body.into())
    }

    pub fn delete_device(&self, customer_id: impl Into<Identifier>, device_id: impl Into<Identifier>) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "delete_device")?;
        let device_id = required(device_id, "device_id", "delete_device")?;
        let url = format!("{}/{}", self.devices_url(&customer_id), device_id.encoded());
        self.send(HttpMethod::Delete, &url, Attributes::new().into())
    }

    /// Delete a customer and stop them from being re-added.
    pub fn suppress(&self, customer_id: impl Into<Identifier>) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "suppress")?;
        let url = self.dispatcher.url(&format!("/customers/{}/suppress", customer_id.encoded()));
        self.send(HttpMethod::Post, &url, Attributes::new().into())
    }

    pub fn unsuppress(&self, customer_id: impl Into<Identifier>) -> Result<()> {
        let customer_id = required(customer_id, "customer_id", "unsuppress")?;
        let url = self.dispatcher.url(&format!("/customers/{}/unsuppress", customer_id.encoded()));
        self.send(HttpMethod::Post, &url, Attributes::new().into())
    }

    /// Merge `secondary` into `primary`; the secondary profile is deleted.
    pub fn merge_customers(
        &self,
        primary_type: IdentifierType,
        primary_id: impl Into<Identifier>,
        secondary_type: IdentifierType,
        secondary_id: impl Into<Identifier>,
    ) -> Result<()> {
        let primary_id = required(primary_id, "primary_id", "merge_customers")?;
        let secondary_id = required(secondary_id, "secondary_id", "merge_customers")?;

        let body = Attributes::new()
            .with("primary", identifier_object(primary_type, primary_id))
            .with("secondary", identifier_object(secondary_type, secondary_id));
        let url = self.dispatcher.url("/merge_customers");
        self.send(HttpMethod::Post, &url, body.into())
    }

    /// Add customers to a manual segment.
    pub fn add_to_segment<I>(&self, segment_id: impl Into<Identifier>, customer_ids: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Identifier>,
    {
        self.segment_membership("add_to_segment", "add_customers", segment_id.into(), customer_ids)
    }

    /// Remove customers from a manual segment.
    pub fn remove_from_segment<I>(&self, segment_id: impl Into<Identifier>, customer_ids: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Identifier>,
    {
        self.segment_membership("remove_from_segment", "remove_customers", segment_id.into(), customer_ids)
    }

    fn segment_membership<I>(&self, operation: &str, action: &str, segment_id: Identifier, customer_ids: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Identifier>,
    {
        let segment_id = required(segment_id, "segment_id", operation)?;
        let ids: Vec<Value> = customer_ids
            .into_iter()
            .map(|id| Value::String(id.into().into_string()))
            .collect();
        if ids.is_empty() {
            return Err(Error::blank("customer_ids", operation));
        }

        let url = self.dispatcher.url(&format!("/segments/{}/{action}", segment_id.encoded()));
        let body = Attributes::new().with("ids", Value::Array(ids));
        self.send(HttpMethod::Post, &url, body.into())
    }

    fn events_url(&self, customer_id: &Identifier) -> String {
        self.dispatcher.url(&format!("/customers/{}/events", customer_id.encoded()))
    }

    fn devices_url(&self, customer_id: &Identifier) -> String {
        self.dispatcher.url(&format!("/customers/{}/devices", customer_id.encoded()))
    }

    fn send(&self, method: HttpMethod, url: &str, payload: Payload) -> Result<()> {
        self.dispatcher.send(method, url, payload).map(|_| ())
    }
}

impl std::fmt::Debug for TrackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackClient").field("dispatcher", &self.dispatcher).finish()
    }
}

fn required(id: impl Into<Identifier>, param: &str, operation: &str) -> Result<Identifier> {
    let id = id.into();
    if id.is_blank() {
        return Err(Error::blank(param, operation));
    }
    Ok(id)
}

/// Nested event data, sanitized here because the dispatcher only looks at
/// top-level fields.
fn data_object(data: Attributes) -> AttributeValue {
    AttributeValue::Json(Value::Object(data.into_json()))
}

fn identifier_object(kind: IdentifierType, id: Identifier) -> AttributeValue {
    let mut map = serde_json::Map::new();
    map.insert(kind.as_str().to_string(), Value::String(id.into_string()));
    AttributeValue::Json(Value::Object(map))
}

/// Builder for `TrackClient`.
///
/// Host resolution: an explicit `base_url` wins, then `host` (with `port`
/// and `url_prefix`), then the region's track host.
pub struct TrackClientBuilder {
    credentials: Credentials,
    region: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    url_prefix: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    connection_mode: ConnectionMode,
    transport: Option<Box<dyn Transport>>,
}

impl TrackClientBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            region: None,
            host: None,
            port: None,
            url_prefix: None,
            base_url: None,
            timeout: crate::config::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            connection_mode: ConnectionMode::default(),
            transport: None,
        }
    }

    /// Region code (`"us"`, `"eu"`) or a `Region`. Unknown codes fail in `build`.
    pub fn region(mut self, region: impl ToString) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    /// Use this exact base URL, scheme included. Meant for proxies and
    /// local fakes; bypasses the https template.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
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

    pub fn build(self) -> Result<TrackClient> {
        let region = self.region.as_deref().map(str::parse::<Region>).transpose()?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => {
                let host = self.host.as_deref().or(region.map(Region::track_host));
                track_base_url(host, self.port, self.url_prefix.as_deref())
            }
        };

        let mut config = ClientConfig::new(self.credentials, base_url);
        config.timeout = self.timeout;
        config.retry = self.retry;
        config.connection_mode = self.connection_mode;

        let dispatcher = match self.transport {
            Some(transport) => Dispatcher::with_transport(config, transport),
            None => Dispatcher::new(config),
        };
        Ok(TrackClient { dispatcher })
    }
}
