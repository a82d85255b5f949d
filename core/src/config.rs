//! Client configuration: credentials, endpoint, timeout, retry and pooling.
//!
//! A `ClientConfig` is immutable once built and owned by a single
//! dispatcher. The track and app clients each expose a builder that fills
//! one in.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TRACK_HOST: &str = "track.customer.io";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_URL_PREFIX: &str = "/api/v1";

/// How a dispatcher holds its HTTP connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// One agent, built on first use and reused for the client's lifetime.
    #[default]
    Pooled,
    /// A fresh agent per request, dropped (with its sockets) afterwards.
    Unpooled,
}

/// Authentication for one API surface.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Site id + API key, sent as HTTP Basic auth (track API).
    Basic { site_id: String, api_key: String },
    /// App API key, sent as a bearer token.
    Bearer(String),
}

impl Credentials {
    pub fn basic(site_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Credentials::Basic {
            site_id: site_id.into(),
            api_key: api_key.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer(token.into())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        match self {
            Credentials::Basic { site_id, api_key } => {
                format!("Basic {}", STANDARD.encode(format!("{site_id}:{api_key}")))
            }
            Credentials::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { site_id, .. } => f
                .debug_struct("Basic")
                .field("site_id", site_id)
                .field("api_key", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    /// Every request URL starts with this. No trailing slash.
    pub base_url: String,
    /// Per-attempt timeout for the whole request/response exchange.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub connection_mode: ConnectionMode,
}

impl ClientConfig {
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            connection_mode: ConnectionMode::default(),
        }
    }
}

/// Build `https://{host}[:{port}]/{prefix}`.
///
/// A scheme on `host` is dropped (the client always speaks HTTPS), slashes
/// around host and prefix are trimmed, and port 443 is left implicit.
pub fn track_base_url(host: Option<&str>, port: Option<u16>, url_prefix: Option<&str>) -> String {
    let host = host.unwrap_or(DEFAULT_TRACK_HOST);
    let port = port.unwrap_or(DEFAULT_PORT);
    let prefix = url_prefix.unwrap_or(DEFAULT_URL_PREFIX).trim_matches('/');

    let host = match host.split_once("://") {
        Some((_, rest)) => rest,
        None => host,
    };
    let host = host.trim_matches('/');

    if port == DEFAULT_PORT {
        format!("https://{host}/{prefix}")
    } else {
        format!("https://{host}:{port}/{prefix}")
    }
}
