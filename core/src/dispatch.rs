//! Request dispatcher: auth, sanitization, retries, status classification.
//!
//! # Design
//! The dispatcher is the only place that talks to a `Transport`. It turns
//! `(method, url, payload)` into an `HttpRequest` carrying the credentials,
//! user agent and JSON body, then runs the attempt loop:
//!
//! - a response with status 200 is the only success;
//! - any other status is returned as `Error::Http` immediately, no retry;
//! - a transport failure is retried per `RetryPolicy`, sleeping on the
//!   calling thread between attempts, and becomes `Error::Transport` once
//!   the retries are spent.
//!
//! Configuration is immutable and the transport is `Send + Sync`, so one
//! dispatcher can be shared by any number of threads.

use std::thread;

use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::retry::RetryPolicy;
use crate::sanitize::{sanitize, Payload};
use crate::transport::UreqTransport;

pub const USER_AGENT: &str = concat!("Customer.io Rust Client/", env!("CARGO_PKG_VERSION"));

/// The only status treated as success.
const SUCCESS: u16 = 200;

pub struct Dispatcher {
    base_url: String,
    authorization: String,
    retry: RetryPolicy,
    transport: Box<dyn Transport>,
}

impl Dispatcher {
    /// Dispatcher using the ureq transport described by `config`.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout, config.connection_mode);
        Self::with_transport(config, transport)
    }

    /// Dispatcher over a caller-supplied transport. `config.timeout` and
    /// `config.connection_mode` are the transport's business and are ignored.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            authorization: config.credentials.authorization(),
            base_url: config.base_url,
            retry: config.retry,
            transport: Box::new(transport),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Absolute URL for a path under the base URL. `path` must start with
    /// `/` and have its identifiers already encoded.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Build the request that `send` would put on the wire.
    pub fn build_request(&self, method: HttpMethod, url: &str, payload: Payload) -> Result<HttpRequest> {
        let body = sanitize(payload)
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut headers = vec![
            ("Authorization".to_string(), self.authorization.clone()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Send a request and return the response text of a 200 response.
    pub fn send(&self, method: HttpMethod, url: &str, payload: Payload) -> Result<String> {
        let request = self.build_request(method, url, payload)?;
        let response = self.execute_with_retry(&request)?;
        check_status(&request, response)
    }

    /// Like `send`, but parses the response body as JSON. An empty body
    /// parses as `null`.
    pub fn send_json(&self, method: HttpMethod, url: &str, payload: Payload) -> Result<serde_json::Value> {
        let text = self.send(method, url, payload)?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn execute_with_retry(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut retries_done = 0;
        loop {
            debug!(method = %request.method, url = %request.url, attempt = retries_done + 1, "sending request");

            match self.transport.execute(request) {
                Ok(response) => return Ok(response),
                Err(err) if self.retry.should_retry(retries_done) => {
                    retries_done += 1;
                    let delay = self.retry.delay(retries_done);
                    warn!(
                        url = %request.url,
                        retry = retries_done,
                        delay_ms = delay.as_millis() as u64,
                        timed_out = err.timed_out,
                        error = %err,
                        "transport failure, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    warn!(url = %request.url, retries = retries_done, error = %err, "giving up");
                    return Err(Error::Transport {
                        retries: self.retry.retries,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn check_status(request: &HttpRequest, response: HttpResponse) -> Result<String> {
    if response.status == SUCCESS {
        return Ok(response.body);
    }
    debug!(status = response.status, url = %request.url, "request rejected");
    Err(Error::Http {
        status: response.status,
        url: request.url.clone(),
        body: request.body.clone().unwrap_or_default(),
        response: response.body,
    })
}
