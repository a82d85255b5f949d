//! Production `Transport` backed by a blocking `ureq::Agent`.
//!
//! # Design
//! `ureq::Agent` owns a connection pool and is `Send + Sync`, so pooled mode
//! keeps exactly one agent behind a `OnceLock`: concurrent first use builds
//! it once. Unpooled mode builds an agent per request and drops it when the
//! request finishes, closing its sockets.
//!
//! Status codes are returned as data (`http_status_as_error(false)`) so the
//! dispatcher, not the transport, decides what counts as success. Redirects
//! are not followed; a 3xx reaches the dispatcher as a response.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::trace;
use ureq::Agent;

use crate::config::ConnectionMode;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

pub struct UreqTransport {
    timeout: Duration,
    mode: ConnectionMode,
    agent: OnceLock<Agent>,
}

impl UreqTransport {
    pub fn new(timeout: Duration, mode: ConnectionMode) -> Self {
        Self {
            timeout,
            mode,
            agent: OnceLock::new(),
        }
    }

    fn build_agent(&self) -> Agent {
        trace!(timeout_ms = self.timeout.as_millis() as u64, "building http agent");
        Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_global(Some(self.timeout))
            .build()
            .new_agent()
    }

    fn pooled_agent(&self) -> &Agent {
        self.agent.get_or_init(|| self.build_agent())
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .field("agent_built", &self.agent.get().is_some())
            .finish()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.mode {
            ConnectionMode::Pooled => send(self.pooled_agent(), request),
            ConnectionMode::Unpooled => {
                let agent = self.build_agent();
                send(&agent, request)
            }
        }
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(agent: &Agent, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let url = request.url.as_str();
    let headers = request.headers.as_slice();

    let result = match (request.method, request.body.as_deref()) {
        (HttpMethod::Get, _) => with_headers(agent.get(url), headers).call(),
        (HttpMethod::Delete, None) => with_headers(agent.delete(url), headers).call(),
        (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(url), headers)
            .force_send_body()
            .send(body.as_bytes()),
        (HttpMethod::Post, Some(body)) => with_headers(agent.post(url), headers).send(body.as_bytes()),
        (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
        (HttpMethod::Put, Some(body)) => with_headers(agent.put(url), headers).send(body.as_bytes()),
        (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
    };

    let mut response = result.map_err(into_transport_error)?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(into_transport_error)?;

    Ok(HttpResponse { status, body })
}

fn into_transport_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::timeout(err.to_string()),
        other => TransportError::new(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_agent_is_built_once() {
        let transport = UreqTransport::new(Duration::from_secs(1), ConnectionMode::Pooled);
        let first = transport.pooled_agent() as *const Agent;
        let second = transport.pooled_agent() as *const Agent;
        assert_eq!(first, second);
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let transport = UreqTransport::new(Duration::from_millis(500), ConnectionMode::Unpooled);
        // Port 1 on localhost is closed on any sane test machine.
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:1/".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert!(transport.execute(&request).is_err());
    }
}
