//! Request execution.
//!
//! # Design
//! `Transport` is the only seam that touches the network. It turns an
//! `HttpRequest` into an `HttpResponse` (any status) or a `TransportError`
//! when the request could not be completed. Status interpretation stays in
//! `ApiClient`, so a transport never decides what counts as a failure.
//!
//! `UreqTransport` drives a blocking `ureq::Agent` on tokio's blocking pool,
//! keeping the controller's thread free while a request is in flight.

use std::future::Future;

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>>;
}

/// `Transport` backed by `ureq`.
///
/// 4xx/5xx responses are returned as data rather than errors so the
/// `ApiClient` can read the backend's `error` body.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> {
        let agent = self.agent.clone();
        async move {
            tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
                .await
                .map_err(|e| TransportError::new(format!("request task failed: {e}")))?
        }
    }
}

fn execute_blocking(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, TransportError> {
    debug!(method = req.method.as_str(), url = %req.url, "sending request");

    let result = match (req.method, req.body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.url), &req.headers).call(),
        (HttpMethod::Delete, _) => with_headers(agent.delete(&req.url), &req.headers).call(),
        (HttpMethod::Post, Some(body)) => {
            with_headers(agent.post(&req.url), &req.headers).send(body.as_bytes())
        }
        (HttpMethod::Post, None) => with_headers(agent.post(&req.url), &req.headers).send_empty(),
    };
    let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| match e {
            ureq::Error::Io(_) | ureq::Error::Timeout(_) => {
                TransportError::new(format!("reading response body: {e}"))
            }
            other => TransportError::unreadable_body(other.to_string()),
        })?;

    debug!(status, "received response");
    Ok(HttpResponse { status, body })
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}
