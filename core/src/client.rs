//! Request building and dispatch for the astrology backend.
//!
//! # Design
//! `ApiClient` holds only its transport and carries no mutable state between
//! calls. `build_request` is a pure function of the operation and the session
//! configuration; `execute` adds a request id, sends the request and maps a
//! missing response to `ApiError::Unreachable`. Nothing is retried: a repeat
//! is always a fresh operator action, so an upsert is never sent twice behind
//! the operator's back.

use std::time::Duration;

use tracing::{debug, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Configuration;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::interpret::interpret;
use crate::operation::Operation;
use crate::transport::{Transport, UreqTransport};
use crate::types::OperationResult;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const JSON: &str = "application/json";
const PDF: &str = "application/pdf";

/// Builds the plain-data request for `operation`.
///
/// Fails with `Unsupported` when a required parameter is missing; in that
/// case no request exists to send.
pub fn build_request(operation: &Operation, config: &Configuration) -> Result<HttpRequest, ApiError> {
    operation.checked_expected_kind()?;

    let accept = match operation {
        Operation::GenerateBooklet(_) | Operation::GenerateCalendar { .. } => PDF,
        _ => JSON,
    };
    let mut headers = vec![("accept".to_string(), accept.to_string())];
    if let Some(credential) = config.credential() {
        headers.push((
            "authorization".to_string(),
            format!("Bearer {}", credential.expose()),
        ));
    }

    let body = match operation {
        Operation::UpsertUser(draft) => {
            let body = serde_json::to_string(draft).map_err(|e| ApiError::unsupported(e.to_string()))?;
            headers.push(("content-type".to_string(), JSON.to_string()));
            Some(body)
        }
        _ => None,
    };

    Ok(HttpRequest {
        method: operation.method(),
        url: endpoint(config.base_url(), &operation.path_segments()),
        headers,
        body,
    })
}

/// Appends `segments` to the base URL path, percent-encoding each one.
fn endpoint(base: &Url, segments: &[String]) -> String {
    let mut url = base.clone();
    // Configuration only admits URLs that can be a base, so this always succeeds.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url.to_string()
}

/// Timeout for `operation`: the session override when set, else the
/// operation's default.
pub fn effective_timeout(operation: &Operation, config: &Configuration) -> Duration {
    config.timeout().unwrap_or_else(|| operation.default_timeout())
}

/// Synchronous client for the astrology backend.
#[derive(Debug, Clone)]
pub struct ApiClient<T = UreqTransport> {
    transport: T,
}

impl ApiClient<UreqTransport> {
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }
}

impl Default for ApiClient<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds and sends `operation`, returning the raw response.
    pub fn execute(&self, operation: &Operation, config: &Configuration) -> Result<HttpResponse, ApiError> {
        let request = build_request(operation, config)?;
        self.send(request, effective_timeout(operation, config))
    }

    /// Sends an already built request. Every call is tagged with a fresh
    /// request id.
    pub fn send(&self, mut request: HttpRequest, timeout: Duration) -> Result<HttpResponse, ApiError> {
        let request_id = Uuid::new_v4();
        request
            .headers
            .push((REQUEST_ID_HEADER.to_string(), request_id.to_string()));

        let span = info_span!(
            "backend_request",
            %request_id,
            method = request.method.as_str(),
            url = %request.url
        );
        let _guard = span.enter();

        debug!(?timeout, "dispatching request");
        match self.transport.send(&request, timeout) {
            Ok(response) => {
                debug!(status = response.status, bytes = response.body.len(), "response received");
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "backend unreachable");
                Err(err.into())
            }
        }
    }

    /// `execute` followed by `interpret`: exactly one result per call.
    pub fn call(&self, operation: &Operation, config: &Configuration) -> OperationResult {
        let expected = operation.checked_expected_kind()?;
        interpret(self.execute(operation, config), &expected)
    }
}
