//! Response interpretation: one raw response in, one `OperationResult` out.
//!
//! # Design
//! The status code is checked first, so a 4xx/5xx is always a failure no
//! matter what the body looks like. Successful bodies are then classified by
//! content type and decoded into exactly the shape the operation expects.
//! Nothing coming from the backend can make this module panic; every decode
//! fault becomes `ApiError::MalformedResponse`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::operation::ExpectedKind;
use crate::types::{Artifact, BigThree, OperationResult, Payload, PlacementSet, UserRecord};

const FALLBACK_BINARY_TYPE: &str = "application/octet-stream";

/// How a response body declares itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyClass {
    Structured,
    Binary(String),
    Undeclared,
}

pub fn classify(response: &HttpResponse) -> BodyClass {
    match response.media_type() {
        Some(media) if is_json_media_type(&media) => BodyClass::Structured,
        Some(media) => BodyClass::Binary(media),
        None => BodyClass::Undeclared,
    }
}

fn is_json_media_type(media: &str) -> bool {
    media == "application/json" || media.ends_with("+json")
}

/// Turns a transport outcome into the result shown to the operator.
pub fn interpret(raw: Result<HttpResponse, ApiError>, expected: &ExpectedKind) -> OperationResult {
    let response = raw?;
    if response.status >= 400 {
        return Err(ApiError::Http {
            status: response.status,
            message: extract_error_message(&response),
        });
    }

    let class = classify(&response);
    match expected {
        ExpectedKind::Artifact { kind, user_id } => {
            let content_type = match class {
                BodyClass::Binary(media) => media,
                BodyClass::Undeclared => FALLBACK_BINARY_TYPE.to_string(),
                BodyClass::Structured => {
                    warn!(status = response.status, "expected a document, got JSON");
                    return Err(ApiError::malformed(
                        response.status,
                        "expected a binary document, got structured data",
                    ));
                }
            };
            Ok(Payload::Artifact(Artifact {
                kind: *kind,
                user_id: user_id.clone(),
                content_type,
                bytes: response.body,
            }))
        }
        structured => {
            if let BodyClass::Binary(media) = class {
                warn!(status = response.status, media = %media, "expected JSON, got binary body");
                return Err(ApiError::malformed(
                    response.status,
                    format!("expected JSON, got {media}"),
                ));
            }
            decode_structured(&response, structured)
        }
    }
}

fn decode_structured(response: &HttpResponse, expected: &ExpectedKind) -> OperationResult {
    let status = response.status;
    match expected {
        ExpectedKind::Users => decode::<Vec<UserRecord>>(response).map(Payload::Users),
        ExpectedKind::User => decode::<UserRecord>(response).map(Payload::User),
        ExpectedKind::Placements => decode::<PlacementSet>(response).map(Payload::Placements),
        ExpectedKind::BigThree => {
            let body = decode::<Value>(response)?;
            BigThree::from_value(body).map(Payload::BigThree).map_err(|reason| {
                warn!(status, reason = %reason, "big three response unusable");
                ApiError::malformed(status, reason)
            })
        }
        ExpectedKind::Health => decode::<Value>(response).map(Payload::Health),
        ExpectedKind::Artifact { .. } => Err(ApiError::malformed(
            status,
            "document response routed to the structured decoder",
        )),
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(|e| {
        warn!(status = response.status, error = %e, "response does not match expected shape");
        ApiError::malformed(response.status, e.to_string())
    })
}

/// Picks the most useful human-readable message out of an error response.
pub fn extract_error_message(response: &HttpResponse) -> String {
    if let Ok(body) = serde_json::from_slice::<Value>(&response.body) {
        if let Some(message) = message_from_json(&body) {
            return message;
        }
    }
    match std::str::from_utf8(&response.body) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => format!("backend error (status {})", response.status),
    }
}

fn message_from_json(body: &Value) -> Option<String> {
    match body.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
