//! Axum middleware applying the envelope filter.
//!
//! Mount with
//! `axum::middleware::from_fn_with_state(filter, envelope_middleware)`.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::binding::{RequestBinding, HEADER_ENCRYPTED};
use crate::filter::EnvelopeFilter;

/// Plaintext of a decrypted request envelope.
///
/// Inserted as a request extension; the wire body is left untouched.
#[derive(Debug, Clone)]
pub struct DecryptedPayload(pub Bytes);

impl DecryptedPayload {
    /// Deserialize the plaintext as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.0)
    }
}

/// Envelope middleware.
///
/// Inbound JSON bodies on POST, PUT and PATCH are opened into a
/// [`DecryptedPayload`]; a body that fails to open ends the request with a
/// 500 before it reaches the handler. Non-empty JSON responses are sealed
/// and marked with `X-Encrypted: true`.
pub async fn envelope_middleware(
    State(filter): State<Arc<EnvelopeFilter>>,
    request: Request,
    next: Next,
) -> Response {
    if !filter.is_active(request.uri().path(), request.headers()) {
        return next.run(request).await;
    }

    let binding = RequestBinding::from_request(request.method(), request.uri(), request.headers());

    let request = if is_mutating(request.method()) && is_json(request.headers()) {
        match decrypt_inbound(&filter, &binding, request).await {
            Ok(request) => request,
            Err(response) => return response,
        }
    } else {
        request
    };

    let response = next.run(request).await;
    encrypt_outbound(&filter, &binding, response).await
}

async fn decrypt_inbound(
    filter: &EnvelopeFilter,
    binding: &RequestBinding,
    request: Request,
) -> Result<Request, Response> {
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, filter.settings().max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            filter.record_decrypt_failure();
            warn!(path = %binding.path, error = %err, "Failed to read request body");
            return Err(decrypt_failure_response());
        }
    };

    if bytes.is_empty() {
        return Ok(Request::from_parts(parts, Body::empty()));
    }

    match filter.decrypt_request(binding, &bytes) {
        Ok(plaintext) => {
            parts.extensions.insert(DecryptedPayload(Bytes::from(plaintext)));
            Ok(Request::from_parts(parts, Body::from(bytes)))
        }
        Err(_) => Err(decrypt_failure_response()),
    }
}

async fn encrypt_outbound(
    filter: &EnvelopeFilter,
    binding: &RequestBinding,
    response: Response,
) -> Response {
    if !is_json(response.headers()) {
        return response;
    }

    let limit = filter.settings().max_body_bytes;
    if declared_length(response.headers()).is_some_and(|len| len > limit) {
        filter.record_fallback();
        warn!(path = %binding.path, limit, "Response exceeds envelope limit, sending plaintext");
        return response;
    }

    // Buffered uncapped so an oversized body can still be sent as plaintext
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            filter.record_fallback();
            warn!(path = %binding.path, error = %err, "Failed to read response body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Response unavailable" })),
            )
                .into_response();
        }
    };

    if bytes.is_empty() {
        return Response::from_parts(parts, Body::from(bytes));
    }

    if bytes.len() > limit {
        filter.record_fallback();
        warn!(
            path = %binding.path,
            limit,
            size = bytes.len(),
            "Response exceeds envelope limit, sending plaintext"
        );
        return Response::from_parts(parts, Body::from(bytes));
    }

    match filter.encrypt_response(binding, &bytes) {
        Ok(sealed) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(sealed.len()));
            parts
                .headers
                .insert(HEADER_ENCRYPTED, HeaderValue::from_static("true"));
            Response::from_parts(parts, Body::from(sealed))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}

fn decrypt_failure_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Request decryption failed" })),
    )
        .into_response()
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}
