use axum::{
    body::Body,
    http::{Response as HttpResponse, StatusCode},
    response::Response,
};
use fieldmatch_protocol::{serialize_json, ErrorEnvelope};
use serde::Serialize;

/// Sent on every response, preflights included. Browser extensions call the
/// service from arbitrary origins.
pub(crate) const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Authorization"),
];

pub(crate) fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response, StatusCode> {
    let bytes = serialize_json(value)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_bytes();
    let builder = with_cors(
        HttpResponse::builder()
            .status(status)
            .header("content-type", "application/json"),
    );
    builder
        .body(Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Result<Response, StatusCode> {
    let hint = match code {
        "invalid_request" => Some(
            "Send a JSON body with \"action\": \"get\" or \"store\" and a fieldSignature.",
        ),
        "not_found" => None,
        _ => Some("Check the request against the shared cache protocol."),
    };
    let mut envelope = ErrorEnvelope::new(code, message);
    if let Some(hint) = hint {
        envelope = envelope.with_hint(hint);
    }
    json_response(status, &envelope)
}

pub(crate) fn empty_response(status: StatusCode) -> Result<Response, StatusCode> {
    with_cors(HttpResponse::builder().status(status))
        .body(Body::empty())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn with_cors(mut builder: axum::http::response::Builder) -> axum::http::response::Builder {
    for (name, value) in CORS_HEADERS {
        builder = builder.header(name, value);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_response_carries_cors_headers() {
        let response = error_response(StatusCode::NOT_FOUND, "not_found", "miss").unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        for (name, value) in CORS_HEADERS {
            assert_eq!(response.headers()[name], value);
        }

        let preflight = empty_response(StatusCode::NO_CONTENT).unwrap();
        assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    }
}
