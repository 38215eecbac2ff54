//! Builders for every response the pipeline itself produces.
//!
//! Success bodies are the raw serialized handler value. Failures use one of two envelopes:
//! `{"error":{"code","message","validationErrors"}}` for rejected input and
//! `{"error":{"message"}}` for everything else a client is allowed to see.

use crate::body::ResponseBody;
use crate::error::{BoxError, HttpError};
use crate::schema::ValidationError;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::error;

/// Which request section failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    InvalidParameters,
    InvalidQuery,
    InvalidBody,
}

impl ErrorCategory {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidParameters => "Invalid path parameters",
            ErrorCategory::InvalidQuery => "Invalid query parameters",
            ErrorCategory::InvalidBody => "Invalid request body",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::InvalidParameters => f.write_str("INVALID_PARAMETERS"),
            ErrorCategory::InvalidQuery => f.write_str("INVALID_QUERY"),
            ErrorCategory::InvalidBody => f.write_str("INVALID_BODY"),
        }
    }
}

#[derive(Serialize)]
struct Envelope<T> {
    error: T,
}

#[derive(Serialize)]
struct ValidationFailure<'a> {
    code: ErrorCategory,
    message: &'static str,
    #[serde(rename = "validationErrors")]
    validation_errors: &'a [ValidationError],
}

#[derive(Serialize)]
struct MessageOnly<'a> {
    message: &'a str,
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(payload) {
        Ok(bytes) => {
            let mut response = Response::new(ResponseBody::from(bytes));
            *response.status_mut() = status;
            response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(cause = %e, "failed to serialize response body");
            internal_server_error()
        }
    }
}

/// 400 with the complete list of violations of one section.
pub fn validation_failed(category: ErrorCategory, errors: &[ValidationError]) -> Response<ResponseBody> {
    let failure = ValidationFailure { code: category, message: category.message(), validation_errors: errors };
    json_response(StatusCode::BAD_REQUEST, &Envelope { error: failure })
}

pub fn http_error(err: &HttpError) -> Response<ResponseBody> {
    json_response(err.status(), &Envelope { error: MessageOnly { message: err.message() } })
}

pub fn not_found() -> Response<ResponseBody> {
    http_error(&HttpError::not_found("not found"))
}

pub fn not_acceptable() -> Response<ResponseBody> {
    http_error(&HttpError::new(StatusCode::NOT_ACCEPTABLE, "not acceptable"))
}

pub fn payload_too_large() -> Response<ResponseBody> {
    http_error(&HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload too large"))
}

/// 200 carrying the handler's value, with any headers the handler set.
pub fn json_ok(value: &Value, headers: HeaderMap) -> Response<ResponseBody> {
    let mut response = json_response(StatusCode::OK, value);
    if response.status() == StatusCode::OK {
        response.headers_mut().extend(headers);
    }
    response
}

/// 204 with an empty body, with any headers the handler set.
pub fn no_content(headers: HeaderMap) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response.headers_mut().extend(headers);
    response
}

/// A bare 500, nothing about the fault leaks to the client.
pub fn internal_server_error() -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Turns an error that escaped the pipeline into the response the client gets.
///
/// An [`HttpError`] is sent as is, anything else is logged and answered with a bare 500.
pub fn fault_response(err: &BoxError) -> Response<ResponseBody> {
    match err.downcast_ref::<HttpError>() {
        Some(http_err) => http_error(http_err),
        None => {
            error!(cause = %err, "request failed with a server fault");
            internal_server_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCategory, fault_response, json_ok, no_content, not_acceptable, not_found, validation_failed};
    use crate::error::{BoxError, HttpError, RouteError};
    use crate::schema::{ValidationError, ValidationErrorCode};
    use http::header::{CACHE_CONTROL, CONTENT_TYPE};
    use http::{HeaderMap, HeaderValue, StatusCode};
    use serde_json::{Value, json};

    fn body_json(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_validation_failed_envelope() {
        let errors = vec![
            ValidationError {
                code: ValidationErrorCode::MissingRequired,
                key: "message".into(),
                type_name: "string".into(),
                message: None,
            },
            ValidationError::invalid("date", "date-time", "\"yesterday\" is not a \"date-time\""),
        ];

        let response = validation_failed(ErrorCategory::InvalidQuery, &errors);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(
            body_json(response.body().as_bytes()),
            json!({"error": {
                "code": "INVALID_QUERY",
                "message": "Invalid query parameters",
                "validationErrors": [
                    {"code": "missing_required", "key": "message", "type": "string"},
                    {
                        "code": "invalid",
                        "key": "date",
                        "type": "date-time",
                        "message": "\"yesterday\" is not a \"date-time\""
                    },
                ],
            }})
        );
    }

    #[test]
    fn test_category_names() {
        assert_eq!(ErrorCategory::InvalidParameters.to_string(), "INVALID_PARAMETERS");
        assert_eq!(serde_json::to_value(ErrorCategory::InvalidBody).unwrap(), json!("INVALID_BODY"));
        assert_eq!(ErrorCategory::InvalidParameters.message(), "Invalid path parameters");
    }

    #[test]
    fn test_not_found_and_not_acceptable() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response.body().as_bytes()), json!({"error": {"message": "not found"}}));

        let response = not_acceptable();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(body_json(response.body().as_bytes()), json!({"error": {"message": "not acceptable"}}));
    }

    #[test]
    fn test_success_responses_carry_handler_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let response = json_ok(&json!({"id": 1}), headers.clone());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(response.body().as_bytes(), br#"{"id":1}"#);

        let response = no_content(headers);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
        assert!(response.body().as_bytes().is_empty());
    }

    #[test]
    fn test_fault_response() {
        let err: BoxError = HttpError::unauthorized("unauthorized: no user").into();
        let response = fault_response(&err);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response.body().as_bytes()), json!({"error": {"message": "unauthorized: no user"}}));

        let err: BoxError = RouteError::ReadBody("connection reset".into()).into();
        let response = fault_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body().as_bytes().is_empty());
    }
}
