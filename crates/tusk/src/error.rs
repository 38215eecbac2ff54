//! Error types shared by route registration and the request pipeline.
//!
//! Errors fall in three groups:
//! - [`RouteDefinitionError`]: raised while registering routes, before the server starts
//! - [`HttpError`]: raised on purpose by handlers or context providers, sent to the client as is
//! - [`RouteError`]: server faults inside the pipeline, always answered with a bare 500

use crate::schema::{SchemaError, ValidationError};
use http::{Method, StatusCode};
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Error type returned by handlers and context providers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Route configuration mistakes, detected once at registration time.
#[derive(Error, Debug)]
pub enum RouteDefinitionError {
    #[error("cannot use positional parameters in '{template}', every placeholder must be named")]
    PositionalParameter { template: String },

    #[error("unsupported segment '{segment}' in route '{template}'")]
    UnsupportedSegment { template: String, segment: String },

    #[error("missing route parameter '{param}' of '{template}' in params schema")]
    MissingParamSchema { template: String, param: String },

    #[error("params schema key '{param}' is not a parameter of route '{template}'")]
    MissingPathParameter { template: String, param: String },

    #[error("params schema of '{template}' must be an object schema with properties")]
    InvalidParamsSchema { template: String },

    #[error("invalid route '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("invalid {section} schema for '{template}': {source}")]
    InvalidSchema {
        template: String,
        section: &'static str,
        #[source]
        source: SchemaError,
    },
}

/// An error carrying the status code and message the client should see.
///
/// Handlers return it boxed, usually through `?` or `.into()`:
///
/// ```
/// use tusk::{BoxError, HttpError};
///
/// async fn me(user: Option<String>) -> Result<String, BoxError> {
///     user.ok_or_else(|| HttpError::unauthorized("unauthorized: no user").into())
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl Error for HttpError {}

/// Server side faults raised by the pipeline itself.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("{method} {template} returned a value but declares no response schema")]
    MissingResponseSchema { method: Method, template: String },

    #[error("{method} {template} returned a value violating its response schema: {errors:?}")]
    InvalidResponse { method: Method, template: String, errors: Vec<ValidationError> },

    #[error("validated {section} does not fit the handler's type: {source}")]
    Decode {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler output can not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to read request body: {0}")]
    ReadBody(#[source] BoxError),
}
