//! Error taxonomy shared by the service layer and the HTTP adaptor.
//!
//! Service functions return [`Error`] (or bubble an [`anyhow::Error`] wrapped
//! into [`Kind::Internal`]) instead of handling status codes themselves;
//! the HTTP adaptor is the only place that turns a [`Kind`] into a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// A classified failure kind, one per entry in the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    NotFoundContainer,
    NotFoundObject,
    ContainerNotEmpty,
    TooLarge,
    ObjectCorrupted,
    AuthorizationFailed,
    BadRequest,
    Internal,
}

impl Kind {
    pub fn status(self) -> StatusCode {
        match self {
            Kind::NotFoundContainer | Kind::NotFoundObject => StatusCode::NOT_FOUND,
            Kind::ContainerNotEmpty => StatusCode::CONFLICT,
            Kind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Kind::ObjectCorrupted => StatusCode::UNPROCESSABLE_ENTITY,
            Kind::AuthorizationFailed => StatusCode::UNAUTHORIZED,
            Kind::BadRequest => StatusCode::BAD_REQUEST,
            Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_text(self) -> &'static str {
        match self {
            Kind::NotFoundContainer => "Container not found",
            Kind::NotFoundObject => "Object not found",
            Kind::ContainerNotEmpty => "Container is not empty",
            Kind::TooLarge => "Object is too large",
            Kind::ObjectCorrupted => "Object corrupted during transfer",
            Kind::AuthorizationFailed => "Authorization failed",
            Kind::BadRequest => "Bad request",
            Kind::Internal => "Internal error",
        }
    }
}

/// An error rendered to the client as `{"message": "..."}` with a mapped status code.
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    message: String,
}

impl Error {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn not_found_container() -> Self {
        Self::new(Kind::NotFoundContainer, Kind::NotFoundContainer.default_text())
    }

    pub fn not_found_object() -> Self {
        Self::new(Kind::NotFoundObject, Kind::NotFoundObject.default_text())
    }

    pub fn container_not_empty() -> Self {
        Self::new(Kind::ContainerNotEmpty, Kind::ContainerNotEmpty.default_text())
    }

    pub fn too_large() -> Self {
        Self::new(Kind::TooLarge, Kind::TooLarge.default_text())
    }

    pub fn object_corrupted() -> Self {
        Self::new(Kind::ObjectCorrupted, Kind::ObjectCorrupted.default_text())
    }

    pub fn authorization_failed() -> Self {
        Self::new(Kind::AuthorizationFailed, Kind::AuthorizationFailed.default_text())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Kind::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Kind::Internal, message)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.status(), self.message)
    }
}

impl std::error::Error for Error {}

/// Any unclassified failure (metadata store I/O, blob backend I/O, ...)
/// is reported to the boundary as an internal error, never leaking its
/// `Display` text to the client; only the classified kinds in [`Kind`]
/// produce a message the caller should see.
impl From<anyhow::Error> for Error {
    fn from(source: anyhow::Error) -> Self {
        Error::internal(source.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(source: sled::Error) -> Self {
        Error::internal(source.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::internal(source.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.kind == Kind::Internal {
            tracing::error!(message = %self.message, "internal error");
        }

        let status = self.kind.status();
        let body = Json(ErrorBody { message: &self.message });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
