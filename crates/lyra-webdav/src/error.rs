//! Error handling and status mapping for the WebDAV server.
//!
//! Handlers return [`DavError`]; the dispatcher turns it into an HTTP status
//! via [`DavError::status`]. Collaborator failures are mapped by category so
//! that "not found" or "name taken" from the catalog surface as 404 / 409
//! rather than as internal errors.

use hyper::StatusCode;
use lyra_store::StoreError;
use thiserror::Error;

use crate::lock::LockError;

/// Errors that end a WebDAV request.
#[derive(Debug, Error)]
pub enum DavError {
    /// Missing or rejected credentials.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated but not permitted.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Missing parent, name collision, or other state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A request precondition (`Overwrite`, `If`) does not hold.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    /// The target is locked by another principal.
    #[error("Locked: {0}")]
    Locked(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Collaborator failure (boxed to reduce enum size).
    #[error("Backend failure: {0}")]
    Backend(Box<StoreError>),

    /// Response rendering failed.
    #[error("XML error: {0}")]
    Xml(String),
}

impl DavError {
    pub fn status(&self) -> StatusCode {
        match self {
            DavError::Unauthenticated => StatusCode::UNAUTHORIZED,
            DavError::Forbidden(_) => StatusCode::FORBIDDEN,
            DavError::NotFound(_) => StatusCode::NOT_FOUND,
            DavError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            DavError::Conflict(_) => StatusCode::CONFLICT,
            DavError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            DavError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DavError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DavError::Locked(_) => StatusCode::LOCKED,
            DavError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DavError::Backend(_) | DavError::Xml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures that indicate a server-side fault.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        DavError::NotFound(path.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        DavError::Forbidden(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        DavError::Conflict(what.into())
    }

    pub fn locked(path: impl Into<String>) -> Self {
        DavError::Locked(path.into())
    }

    pub fn bad_request(what: impl Into<String>) -> Self {
        DavError::BadRequest(what.into())
    }
}

impl From<StoreError> for DavError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => DavError::NotFound(what),
            StoreError::AlreadyExists(what) => DavError::Conflict(format!("{what} already exists")),
            StoreError::InvalidArgument(what) => DavError::Conflict(what),
            other @ (StoreError::Io(_) | StoreError::Token(_) | StoreError::PasswordHash(_)) => {
                DavError::Backend(Box::new(other))
            }
        }
    }
}

impl From<LockError> for DavError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Conflict(lock) => DavError::Locked(lock.resource_path),
            LockError::NotFound => DavError::PreconditionFailed("unknown lock token".into()),
            LockError::Forbidden => DavError::Forbidden("lock is held by another principal".into()),
        }
    }
}

impl From<quick_xml::Error> for DavError {
    fn from(e: quick_xml::Error) -> Self {
        DavError::Xml(e.to_string())
    }
}

// The XML writer reports failures of its in-memory sink as io::Error.
impl From<std::io::Error> for DavError {
    fn from(e: std::io::Error) -> Self {
        DavError::Xml(e.to_string())
    }
}

/// Result type for WebDAV operations.
pub type DavResult<T> = Result<T, DavError>;
