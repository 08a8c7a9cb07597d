//! Error type shared by all collaborators.

use std::io;
use thiserror::Error;

/// Errors raised by directory, catalog, policy and storage implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entry with the same name already exists in the target location.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The request cannot be satisfied as stated (bad name, cyclic move, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error from a storage backend.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Bearer token could not be issued.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// A password could not be hashed, or a stored hash is malformed.
    #[error("Password hash error: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        StoreError::AlreadyExists(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        StoreError::InvalidArgument(what.into())
    }
}

/// Result type for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;
