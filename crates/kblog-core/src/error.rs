//! Error types for `kblog-core`.
//!
//! Every fallible operation in the core library returns [`AuthResult<T>`],
//! an alias for `Result<T, AuthError>`. [`AuthError::kind`] collapses the
//! detailed variants into the six-way [`ErrorKind`] taxonomy that the HTTP
//! layer maps onto status codes.

use std::time::Duration;

use crate::credentials::CredentialError;
use crate::store::StoreError;

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No token was supplied.
    #[error("token missing")]
    Missing,

    /// The token could not be decoded or its signature did not verify.
    #[error("token malformed or signature invalid")]
    Malformed,

    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// An access token was presented where a refresh token was expected, or vice versa.
    #[error("wrong token kind")]
    WrongKind,

    /// The token id has a live revocation entry.
    #[error("token revoked")]
    Revoked,
}

/// Coarse classification shared with the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    TooManyRequests,
    NotFound,
    Conflict,
    Internal,
}

/// Unified error type for all core operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token validation failed.
    #[error("unauthorized: {0}")]
    Token(#[from] TokenError),

    /// Unknown identifier or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Valid identity, but no permission covers the requested route.
    #[error("forbidden: {method} {path}")]
    Forbidden { method: String, path: String },

    /// The caller exceeded a rate limit window.
    #[error("rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The login identifier is locked out.
    #[error("account temporarily locked for {}s", remaining.as_secs())]
    Locked { remaining: Duration },

    /// A referenced user, role or permission does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique field collided on create.
    #[error("{field} already exists")]
    Conflict { field: String },

    /// The ephemeral state store failed or timed out.
    #[error("ephemeral store error: {0}")]
    Store(#[from] StoreError),

    /// The credential store failed for a reason other than not-found or conflict.
    #[error("credential store error: {0}")]
    Backend(String),

    /// Token signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Password hashing failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Invalid configuration detected at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Token(_) | AuthError::InvalidCredentials => ErrorKind::Unauthorized,
            AuthError::Forbidden { .. } => ErrorKind::Forbidden,
            AuthError::RateLimited { .. } | AuthError::Locked { .. } => ErrorKind::TooManyRequests,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::Conflict { .. } => ErrorKind::Conflict,
            AuthError::Store(_)
            | AuthError::Backend(_)
            | AuthError::Signing(_)
            | AuthError::PasswordHash(_)
            | AuthError::Config(_) => ErrorKind::Internal,
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound(what) => AuthError::NotFound(what),
            CredentialError::Conflict(field) => AuthError::Conflict { field },
            CredentialError::Backend(msg) => AuthError::Backend(msg),
        }
    }
}

/// Convenience alias used throughout `kblog-core`.
pub type AuthResult<T> = Result<T, AuthError>;
