//! Error types.
//!
//! [`ClientError`] maps HTTP status codes from the REST collaborator to typed
//! variants. [`ProfileFetchError`], [`StorageError`] and [`SessionError`] sit
//! on top of it and are what the session layer reasons about.

use std::fmt;

use crate::role::{Portal, Role};

/// Errors returned by an [`ApiTransport`](crate::ApiTransport).
///
/// Each variant maps to a specific HTTP error status code, with `code` and
/// `message` extracted from the server's JSON error body when present.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Network-level error (DNS, connection refused, timeout, TLS).
    Network(String),

    /// 400 Bad Request.
    BadRequest { code: String, message: String },

    /// 401 Unauthorized: missing, invalid or expired credentials.
    Unauthorized { code: String, message: String },

    /// 403 Forbidden.
    Forbidden { code: String, message: String },

    /// 404 Not Found.
    NotFound { message: String },

    /// 409 Conflict, e.g. an email that is already registered.
    Conflict { code: String, message: String },

    /// 422 Unprocessable Entity: validation error.
    UnprocessableEntity { code: String, message: String },

    /// 429 Too Many Requests.
    TooManyRequests { message: String },

    /// 5xx or any other unexpected status.
    Server { status: u16, message: String },

    /// Failed to deserialize the response body.
    Deserialization(String),
}

impl ClientError {
    /// Create a network error from a reqwest error.
    pub fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }

    /// Build the error for a non-success status.
    pub fn from_status(status: u16, code: Option<String>, message: Option<String>) -> Self {
        let code_or = |fallback: &str| code.clone().unwrap_or_else(|| fallback.to_string());
        let message_or = |fallback: &str| message.clone().unwrap_or_else(|| fallback.to_string());
        match status {
            400 => Self::BadRequest {
                code: code_or("BAD_REQUEST"),
                message: message_or("Bad request"),
            },
            401 => Self::Unauthorized {
                code: code_or("UNAUTHORIZED"),
                message: message_or("Unauthorized"),
            },
            403 => Self::Forbidden {
                code: code_or("FORBIDDEN"),
                message: message_or("Forbidden"),
            },
            404 => Self::NotFound {
                message: message_or("Not found"),
            },
            409 => Self::Conflict {
                code: code_or("CONFLICT"),
                message: message_or("Conflict"),
            },
            422 => Self::UnprocessableEntity {
                code: code_or("UNPROCESSABLE_ENTITY"),
                message: message_or("Unprocessable entity"),
            },
            429 => Self::TooManyRequests {
                message: message_or("Too many requests"),
            },
            _ => Self::Server {
                status,
                message: message_or("Server error"),
            },
        }
    }

    /// Get the error code, if available.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::BadRequest { code, .. } => Some(code),
            Self::Unauthorized { code, .. } => Some(code),
            Self::Forbidden { code, .. } => Some(code),
            Self::Conflict { code, .. } => Some(code),
            Self::UnprocessableEntity { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            Self::Network(msg) => msg,
            Self::BadRequest { message, .. } => message,
            Self::Unauthorized { message, .. } => message,
            Self::Forbidden { message, .. } => message,
            Self::NotFound { message } => message,
            Self::Conflict { message, .. } => message,
            Self::UnprocessableEntity { message, .. } => message,
            Self::TooManyRequests { message } => message,
            Self::Server { message, .. } => message,
            Self::Deserialization(msg) => msg,
        }
    }

    /// Get the HTTP status code, if applicable.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::UnprocessableEntity { .. } => Some(422),
            Self::TooManyRequests { .. } => Some(429),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether the server rejected the submitted credentials or form.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BadRequest { .. } | Self::Unauthorized { .. } | Self::UnprocessableEntity { .. }
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::BadRequest { code, message } => write!(f, "Bad Request [{}]: {}", code, message),
            Self::Unauthorized { code, message } => {
                write!(f, "Unauthorized [{}]: {}", code, message)
            }
            Self::Forbidden { code, message } => write!(f, "Forbidden [{}]: {}", code, message),
            Self::NotFound { message } => write!(f, "Not Found: {}", message),
            Self::Conflict { code, message } => write!(f, "Conflict [{}]: {}", code, message),
            Self::UnprocessableEntity { code, message } => {
                write!(f, "Unprocessable Entity [{}]: {}", code, message)
            }
            Self::TooManyRequests { message } => write!(f, "Too Many Requests: {}", message),
            Self::Server { status, message } => write!(f, "Server Error ({}): {}", status, message),
            Self::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// Failure to resolve a role profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileFetchError {
    /// The account has no profile for its role yet.
    #[error("profile not found")]
    NotFound,

    /// The backend refuses to serve the profile for this account.
    #[error("profile access forbidden")]
    Forbidden,

    /// The bearer token was rejected.
    #[error("session expired: {0}")]
    AuthExpired(ClientError),

    #[error("profile request failed: {0}")]
    Transport(ClientError),

    /// The backend answered with a payload that is not a profile.
    #[error("malformed profile payload: {0}")]
    Malformed(String),
}

impl ProfileFetchError {
    /// "Registered but profile not completed": recoverable, never a logout.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::NotFound | Self::Forbidden)
    }
}

impl From<ClientError> for ProfileFetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound { .. } => Self::NotFound,
            ClientError::Forbidden { .. } => Self::Forbidden,
            ClientError::Unauthorized { .. } => Self::AuthExpired(err),
            ClientError::Deserialization(msg) => Self::Malformed(msg),
            other => Self::Transport(other),
        }
    }
}

/// Errors from the persistent key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by [`SessionManager`](crate::SessionManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login or registration was rejected, or the server was unreachable.
    #[error("authentication failed: {0}")]
    Credentials(#[source] ClientError),

    #[error("authentication response did not contain a token")]
    MissingToken,

    #[error("account not authorized for {intended} space, current role: {actual}")]
    RoleMismatch { intended: Portal, actual: Role },

    #[error("accounts cannot be registered into the {0} space")]
    RegistrationPortal(Portal),

    #[error("no authenticated session")]
    NotAuthenticated,

    #[error("profile update failed: {0}")]
    ProfileUpdate(#[source] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// A logout or a newer login took over while the operation was running.
    #[error("operation superseded by a newer session")]
    Superseded,
}
