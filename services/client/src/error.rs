//! services/client/src/error.rs
//!
//! Defines the primary error type for the entire notes client.

use crate::config::ConfigError;
use notes_core::ports::PortError;
use notes_core::NoteValidationError;

/// Message shown for failures that never reached the service.
pub const NETWORK_FAILURE_MESSAGE: &str = "Network error. Please try again.";

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No usable backend origin. Fatal; raised before any request is made.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status other than 401.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The service rejected the supplied credentials (401). If the request
    /// carried the stored bearer token and the slot still holds it, the token
    /// has already been evicted by the time this is raised.
    #[error("{message}")]
    AuthRejected { message: String },

    /// Input rejected on the client before any network call.
    #[error("{0}")]
    Validation(String),

    /// A body that could not be converted to or from JSON, typically a 2xx
    /// response without the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Represents an error that propagated up from one of the core ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status for errors that came back from the service.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::AuthRejected { .. } => Some(401),
            _ => None,
        }
    }

    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ClientError::AuthRejected { .. })
    }

    /// Text suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. }
            | ClientError::AuthRejected { message }
            | ClientError::Validation(message) => message.clone(),
            ClientError::Network(_) | ClientError::Port(PortError::Network(_)) => {
                NETWORK_FAILURE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<NoteValidationError> for ClientError {
    fn from(err: NoteValidationError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl From<ClientError> for PortError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(message) => PortError::Network(message),
            ClientError::AuthRejected { .. } => PortError::Unauthorized,
            ClientError::Api { status: 404, message } => PortError::NotFound(message),
            ClientError::Port(inner) => inner,
            other => PortError::Unexpected(other.to_string()),
        }
    }
}
