//! crates/notes_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client core depends on.
//! These traits are the boundary of the hexagonal architecture: the session
//! and autosave logic never touch a socket or a file directly, only these
//! ports, so they can run against the real network or an in-memory fake.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::domain::{AutosavePayload, RecordId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The request never produced a response (no connectivity, DNS, TLS...).
    #[error("Network failure: {0}")]
    Network(String),
    /// The credential slot could not be read or written.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Raw HTTP Exchange
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Whether the ambient cookie jar should ride along with this request.
    pub include_cookies: bool,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Whatever the remote service answered, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Sends one request and returns the response verbatim. Non-2xx statuses are
/// *not* errors at this level; only a failure to get any response at all is.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn exchange(&self, request: HttpRequest) -> PortResult<HttpResponse>;
}

/// A single persistent slot holding an opaque bearer token.
///
/// An empty slot is a normal state: requests then rely on cookies alone.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> PortResult<Option<String>>;
    fn set(&self, token: &str) -> PortResult<()>;
    fn clear(&self) -> PortResult<()>;

    /// Empties the slot only while it still holds `expected`. Returns whether
    /// anything was removed.
    fn clear_if(&self, expected: &str) -> PortResult<bool> {
        match self.get()? {
            Some(current) if current == expected => self.clear().map(|()| true),
            _ => Ok(false),
        }
    }
}

/// Where debounced autosave writes end up.
#[async_trait]
pub trait AutosaveTarget: Send + Sync {
    async fn autosave(&self, note_id: &RecordId, payload: &AutosavePayload) -> PortResult<()>;
}
