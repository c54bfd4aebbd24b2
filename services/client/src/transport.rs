//! services/client/src/transport.rs
//!
//! The credential-carrying transport every outbound call goes through.
//!
//! It resolves paths against the configured origin, attaches the cookie jar
//! and/or the stored bearer token according to the [`AuthPolicy`], decodes the
//! body as JSON or text based on the response content type, and turns every
//! non-2xx answer into a [`ClientError`]. A 401 evicts the stored token before
//! the error is raised so a stale credential is never replayed, but only the
//! token that request actually carried: a newer token stored meanwhile, or a
//! caller-supplied `Authorization` header, leaves the slot alone. There are no
//! automatic retries; retry policy belongs to the caller.

use crate::config::Config;
use crate::error::ClientError;
use notes_core::ports::{HttpExchange, HttpMethod, HttpRequest, HttpResponse, PortError, TokenStore};
use notes_core::AuthPolicy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: ResponseBody,
}

impl ApiResponse {
    /// Deserializes a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self.data {
            ResponseBody::Json(value) => {
                serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
            }
            ResponseBody::Text(_) => Err(ClientError::Decode(
                "expected a JSON body, got text".to_string(),
            )),
            ResponseBody::Empty => Err(ClientError::Decode(
                "expected a JSON body, got nothing".to_string(),
            )),
        }
    }
}

pub struct CredentialTransport {
    origin: String,
    policy: AuthPolicy,
    tokens: Arc<dyn TokenStore>,
    exchange: Arc<dyn HttpExchange>,
}

impl CredentialTransport {
    /// `origin` must already be normalized; see [`crate::config::normalize_origin`].
    pub fn new(
        origin: impl Into<String>,
        policy: AuthPolicy,
        tokens: Arc<dyn TokenStore>,
        exchange: Arc<dyn HttpExchange>,
    ) -> Self {
        Self {
            origin: origin.into(),
            policy,
            tokens,
            exchange,
        }
    }

    pub fn from_config(
        config: &Config,
        tokens: Arc<dyn TokenStore>,
        exchange: Arc<dyn HttpExchange>,
    ) -> Self {
        Self::new(config.api_origin.clone(), config.auth_policy, tokens, exchange)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn endpoint(&self, path: &str) -> String {
        let path = path.trim();
        if path.starts_with('/') {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}/{}", self.origin, path)
        }
    }

    /// The stored bearer token, if any. A slot that cannot be read is treated
    /// as empty so the request still goes out with cookie credentials.
    pub fn stored_token(&self) -> Option<String> {
        match self.tokens.get() {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("Failed to read the stored token: {}", e);
                None
            }
        }
    }

    /// Sends one request and classifies the outcome.
    ///
    /// `headers` are sent as given; an `Authorization` header supplied here
    /// replaces the stored bearer token for this call.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<ApiResponse, ClientError> {
        let mut request_headers: Vec<(String, String)> = vec![
            ("Accept".to_string(), "application/json".to_string()),
            (
                "x-request-id".to_string(),
                format!("req_{}", Uuid::new_v4().simple()),
            ),
        ];
        if body.is_some() {
            request_headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        request_headers.extend(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let caller_authorized = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("authorization"));
        let sent_token = if self.policy.bearer_auth && !caller_authorized {
            self.stored_token()
        } else {
            None
        };
        if let Some(token) = &sent_token {
            request_headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        let request = HttpRequest {
            method,
            url: self.endpoint(path),
            headers: request_headers,
            body: body.map(|value| value.to_string()),
            include_cookies: self.policy.cookie_auth,
        };

        let response = self.exchange.exchange(request).await.map_err(|e| {
            error!("API Error ({} {}): {}", method, path, e);
            match e {
                PortError::Network(message) => ClientError::Network(message),
                other => ClientError::Port(other),
            }
        })?;
        debug!("{} {} -> {}", method, path, response.status);

        self.classify(method, path, response, sent_token.as_deref())
    }

    fn classify(
        &self,
        method: HttpMethod,
        path: &str,
        response: HttpResponse,
        sent_token: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let status = response.status;
        let success = (200..300).contains(&status);
        let data = decode_body(&response, success)?;

        if success {
            return Ok(ApiResponse { status, data });
        }

        let message = error_message(&data, status);
        if status == 401 {
            if let Some(token) = sent_token {
                match self.tokens.clear_if(token) {
                    Ok(true) => debug!("Evicted the rejected bearer token"),
                    Ok(false) => debug!("Rejected token was already replaced; keeping the slot"),
                    Err(e) => warn!("Failed to evict the rejected token: {}", e),
                }
            }
            warn!("API Error ({} {}): credentials rejected", method, path);
            return Err(ClientError::AuthRejected { message });
        }

        error!("API Error ({} {}): {} {}", method, path, status, message);
        Err(ClientError::Api { status, message })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(HttpMethod::Get, path, None, &[]).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_body(payload)?;
        self.request(HttpMethod::Post, path, Some(body), &[]).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_body(payload)?;
        self.request(HttpMethod::Put, path, Some(body), &[]).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.request(HttpMethod::Delete, path, None, &[]).await
    }
}

pub(crate) fn to_body<B: Serialize + ?Sized>(payload: &B) -> Result<Value, ClientError> {
    serde_json::to_value(payload).map_err(|e| ClientError::Decode(e.to_string()))
}

fn decode_body(response: &HttpResponse, success: bool) -> Result<ResponseBody, ClientError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponseBody::Empty);
    }

    let is_json = response
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    if is_json {
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => return Ok(ResponseBody::Json(value)),
            Err(e) if success => return Err(ClientError::Decode(e.to_string())),
            // A broken error body still carries a usable message as text.
            Err(_) => {}
        }
    }

    Ok(ResponseBody::Text(
        String::from_utf8_lossy(&response.body).into_owned(),
    ))
}

/// Server-supplied message for a failed call, or a generic fallback.
pub fn error_message(data: &ResponseBody, status: u16) -> String {
    let supplied = match data {
        ResponseBody::Json(value) => ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        ResponseBody::Text(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        ResponseBody::Empty => None,
    };
    supplied.unwrap_or_else(|| format!("Request failed with status {}", status))
}
