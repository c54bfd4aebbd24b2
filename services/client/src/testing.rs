//! In-memory fakes shared by the unit tests.

use crate::adapters::MemoryTokenStore;
use crate::transport::CredentialTransport;
use async_trait::async_trait;
use bytes::Bytes;
use notes_core::ports::{HttpExchange, HttpMethod, HttpRequest, HttpResponse, PortError, PortResult};
use notes_core::AuthPolicy;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_ORIGIN: &str = "http://notes.test";

/// A canned answer for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Empty(u16),
    NetworkDown,
    /// Answers after the given delay (tokio time, so paused clocks apply).
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Reply::Json(status, body)
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply::Text(status, body.to_string())
    }

    pub fn after(self, delay: Duration) -> Self {
        Reply::Delayed(delay, Box::new(self))
    }
}

#[derive(Default)]
struct Script {
    routes: HashMap<(HttpMethod, String), VecDeque<Reply>>,
    requests: Vec<HttpRequest>,
}

/// Answers requests from a script keyed by method and path (query ignored).
/// Several replies for one route are used in order; the last one repeats.
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct ScriptedExchange {
    script: Mutex<Script>,
}

impl ScriptedExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

async fn render(mut reply: Reply) -> PortResult<HttpResponse> {
    loop {
        match reply {
            Reply::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            Reply::NetworkDown => {
                return Err(PortError::Network("connection refused".to_string()))
            }
            Reply::Json(status, body) => {
                return Ok(HttpResponse {
                    status,
                    content_type: Some("application/json; charset=utf-8".to_string()),
                    body: Bytes::from(body.to_string()),
                })
            }
            Reply::Text(status, body) => {
                return Ok(HttpResponse {
                    status,
                    content_type: Some("text/plain".to_string()),
                    body: Bytes::from(body),
                })
            }
            Reply::Empty(status) => {
                return Ok(HttpResponse {
                    status,
                    content_type: None,
                    body: Bytes::new(),
                })
            }
        }
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn exchange(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        let reply = {
            let mut script = self.lock();
            let key = (request.method, path_of(&request.url));
            script.requests.push(request);
            match script.routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(reply) => render(reply).await,
            None => render(Reply::json(404, serde_json::json!({"message": "Not found"}))).await,
        }
    }
}

pub fn transport_with(
    exchange: &Arc<ScriptedExchange>,
    tokens: &Arc<MemoryTokenStore>,
    policy: AuthPolicy,
) -> Arc<CredentialTransport> {
    Arc::new(CredentialTransport::new(
        TEST_ORIGIN,
        policy,
        tokens.clone(),
        exchange.clone(),
    ))
}
