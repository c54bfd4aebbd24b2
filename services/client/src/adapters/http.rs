//! services/client/src/adapters/http.rs
//!
//! This module contains the network adapter, the concrete implementation of
//! the `HttpExchange` port from the `core` crate. It handles all traffic to
//! the remote notes service using `reqwest`.

use async_trait::async_trait;
use notes_core::ports::{HttpExchange, HttpMethod, HttpRequest, HttpResponse, PortError, PortResult};
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use std::sync::Arc;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A network adapter that implements the `HttpExchange` port.
///
/// Two clients share nothing but the connection settings: one carries the
/// session cookie jar, the other never sends or stores cookies. Which one a
/// request uses is decided per request by `HttpRequest::include_cookies`.
#[derive(Clone)]
pub struct ReqwestExchange {
    with_cookies: Client,
    without_cookies: Client,
    jar: Arc<Jar>,
}

impl ReqwestExchange {
    /// Creates a new `ReqwestExchange` with an empty cookie jar.
    pub fn new() -> PortResult<Self> {
        let jar = Arc::new(Jar::default());
        let with_cookies = Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let without_cookies = Client::builder()
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            with_cookies,
            without_cookies,
            jar,
        })
    }

    /// The cookie jar shared by cookie-carrying requests.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn exchange(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        let client = if request.include_cookies {
            &self.with_cookies
        } else {
            &self.without_cookies
        };

        let mut builder = client.request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
