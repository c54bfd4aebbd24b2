//! services/client/src/diagnostics.rs
//!
//! Connection check: hits a handful of read-only endpoints and reports which
//! ones answered.

use crate::transport::{CredentialTransport, ResponseBody};
use futures::future::join_all;
use notes_core::ports::HttpMethod;
use tracing::info;

const CHECKS: [(&str, &str); 4] = [
    ("health", "/health"),
    ("session", "/auth/me"),
    ("public notes", "/notes/public?limit=5"),
    ("features", "/features"),
];

const DETAIL_LIMIT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub path: &'static str,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsReport {
    pub origin: String,
    /// Whether a bearer token was stored when the run started.
    pub token_stored: bool,
    pub checks: Vec<CheckResult>,
}

impl DiagnosticsReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|p| p.success)
    }
}

/// Runs every check concurrently.
///
/// The session check goes through the normal transport, so a rejected token
/// is evicted just like on any other call.
pub async fn run(transport: &CredentialTransport) -> DiagnosticsReport {
    let token_stored = transport.stored_token().is_some();
    let checks = join_all(
        CHECKS
            .iter()
            .map(|&(name, path)| check(transport, name, path)),
    )
    .await;

    let passed = checks.iter().filter(|p| p.success).count();
    info!("Diagnostics: {}/{} checks passed", passed, checks.len());

    DiagnosticsReport {
        origin: transport.origin().to_string(),
        token_stored,
        checks,
    }
}

async fn check(
    transport: &CredentialTransport,
    name: &'static str,
    path: &'static str,
) -> CheckResult {
    let (success, detail) = match transport.request(HttpMethod::Get, path, None, &[]).await {
        Ok(response) => (true, format!("{} {}", response.status, summarize(&response.data))),
        Err(e) => {
            let detail = match e.status() {
                Some(status) => format!("{} {}", status, e.user_message()),
                None => e.to_string(),
            };
            (false, detail)
        }
    };
    CheckResult {
        name,
        path,
        success,
        detail: truncate(&detail),
    }
}

fn summarize(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Json(value) => value.to_string(),
        ResponseBody::Text(text) => text.trim().to_string(),
        ResponseBody::Empty => "(empty body)".to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= DETAIL_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(DETAIL_LIMIT).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTokenStore;
    use crate::testing::{transport_with, Reply, ScriptedExchange};
    use notes_core::AuthPolicy;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn reports_each_check() {
        let exchange = ScriptedExchange::new();
        exchange.on(HttpMethod::Get, "/health", Reply::text(200, "ok\n"));
        exchange.on(
            HttpMethod::Get,
            "/auth/me",
            Reply::json(401, json!({"message": "Not authenticated"})),
        );
        exchange.on(HttpMethod::Get, "/notes/public", Reply::json(200, json!({"notes": []})));
        exchange.on(HttpMethod::Get, "/features", Reply::NetworkDown);
        let tokens = Arc::new(MemoryTokenStore::with_token("stale"));
        let transport = transport_with(&exchange, &tokens, AuthPolicy::default());

        let report = run(&transport).await;

        assert!(report.token_stored);
        assert!(!report.all_passed());
        let outcome: Vec<_> = report.checks.iter().map(|p| (p.name, p.success)).collect();
        assert_eq!(
            outcome,
            vec![
                ("health", true),
                ("session", false),
                ("public notes", true),
                ("features", false),
            ]
        );
        assert_eq!(report.checks[0].detail, "200 ok");
        assert_eq!(report.checks[1].detail, "401 Not authenticated");
        let public = exchange.requests_to(HttpMethod::Get, "/notes/public");
        assert!(public[0].url.ends_with("/notes/public?limit=5"));
    }

    #[test]
    fn long_details_are_truncated() {
        let long = "x".repeat(500);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), DETAIL_LIMIT + 1);
        assert!(cut.ends_with('…'));
    }
}
