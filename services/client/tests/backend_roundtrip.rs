//! Drives the real reqwest adapter against a fake backend on a loopback port.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use client_lib::{
    adapters::{MemoryTokenStore, ReqwestExchange},
    config::Config,
    session::SessionState,
    state::AppState,
};
use notes_core::ports::TokenStore;
use notes_core::{AuthPolicy, Credentials, EditPatch, RecordId};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SESSION_COOKIE: &str = "sid=cookie-session";
const TOKEN: &str = "tok123";

/// What the backend saw on one request.
#[derive(Debug, Clone)]
struct Seen {
    cookie: bool,
    authorization: Option<String>,
}

#[derive(Default)]
struct Backend {
    me: Mutex<Vec<Seen>>,
    logouts: Mutex<Vec<Seen>>,
    autosaves: Mutex<Vec<(String, Value)>>,
}

fn seen(headers: &HeaderMap) -> Seen {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SESSION_COOKIE));
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Seen {
        cookie,
        authorization,
    }
}

fn user() -> Value {
    json!({"id": 1, "name": "A", "email": "a@b.com"})
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, format!("{}; Path=/; HttpOnly", SESSION_COOKIE))],
            Json(json!({"user": user(), "token": TOKEN})),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid email or password"})),
        )
            .into_response()
    }
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let seen = seen(&headers);
    backend.me.lock().unwrap().push(seen.clone());
    let expected = format!("Bearer {}", TOKEN);
    let bearer_ok = seen.authorization.as_deref() == Some(expected.as_str());
    if seen.cookie || bearer_ok {
        Json(json!({"user": user()})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Not authenticated"})),
        )
            .into_response()
    }
}

async fn logout(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    backend.logouts.lock().unwrap().push(seen(&headers));
    Json(json!({"message": "Logged out"}))
}

async fn autosave(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    backend.autosaves.lock().unwrap().push((id, body));
    StatusCode::OK
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/notes/{id}/autosave", post(autosave))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), backend)
}

fn app(origin: &str, policy: AuthPolicy, tokens: &Arc<MemoryTokenStore>) -> AppState {
    let mut config = Config::local(origin).unwrap();
    config.auth_policy = policy;
    config.autosave_delay = Duration::from_millis(50);
    AppState::new(
        Arc::new(config),
        tokens.clone(),
        Arc::new(ReqwestExchange::new().unwrap()),
    )
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        email: "a@b.com".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn login_sets_both_credentials() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let state = app(&origin, AuthPolicy::default(), &tokens);

    let outcome = state.session.login(&credentials("secret")).await;
    assert!(outcome.success);
    assert_eq!(tokens.get().unwrap().as_deref(), Some(TOKEN));

    let resolved = state.start().await;
    assert!(matches!(resolved, SessionState::Authenticated(_)));
    let seen = backend.me.lock().unwrap().clone();
    assert!(seen[0].cookie);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok123"));
}

#[tokio::test]
async fn wrong_password_is_reported() {
    let (origin, _backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let state = app(&origin, AuthPolicy::default(), &tokens);

    let outcome = state.session.login(&credentials("nope")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Invalid email or password"));
    assert_eq!(state.session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn cookie_only_policy_never_sends_the_token() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let policy = AuthPolicy {
        cookie_auth: true,
        bearer_auth: false,
    };
    let state = app(&origin, policy, &tokens);

    assert!(state.session.login(&credentials("secret")).await.success);
    state.start().await;

    assert!(state.session.is_authenticated());
    let seen = backend.me.lock().unwrap().clone();
    assert!(seen[0].cookie);
    assert_eq!(seen[0].authorization, None);
}

#[tokio::test]
async fn bearer_only_policy_never_sends_cookies() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let policy = AuthPolicy {
        cookie_auth: false,
        bearer_auth: true,
    };
    let state = app(&origin, policy, &tokens);

    assert!(state.session.login(&credentials("secret")).await.success);
    state.start().await;

    assert!(state.session.is_authenticated());
    let seen = backend.me.lock().unwrap().clone();
    assert!(!seen[0].cookie);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok123"));
}

#[tokio::test]
async fn rejected_token_is_evicted() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::with_token("stale"));
    let state = app(&origin, AuthPolicy::default(), &tokens);

    assert_eq!(state.start().await, SessionState::Anonymous);
    assert_eq!(tokens.get().unwrap(), None);

    state.session.check_auth().await;
    let seen = backend.me.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].authorization, None);
}

#[tokio::test]
async fn logout_revokes_the_previous_token() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let state = app(&origin, AuthPolicy::default(), &tokens);
    assert!(state.session.login(&credentials("secret")).await.success);

    let pending = state.session.logout();
    assert_eq!(state.session.state(), SessionState::Anonymous);
    assert_eq!(tokens.get().unwrap(), None);
    pending.await.unwrap();

    let logouts = backend.logouts.lock().unwrap().clone();
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].authorization.as_deref(), Some("Bearer tok123"));
}

#[tokio::test]
async fn autosave_reaches_the_backend() {
    let (origin, backend) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let state = app(&origin, AuthPolicy::default(), &tokens);
    let id = RecordId::Number(42);
    state.autosave.track(&id, "Title", "");

    state.autosave.on_edit(Some(&id), EditPatch::content("draft text"));
    state.autosave.on_edit(Some(&id), EditPatch::content("draft text v2"));

    let mut saved = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        saved = backend.autosaves.lock().unwrap().clone();
        if !saved.is_empty() && !state.autosave.is_writing(&id) {
            break;
        }
    }
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "42");
    assert_eq!(saved[0].1, json!({"title": "Title", "content": "draft text v2"}));
}

#[tokio::test]
async fn unreachable_backend_resolves_anonymous() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let tokens = Arc::new(MemoryTokenStore::with_token(TOKEN));
    let state = app(&origin, AuthPolicy::default(), &tokens);

    assert_eq!(state.start().await, SessionState::Anonymous);
    assert_eq!(tokens.get().unwrap().as_deref(), Some(TOKEN));
}
