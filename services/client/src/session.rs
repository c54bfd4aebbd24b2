//! services/client/src/session.rs
//!
//! Owns the "who is logged in" state machine.
//!
//! `Unknown` → `Checking` → {`Authenticated`, `Anonymous`}. The state is only
//! ever set to `Authenticated` after the service has answered; logout is the
//! one optimistic transition. Every remote failure is converted into an
//! [`AuthOutcome`] so nothing escapes this module as an error.

use crate::error::ClientError;
use crate::transport::CredentialTransport;
use notes_core::ports::HttpMethod;
use notes_core::{Credentials, Registration, Session, User};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const REGISTER_PATH: &str = "/auth/register";
const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const ME_PATH: &str = "/auth/me";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";
const OAUTH_PATH: &str = "/auth/google";

//=========================================================================================
// State, Guards and Outcomes
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No credential check has run yet.
    Unknown,
    /// The first credential check is in flight.
    Checking,
    Authenticated(Session),
    Anonymous,
}

impl SessionState {
    /// True once a credential check has produced an answer.
    pub fn is_resolved(&self) -> bool {
        matches!(self, SessionState::Authenticated(_) | SessionState::Anonymous)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Views a guard can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// The first credential check has not resolved; do nothing yet.
    Pending,
    Allow,
    Redirect(Route),
}

/// Result object handed back by every session action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub user: Option<User>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl AuthOutcome {
    fn succeeded(user: Option<User>, message: Option<String>) -> Self {
        Self {
            success: true,
            user,
            message,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    user: User,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<User>,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// Picks the message to show for a failed action.
fn failure_message(err: &ClientError, fallback: &str) -> String {
    match err {
        ClientError::Api { .. }
        | ClientError::AuthRejected { .. }
        | ClientError::Validation(_)
        | ClientError::Network(_) => err.user_message(),
        _ => fallback.to_string(),
    }
}

//=========================================================================================
// SessionManager
//=========================================================================================

pub struct SessionManager {
    transport: Arc<CredentialTransport>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(transport: Arc<CredentialTransport>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self { transport, state }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated(_))
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Waits until a credential check has resolved. Something must be
    /// driving [`SessionManager::check_auth`] for this to return.
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let resolved = match rx.wait_for(SessionState::is_resolved).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        resolved
    }

    /// Asks the service who we are. Any failure resolves to `Anonymous`.
    pub async fn check_auth(&self) -> SessionState {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Unknown {
                *state = SessionState::Checking;
                true
            } else {
                false
            }
        });

        let next = match self.transport.get_json::<UserEnvelope>(ME_PATH).await {
            Ok(UserEnvelope { user: Some(user) }) => {
                info!("Credential check succeeded for user {}", user.id);
                SessionState::Authenticated(Session::from_user(&user))
            }
            Ok(UserEnvelope { user: None }) => SessionState::Anonymous,
            Err(e) => {
                warn!("Auth check failed: {}", e);
                SessionState::Anonymous
            }
        };
        self.state.send_replace(next.clone());
        next
    }

    pub async fn login(&self, credentials: &Credentials) -> AuthOutcome {
        let payload = Credentials {
            email: credentials.email.trim().to_string(),
            password: credentials.password.clone(),
        };

        match self
            .transport
            .post_json::<_, LoginResponse>(LOGIN_PATH, &payload)
            .await
        {
            Ok(LoginResponse { user, token }) => {
                if let Some(token) = token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    if let Err(e) = self.transport.tokens().set(token) {
                        warn!("Failed to store the bearer token: {}", e);
                    }
                }
                self.state
                    .send_replace(SessionState::Authenticated(Session::from_user(&user)));
                info!("Logged in as user {}", user.id);
                AuthOutcome::succeeded(Some(user), None)
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                self.state.send_replace(SessionState::Anonymous);
                AuthOutcome::failed(failure_message(&e, "Login failed"))
            }
        }
    }

    /// Creates an account. The caller logs in separately afterwards.
    pub async fn register(&self, registration: &Registration) -> AuthOutcome {
        match self
            .transport
            .post_json::<_, UserEnvelope>(REGISTER_PATH, registration)
            .await
        {
            Ok(UserEnvelope { user }) => AuthOutcome::succeeded(user, None),
            Err(e) => {
                warn!("Registration failed: {}", e);
                AuthOutcome::failed(failure_message(&e, "Registration failed"))
            }
        }
    }

    /// Drops the local session and token right away, then tells the service
    /// in the background. The returned handle only matters to callers that
    /// want to wait for the service call; its outcome never changes local state.
    pub fn logout(&self) -> JoinHandle<()> {
        let revoked = self.transport.stored_token();
        if let Err(e) = self.transport.tokens().clear() {
            warn!("Failed to clear the stored token: {}", e);
        }
        self.state.send_replace(SessionState::Anonymous);
        info!("Logged out");

        let transport = Arc::clone(&self.transport);
        let authorization = revoked
            .filter(|_| transport.policy().bearer_auth)
            .map(|token| format!("Bearer {}", token));
        tokio::spawn(async move {
            let headers: Vec<(&str, &str)> = authorization
                .as_deref()
                .map(|value| vec![("Authorization", value)])
                .unwrap_or_default();
            if let Err(e) = transport
                .request(HttpMethod::Post, LOGOUT_PATH, None, &headers)
                .await
            {
                warn!("Logout error: {}", e);
            }
        })
    }

    pub async fn forgot_password(&self, email: &str) -> AuthOutcome {
        let email = email.trim();
        if email.is_empty() {
            return AuthOutcome::failed("Please enter your email address");
        }
        match self
            .transport
            .post_json::<_, MessageEnvelope>(FORGOT_PASSWORD_PATH, &json!({ "email": email }))
            .await
        {
            Ok(MessageEnvelope { message }) => AuthOutcome::succeeded(None, message),
            Err(e) => AuthOutcome::failed(failure_message(&e, "Failed to send reset email")),
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthOutcome {
        if token.trim().is_empty() {
            return AuthOutcome::failed("Reset token is required");
        }
        if new_password.is_empty() {
            return AuthOutcome::failed("New password is required");
        }
        let payload = json!({ "token": token.trim(), "newPassword": new_password });
        match self
            .transport
            .post_json::<_, MessageEnvelope>(RESET_PASSWORD_PATH, &payload)
            .await
        {
            Ok(MessageEnvelope { message }) => AuthOutcome::succeeded(None, message),
            Err(e) => AuthOutcome::failed(failure_message(&e, "Password reset failed")),
        }
    }

    /// Stores a token that arrived out-of-band (an OAuth redirect) and
    /// re-runs the credential check with it.
    pub async fn adopt_token(&self, token: &str) -> SessionState {
        let token = token.trim();
        if token.is_empty() {
            return self.state();
        }
        if let Err(e) = self.transport.tokens().set(token) {
            warn!("Failed to store the bearer token: {}", e);
        }
        self.check_auth().await
    }

    /// Where to send the user for the third-party sign-in flow.
    pub fn oauth_url(&self) -> String {
        self.transport.endpoint(OAUTH_PATH)
    }

    /// Replaces the displayed user of an authenticated session, e.g. after a
    /// profile edit. Returns false when nobody is logged in.
    pub fn update_user(&self, user: &User) -> bool {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(_) => {
                *state = SessionState::Authenticated(Session::from_user(user));
                true
            }
            _ => false,
        })
    }

    /// Guard for protected views.
    pub fn require_auth(&self) -> GuardDecision {
        match &*self.state.borrow() {
            SessionState::Unknown | SessionState::Checking => GuardDecision::Pending,
            SessionState::Authenticated(_) => GuardDecision::Allow,
            SessionState::Anonymous => GuardDecision::Redirect(Route::Login),
        }
    }

    /// Guard for the login/registration views.
    pub fn redirect_if_authenticated(&self) -> GuardDecision {
        match &*self.state.borrow() {
            SessionState::Unknown | SessionState::Checking => GuardDecision::Pending,
            SessionState::Authenticated(_) => GuardDecision::Redirect(Route::Dashboard),
            SessionState::Anonymous => GuardDecision::Allow,
        }
    }
}
