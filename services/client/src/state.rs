//! services/client/src/state.rs
//!
//! Defines the application context shared by every front end.

use crate::adapters::{FileTokenStore, ReqwestExchange};
use crate::autosave::AutosaveScheduler;
use crate::config::Config;
use crate::error::ClientError;
use crate::notes::NotesApi;
use crate::session::{SessionManager, SessionState};
use crate::transport::CredentialTransport;
use notes_core::ports::{HttpExchange, TokenStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

//=========================================================================================
// AppState (Created Once at Startup)
//=========================================================================================

/// Everything a front end needs, wired together once and handed around.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: Arc<CredentialTransport>,
    pub session: Arc<SessionManager>,
    pub notes: Arc<NotesApi>,
    pub autosave: AutosaveScheduler,
    /// Cancelled by [`AppState::shutdown`]; long-running commands watch it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        tokens: Arc<dyn TokenStore>,
        exchange: Arc<dyn HttpExchange>,
    ) -> Self {
        let transport = Arc::new(CredentialTransport::from_config(&config, tokens, exchange));
        let session = Arc::new(SessionManager::new(transport.clone()));
        let notes = Arc::new(NotesApi::new(transport.clone()));
        let autosave = AutosaveScheduler::new(
            notes.clone(),
            config.autosave_delay,
            config.autosave_overlap,
        );

        Self {
            config,
            transport,
            session,
            notes,
            autosave,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wires the real adapters: a token file on disk and a reqwest client.
    pub fn from_config(config: Arc<Config>) -> Result<Self, ClientError> {
        let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
        let exchange = Arc::new(ReqwestExchange::new()?);
        Ok(Self::new(config, tokens, exchange))
    }

    /// Runs the initial credential check.
    pub async fn start(&self) -> SessionState {
        info!("Checking credentials against {}", self.transport.origin());
        self.session.check_auth().await
    }

    /// Teardown: stops pending autosaves and signals long-running commands.
    pub fn shutdown(&self) {
        self.autosave.cancel_all();
        self.shutdown.cancel();
        info!("Client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTokenStore;
    use crate::testing::{Reply, ScriptedExchange, TEST_ORIGIN};
    use notes_core::ports::HttpMethod;
    use notes_core::{EditPatch, RecordId};
    use serde_json::json;
    use std::time::Duration;

    fn app(exchange: &Arc<ScriptedExchange>) -> AppState {
        let config = Arc::new(Config::local(TEST_ORIGIN).unwrap());
        AppState::new(config, Arc::new(MemoryTokenStore::new()), exchange.clone())
    }

    #[tokio::test]
    async fn start_runs_the_credential_check() {
        let exchange = ScriptedExchange::new();
        exchange.on(
            HttpMethod::Get,
            "/auth/me",
            Reply::json(200, json!({"user": {"id": 1, "name": "A"}})),
        );
        let state = app(&exchange);

        let resolved = state.start().await;

        assert!(resolved.session().is_some());
        assert!(state.session.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_autosaves() {
        let exchange = ScriptedExchange::new();
        let state = app(&exchange);
        let id = RecordId::Number(1);

        state.autosave.on_edit(Some(&id), EditPatch::full("T", "C"));
        state.shutdown();
        tokio::time::sleep(state.autosave.delay() + Duration::from_secs(1)).await;

        assert!(state.shutdown.is_cancelled());
        assert!(exchange.requests().is_empty());
    }
}
