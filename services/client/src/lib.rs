//! services/client/src/lib.rs
//!
//! Notes client: session handling, the credential-carrying transport, typed
//! note calls and debounced autosave, plus the adapters that connect them to
//! the network and the filesystem.

pub mod adapters;
pub mod autosave;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod notes;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use autosave::AutosaveScheduler;
pub use session::{AuthOutcome, GuardDecision, Route, SessionManager, SessionState};
pub use state::AppState;
pub use transport::CredentialTransport;
