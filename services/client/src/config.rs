//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use notes_core::{AuthPolicy, AutosaveOverlap};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// Origin used when running against a backend on the developer's machine.
pub const LOCAL_API_ORIGIN: &str = "http://localhost:5000";

/// Quiet period before an edit is autosaved.
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("No backend origin configured for the {0} environment; set NOTES_API_URL")]
    MissingOrigin(String),
}

/// Where the client is running. Only a local environment may fall back to a
/// built-in backend origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Deployed,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" | "development" | "dev" | "test" => Environment::Local,
            _ => Environment::Deployed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Deployed => "deployed",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub api_origin: String,
    pub log_level: Level,
    pub token_path: PathBuf,
    pub auth_policy: AuthPolicy,
    pub autosave_delay: Duration,
    pub autosave_overlap: AutosaveOverlap,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // --- Environment and Backend Origin ---
        let environment = var("NOTES_ENV")
            .map(|raw| Environment::parse(&raw))
            .unwrap_or(Environment::Deployed);

        let api_origin = match (var("NOTES_API_URL"), environment) {
            (Some(raw), _) => normalize_origin(&raw)?,
            (None, Environment::Local) => LOCAL_API_ORIGIN.to_string(),
            (None, Environment::Deployed) => {
                return Err(ConfigError::MissingOrigin(environment.as_str().to_string()))
            }
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let token_path = var("NOTES_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_token_path);

        // --- Credential Transports ---
        let auth_policy = AuthPolicy {
            cookie_auth: parse_flag("NOTES_COOKIE_AUTH", var("NOTES_COOKIE_AUTH"), true)?,
            bearer_auth: parse_flag("NOTES_BEARER_AUTH", var("NOTES_BEARER_AUTH"), true)?,
        };

        // --- Autosave ---
        let autosave_delay = match var("NOTES_AUTOSAVE_DELAY_MS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| {
                ConfigError::InvalidValue("NOTES_AUTOSAVE_DELAY_MS".to_string(), e.to_string())
            })?,
            None => Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS),
        };

        let autosave_overlap = match var("NOTES_AUTOSAVE_OVERLAP")
            .map(|raw| raw.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("queue") => AutosaveOverlap::Queue,
            Some("drop") => AutosaveOverlap::Drop,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "NOTES_AUTOSAVE_OVERLAP".to_string(),
                    format!("'{}' is neither 'queue' nor 'drop'", other),
                ))
            }
        };

        Ok(Self {
            environment,
            api_origin,
            log_level,
            token_path,
            auth_policy,
            autosave_delay,
            autosave_overlap,
        })
    }

    /// A local configuration pointing at `api_origin`, with defaults for the rest.
    pub fn local(api_origin: &str) -> Result<Self, ConfigError> {
        let origin = api_origin.to_string();
        Self::from_lookup(move |key| match key {
            "NOTES_ENV" => Some("local".to_string()),
            "NOTES_API_URL" => Some(origin.clone()),
            _ => None,
        })
    }
}

/// Checks that `raw` is an http(s) origin with a host and strips any trailing slash.
pub fn normalize_origin(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidValue("NOTES_API_URL".to_string(), reason);

    let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn default_token_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("notes-client").join("token"))
        .unwrap_or_else(|| PathBuf::from(".notes-token"))
}
