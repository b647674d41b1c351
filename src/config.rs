use std::path::PathBuf;

use actix_web::cookie::Key;

use crate::import::dispatcher::DEFAULT_MAX_DOCUMENT_BYTES;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
            ConfigError::Invalid { name, value } => write!(f, "{name} has invalid value '{value}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Option<String>,
    pub access_denied_url: String,
    pub default_return_url: String,
    pub import_max_bytes: usize,
    pub files_root: PathBuf,
}

impl AppConfig {
    /// Read settings from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {e}");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let import_max_bytes = match get("IMPORT_MAX_BYTES") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "IMPORT_MAX_BYTES",
                value: v.clone(),
            })?,
            None => DEFAULT_MAX_DOCUMENT_BYTES,
        };
        Ok(Self {
            database_url,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            session_key: get("SESSION_KEY"),
            access_denied_url: get("ACCESS_DENIED_URL").unwrap_or_else(|| "/access-denied".to_string()),
            default_return_url: get("DEFAULT_RETURN_URL").unwrap_or_else(|| "/".to_string()),
            import_max_bytes,
            files_root: get("PORTAL_FILES_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/portals")),
        })
    }

    /// Cookie signing key. Sessions survive restarts only with a 64+ byte SESSION_KEY.
    pub fn session_key(&self) -> Key {
        match &self.session_key {
            Some(val) if val.len() >= 64 => {
                log::info!("Using SESSION_KEY from environment");
                Key::from(val.as_bytes())
            }
            Some(val) => {
                log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
                Key::generate()
            }
            None => {
                log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
                Key::generate()
            }
        }
    }
}
