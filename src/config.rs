use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default OpenAI REST endpoint used when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Fallback dotenv location checked after `.env` in the working directory.
pub const DEFAULT_ENV_FILE: &str = "assets/.env";

const DEFAULT_VECTOR_STORE_NAME: &str = "user-documents";
const DEFAULT_ASSISTANT_NAME: &str = "Doctor Assistant";
const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4o";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 540;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the pdfscribe server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Secret key for the OpenAI API. Absence is fatal once the session bootstraps.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI REST API.
    pub openai_base_url: String,
    /// Existing vector store to reuse instead of creating a new one.
    pub vector_store_id: Option<String>,
    /// Display name given to a freshly created vector store.
    pub vector_store_name: String,
    /// Existing assistant to reuse instead of creating a new one.
    pub assistant_id: Option<String>,
    /// Display name given to a freshly created assistant.
    pub assistant_name: String,
    /// Model identifier bound to the assistant and the chat completion route.
    pub assistant_model: String,
    /// Retrieval scope applied to each run.
    pub run_scope: RunScope,
    /// Defer session bootstrap until the first request arrives.
    pub lazy_bootstrap: bool,
    /// Fallback delay between status polls when the provider gives no hint.
    pub poll_interval_ms: u64,
    /// Upper bound for a single wait-until-terminal loop.
    pub poll_timeout_secs: u64,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Which documents the assistant may search while answering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunScope {
    /// Search everything indexed in the shared vector store.
    #[default]
    Store,
    /// Attach the uploaded file to the prompt so retrieval favours it.
    File,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            vector_store_id: load_env_optional("VECTOR_STORE_ID"),
            vector_store_name: load_env_optional("VECTOR_STORE_NAME")
                .unwrap_or_else(|| DEFAULT_VECTOR_STORE_NAME.to_string()),
            assistant_id: load_env_optional("ASSISTANT_ID"),
            assistant_name: load_env_optional("ASSISTANT_NAME")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
            assistant_model: load_env_optional("ASSISTANT_MODEL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string()),
            run_scope: load_env_optional("RUN_SCOPE")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("RUN_SCOPE".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            lazy_bootstrap: load_env_optional("LAZY_BOOTSTRAP")
                .map(|value| parse_bool("LAZY_BOOTSTRAP", &value))
                .transpose()?
                .unwrap_or(false),
            poll_interval_ms: parse_optional("POLL_INTERVAL_MS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            poll_timeout_secs: parse_optional("POLL_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Return the API key or fail with a configuration error.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("OPENAI_API_KEY".to_string()))
    }

    /// Fallback delay between status polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound for a wait-until-terminal loop.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            vector_store_id: None,
            vector_store_name: DEFAULT_VECTOR_STORE_NAME.to_string(),
            assistant_id: None,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            assistant_model: DEFAULT_ASSISTANT_MODEL.to_string(),
            run_scope: RunScope::Store,
            lazy_bootstrap: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_port: None,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

impl std::str::FromStr for RunScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load `.env` and the fallback dotenv file into the process environment.
///
/// `.env` in the working directory wins; `PDFSCRIBE_ENV_FILE` (or `assets/.env`) only fills in
/// variables that are still unset. Run this before [`crate::logging::init_tracing`] so
/// `RUST_LOG` and `PDFSCRIBE_LOG_FILE` from those files take effect.
pub fn load_env_files() {
    dotenvy::dotenv().ok();
    let fallback = env::var("PDFSCRIBE_ENV_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENV_FILE));
    if fallback.is_file() {
        dotenvy::from_path(&fallback).ok();
    }
}

/// Load dotenv files and the environment, then install the result in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    load_env_files();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_scope_parses_case_insensitively() {
        assert_eq!("FILE".parse::<RunScope>(), Ok(RunScope::File));
        assert_eq!(" store ".parse::<RunScope>(), Ok(RunScope::Store));
        assert!("everything".parse::<RunScope>().is_err());
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert!(parse_bool("X", "yes").expect("yes"));
        assert!(!parse_bool("X", "0").expect("0"));
        assert!(matches!(
            parse_bool("LAZY_BOOTSTRAP", "maybe"),
            Err(ConfigError::InvalidValue(key)) if key == "LAZY_BOOTSTRAP"
        ));
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = Config::default();
        let err = config.require_api_key().expect_err("key should be missing");
        assert_eq!(err.to_string(), "Missing environment variable: OPENAI_API_KEY");
    }

    #[test]
    fn fallback_env_file_fills_unset_variables() {
        let path = env::temp_dir().join(format!("pdfscribe-{}.env", std::process::id()));
        std::fs::write(&path, "PDFSCRIBE_DOTENV_MARKER=from-file\n").expect("write env file");
        // SAFETY: only this test touches these variables.
        unsafe {
            env::set_var("PDFSCRIBE_ENV_FILE", &path);
        }

        load_env_files();
        assert_eq!(
            env::var("PDFSCRIBE_DOTENV_MARKER").as_deref(),
            Ok("from-file")
        );

        // SAFETY: only this test touches these variables.
        unsafe {
            env::remove_var("PDFSCRIBE_ENV_FILE");
            env::remove_var("PDFSCRIBE_DOTENV_MARKER");
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn defaults_match_serverless_limits() {
        let config = Config::default();
        assert_eq!(config.poll_timeout(), Duration::from_secs(540));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.assistant_model, "gpt-4o");
        assert_eq!(config.run_scope, RunScope::Store);
    }
}
