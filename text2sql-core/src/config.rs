//! Configuration for the text2sql server and console
//!
//! Priority order (highest to lowest):
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables (`DATABASE_URL`, `OPENAI_API_KEY`, ...)
//! 3. `$TEXT2SQL_CONFIG` or `~/.text2sql/config.toml`
//! 4. Built-in defaults

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Get the text2sql config directory path (~/.text2sql)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".text2sql"))
}

/// Load `.env` files from the current directory and `~/.text2sql/.env`.
///
/// dotenvy never overwrites variables that are already set, so the shell
/// environment always wins.
pub fn load_dotenv() {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
        loaded_from.push(path.display().to_string());
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => loaded_from.push(env_file.display().to_string()),
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.text2sql)");
    } else {
        info!("Loaded environment from: {}", loaded_from.join(", "));
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub client: ClientSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Lifetime of a login session
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

/// Metadata store (users, sessions, registered databases)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

// Manual Debug so the API key never reaches logs.
impl std::fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSection")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Connections to user databases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Console client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_session_ttl() -> u64 {
    24 * 7
}

fn default_database_url() -> String {
    let path = config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("text2sql.db");
    format!("sqlite://{}", path.display())
}

fn default_max_connections() -> u32 {
    5
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl AppConfig {
    /// Load config file (if any) and apply environment overrides.
    ///
    /// A missing config file is not an error; defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `$TEXT2SQL_CONFIG` or `~/.text2sql/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TEXT2SQL_CONFIG") {
            return PathBuf::from(path);
        }
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = non_empty("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(bind) = non_empty("TEXT2SQL_BIND") {
            self.server.bind = bind;
        }
        if let Some(endpoint) = non_empty("TEXT2SQL_ENDPOINT") {
            self.client.endpoint = endpoint;
        }
    }

    /// Parsed bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "server.bind",
                reason: e.to_string(),
            })
    }

    /// Serialize for display with the API key masked.
    pub fn to_redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.llm.api_key.is_some() {
            shown.llm.api_key = Some("***".to_string());
        }
        shown.database.url = crate::uri::redact(&shown.database.url);
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.llm.api_key.is_none());
        assert!(config.database.url.starts_with("sqlite://"));
        assert_eq!(config.bind_addr().unwrap().port(), 8000);
    }

    #[test]
    fn parses_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"
            cors_origins = ["http://localhost:8501"]

            [llm]
            model = "gpt-4o"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:8501"]);
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.server.session_ttl_hours, 168);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.remote.connect_timeout_secs, 10);
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = AppConfig::from_toml_str("[server\nbind = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite://meta.db"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", ""),
            ("TEXT2SQL_ENDPOINT", "http://box:8000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, "sqlite://meta.db");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        // empty values are ignored
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.client.endpoint, "http://box:8000");
    }

    #[test]
    fn invalid_bind_is_reported() {
        let mut config = AppConfig::default();
        config.server.bind = "localhost".into();
        let err = config.bind_addr().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "server.bind", .. }));
    }

    #[test]
    fn redacted_output_hides_secrets() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        config.database.url = "postgres://app:pw@localhost/meta".into();

        let shown = config.to_redacted_toml();
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains(":pw@"));
        assert!(!format!("{:?}", config.llm).contains("sk-secret"));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\nconnect_timeout_secs = 3\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.remote.connect_timeout_secs, 3);

        let missing = AppConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
