//! Configuration loading and resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TENX_CONFIG` environment variable
//! 3. User config file (`~/.config/tenx/config.toml`)
//! 4. Compiled defaults (fallback, no file)
//!
//! After the file is loaded, individual `TENX_*` environment variables
//! override single values. A missing config file is never fatal.

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "TENX_CONFIG";

/// Minimum accepted length of a configured token signing secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub import: ImportConfig,
    pub github: GithubConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request bodies above this size are rejected with 413
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5800,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Configured database path, or `<data_local_dir>/tenx/tenx.db`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    /// Lifetime of issued tokens
    pub token_ttl_secs: i64,
    /// Accounts registered with these emails receive the admin role
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 7 * 24 * 60 * 60,
            admin_emails: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Resolve the token signing secret
    ///
    /// A configured secret shorter than [`MIN_JWT_SECRET_LEN`] is rejected.
    /// Without a configured secret a random one is generated, which means
    /// issued tokens stop validating after a restart.
    pub fn resolve_secret(&self) -> Result<String> {
        match &self.jwt_secret {
            Some(secret) if secret.len() >= MIN_JWT_SECRET_LEN => Ok(secret.clone()),
            Some(secret) => Err(Error::Config(format!(
                "auth.jwt_secret must be at least {} bytes (got {})",
                MIN_JWT_SECRET_LEN,
                secret.len()
            ))),
            None => {
                warn!("No JWT secret configured; generating an ephemeral secret (tokens will not survive restart)");
                let bytes: [u8; 32] = rand::thread_rng().gen();
                Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
            }
        }
    }

    /// Whether `email` is configured as an administrator
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Per-client quota for all `/api` routes
    pub requests_per_minute: u32,
    /// Additional per-client quota for `/api/auth` routes
    pub auth_requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 300,
            auth_requests_per_minute: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_archive_bytes: u64,
    pub max_file_bytes: u64,
    pub max_files: usize,
    pub max_cards: usize,
    pub max_screens_per_card: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_archive_bytes: 50 * 1024 * 1024,
            max_file_bytes: 100 * 1024,
            max_files: 200,
            max_cards: 20,
            max_screens_per_card: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API
    pub api_base: String,
    /// Optional token, raises the anonymous rate limit and allows private repos
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

/// OpenAI-compatible chat completion endpoint used by AI-assisted imports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum characters of repository content sent per request
    pub max_content_chars: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 800,
            temperature: 0.2,
            max_content_chars: 12_000,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Enabled and holding credentials
    pub fn is_configured(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration using the documented priority order
    ///
    /// Missing files fall back to defaults with a warning. A file that exists
    /// but does not parse is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => {
                info!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `TENX_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(host) = env_value("TENX_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_value("TENX_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid TENX_PORT '{}': {}", port, e)))?;
        }
        if let Some(path) = env_value("TENX_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(secret) = env_value("TENX_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(origins) = env_value("TENX_CORS_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(token) = env_value("TENX_GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(key) = env_value("TENX_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(endpoint) = env_value("TENX_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = env_value("TENX_LLM_MODEL") {
            self.llm.model = model;
        }
        Ok(())
    }
}

/// Load variables from a `.env` file in the working directory, if present
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!("Failed to load .env file: {}", e);
            None
        }
    }
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = env_value(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: User config file
    dirs::config_dir()
        .map(|d| d.join("tenx").join("config.toml"))
        .filter(|p| p.exists())
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tenx").join("tenx.db"))
        .unwrap_or_else(|| PathBuf::from("./tenx_data/tenx.db"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
