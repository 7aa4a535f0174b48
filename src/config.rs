use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cards: CardsConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the pre-built frontend. Nothing is served when unset.
    #[serde(default)]
    pub web_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default = "default_jwt_expire")]
    pub expire_minutes: u64,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    #[serde(default = "default_quota")]
    pub quota: u64,
    /// Directory for in-flight uploads; the system temp dir when unset
    #[serde(default)]
    pub temp_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardsConfig {
    #[serde(default = "default_card_max_files")]
    pub max_files: usize,
    #[serde(default = "default_card_max_total_size")]
    pub max_total_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default)]
    pub metadata_api_key: Option<String>,
    #[serde(default)]
    pub folder_suggestions_api_key: Option<String>,
    #[serde(default = "default_chat_pdf_base_url")]
    pub chat_pdf_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/cardshare.db".to_string()
}

fn default_jwt_secret() -> String {
    "your-super-secret-key-change-it".to_string()
}

fn default_jwt_expire() -> u64 {
    60
}

fn default_local_path() -> String {
    "data/bucket".to_string()
}

fn default_max_upload_size() -> u64 {
    50 * MIB
}

fn default_quota() -> u64 {
    2 * 1024 * MIB
}

fn default_card_max_files() -> usize {
    10
}

fn default_card_max_total_size() -> u64 {
    100 * MIB
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_chat_pdf_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            web_root: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            expire_minutes: default_jwt_expire(),
            cookie_secure: false,
        }
    }
}

impl StorageConfig {
    /// Where uploads are staged before they reach the bucket
    pub fn upload_temp_dir(&self) -> PathBuf {
        self.temp_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            max_upload_size: default_max_upload_size(),
            quota: default_quota(),
            temp_path: None,
        }
    }
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            max_files: default_card_max_files(),
            max_total_size: default_card_max_total_size(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini_base_url: default_gemini_base_url(),
            gemini_model: default_gemini_model(),
            metadata_api_key: None,
            folder_suggestions_api_key: None,
            chat_pdf_base_url: default_chat_pdf_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Reads the prefixed variable first, then the legacy unprefixed one.
fn env_with_fallback(key: &str, legacy: &str) -> Option<String> {
    env::var(key)
        .or_else(|_| env::var(legacy))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        tracing::info!(
            "AI config: model={}, metadata_key={}, folder_key={}, chat_pdf={}",
            config.ai.gemini_model,
            config.ai.metadata_api_key.is_some(),
            config.ai.folder_suggestions_api_key.is_some(),
            config.ai.chat_pdf_base_url
        );
        Ok(config)
    }

    /// Parse a TOML document, filling gaps with defaults
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Ensure JWT secret is secure and persisted
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Load configuration from config.toml or conf.ini
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "conf.ini", "data/config.toml", "data/conf.ini"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: CS_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CS_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("CS_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = env::var("CS_CONF_SERVER_WEB_ROOT") {
            self.server.web_root = Some(val).filter(|v| !v.trim().is_empty());
        }

        if let Ok(val) = env::var("CS_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Some(val) = env_with_fallback("CS_CONF_JWT_SECRET", "JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("CS_CONF_JWT_PREVIOUS_SECRETS") {
            self.jwt.previous_secrets = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Ok(val) = env::var("CS_CONF_JWT_EXPIRE_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.jwt.expire_minutes = minutes;
            }
        }
        if let Ok(val) = env::var("CS_CONF_JWT_COOKIE_SECURE") {
            if let Ok(v) = val.parse() {
                self.jwt.cookie_secure = v;
            }
        }

        if let Ok(val) = env::var("CS_CONF_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Ok(val) = env::var("CS_CONF_STORAGE_MAX_UPLOAD_SIZE") {
            if let Ok(size) = val.parse() {
                self.storage.max_upload_size = size;
            }
        }
        if let Ok(val) = env::var("CS_CONF_STORAGE_QUOTA") {
            if let Ok(size) = val.parse() {
                self.storage.quota = size;
            }
        }
        if let Ok(val) = env::var("CS_CONF_STORAGE_TEMP_PATH") {
            self.storage.temp_path = Some(val).filter(|v| !v.trim().is_empty());
        }

        if let Ok(val) = env::var("CS_CONF_CARDS_MAX_FILES") {
            if let Ok(n) = val.parse() {
                self.cards.max_files = n;
            }
        }
        if let Ok(val) = env::var("CS_CONF_CARDS_MAX_TOTAL_SIZE") {
            if let Ok(size) = val.parse() {
                self.cards.max_total_size = size;
            }
        }

        if let Ok(val) = env::var("CS_CONF_AI_GEMINI_BASE_URL") {
            self.ai.gemini_base_url = val;
        }
        if let Ok(val) = env::var("CS_CONF_AI_GEMINI_MODEL") {
            self.ai.gemini_model = val;
        }
        if let Some(val) = env_with_fallback("CS_CONF_AI_METADATA_API_KEY", "GEMINI_API_KEY_METADATA") {
            self.ai.metadata_api_key = Some(val);
        }
        if let Some(val) = env_with_fallback(
            "CS_CONF_AI_FOLDER_SUGGESTIONS_API_KEY",
            "GEMINI_API_KEY_FOLDER_SUGGESTIONS",
        ) {
            self.ai.folder_suggestions_api_key = Some(val);
        }
        if let Some(val) = env_with_fallback("CS_CONF_AI_CHAT_PDF_BASE_URL", "CHAT_PDF_API_BASE") {
            self.ai.chat_pdf_base_url = val;
        }
        if let Ok(val) = env::var("CS_CONF_AI_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.ai.request_timeout_secs = secs;
            }
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.local_path)?;
        if let Some(temp_path) = &self.storage.temp_path {
            fs::create_dir_all(temp_path)?;
        }

        Ok(())
    }
}
