use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the StudyRAG server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the vector store instance holding document collections.
    pub qdrant_url: String,
    /// Optional API key required to access the vector store.
    pub qdrant_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API used for chat, embeddings, and transcription.
    pub openai_api_url: String,
    /// API key passed as a bearer token to the OpenAI-compatible API.
    pub openai_api_key: String,
    /// Chat model identifier used for generation.
    pub chat_model: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Character window applied when splitting ingested documents.
    pub chunk_size: usize,
    /// Character overlap between adjacent chunks.
    pub chunk_overlap: usize,
    /// Retrieval fan-out for the primary streaming endpoint.
    pub retrieval_top_k: usize,
    /// Retrieval fan-out for the compact (v2) streaming endpoint.
    pub retrieval_top_k_compact: usize,
    /// Hours of inactivity after which a chat session expires.
    pub session_timeout_hours: u64,
    /// Secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Optional base URL of the object store receiving uploaded PDFs.
    pub storage_base_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            openai_api_url: load_env_optional("OPENAI_API_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_api_key: load_env("OPENAI_API_KEY")?,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| "gpt-3.5-turbo-16k".to_string()),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 1536)?,
            chunk_size: parse_or("CHUNK_SIZE", 1200)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 150)?,
            retrieval_top_k: parse_or("RETRIEVAL_TOP_K", 10)?,
            retrieval_top_k_compact: parse_or("RETRIEVAL_TOP_K_COMPACT", 5)?,
            session_timeout_hours: parse_or("SESSION_TIMEOUT_HOURS", 24)?,
            jwt_secret: load_env("JWT_SECRET")?,
            storage_base_url: load_env_optional("STORAGE_BASE_URL"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        openai_api_url = %config.openai_api_url,
        chat_model = %config.chat_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
