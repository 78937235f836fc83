use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UemaError;

/// Environment variable consulted when `provider.api_key` is absent.
pub const API_KEY_ENV: &str = "COHERE_API_KEY";

/// Top-level configuration loaded from `.uema.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use uema_core::UemaConfig;
///
/// let config = UemaConfig::default();
/// assert_eq!(config.retrieval.top_k, 5);
/// assert_eq!(config.retrieval.rerank_threshold, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UemaConfig {
    /// Hosted AI provider settings (embed, rerank, chat).
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Ranking behavior settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Grounded chat settings.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Local document store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

impl UemaConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Io`] if the file cannot be read, or
    /// [`UemaError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uema_core::UemaConfig;
    /// use std::path::Path;
    ///
    /// let config = UemaConfig::from_file(Path::new(".uema.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, UemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use uema_core::UemaConfig;
    ///
    /// let toml = r#"
    /// [retrieval]
    /// top_k = 8
    /// "#;
    /// let config = UemaConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.top_k, 8);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, UemaError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make ranking meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), UemaError> {
        if self.retrieval.top_k == 0 {
            return Err(UemaError::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.cache_capacity == 0 {
            return Err(UemaError::Config(
                "retrieval.cache_capacity must be at least 1".into(),
            ));
        }
        if self.retrieval.cache_prefix_chars == 0 {
            return Err(UemaError::Config(
                "retrieval.cache_prefix_chars must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(UemaError::Config(format!(
                "chat.temperature must be within 0.0..=2.0, got {}",
                self.chat.temperature
            )));
        }
        Ok(())
    }
}

/// Hosted provider configuration.
///
/// All three endpoints share one base URL and one credential. The provider
/// counts as configured only when an API key resolves, either from the file
/// or from [`API_KEY_ENV`].
///
/// # Examples
///
/// ```
/// use uema_core::ProviderConfig;
///
/// let config = ProviderConfig::default();
/// assert_eq!(config.embed_model, "embed-multilingual-v3.0");
/// assert_eq!(config.base_url, "https://api.cohere.ai");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Base URL for API requests (default: `https://api.cohere.ai`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Multilingual embedding model.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Cross-encoder rerank model.
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,
    /// Chat model used for grounded answers.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.cohere.ai".into()
}

fn default_embed_model() -> String {
    "embed-multilingual-v3.0".into()
}

fn default_rerank_model() -> String {
    "rerank-multilingual-v3.0".into()
}

fn default_chat_model() -> String {
    "command-r-plus".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            rerank_model: default_rerank_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the config, then from [`API_KEY_ENV`].
    ///
    /// Blank keys count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        let present = |k: &String| !k.trim().is_empty();
        self.api_key
            .clone()
            .filter(present)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(present))
    }
}

/// Ranking configuration.
///
/// # Examples
///
/// ```
/// use uema_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.cache_capacity, 1024);
/// assert_eq!(config.cache_prefix_chars, 512);
/// assert_eq!(config.rerank_content_chars, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of ranked documents returned per query (default: 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate count above which the reranker is used (default: 10).
    #[serde(default = "default_rerank_threshold")]
    pub rerank_threshold: usize,
    /// Maximum embeddings kept in memory (default: 1024).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Characters of text used as the embedding input and cache key (default: 512).
    #[serde(default = "default_cache_prefix_chars")]
    pub cache_prefix_chars: usize,
    /// Characters of extracted content sent per document to the reranker (default: 1000).
    #[serde(default = "default_rerank_content_chars")]
    pub rerank_content_chars: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_rerank_threshold() -> usize {
    10
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cache_prefix_chars() -> usize {
    512
}

fn default_rerank_content_chars() -> usize {
    1000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_threshold: default_rerank_threshold(),
            cache_capacity: default_cache_capacity(),
            cache_prefix_chars: default_cache_prefix_chars(),
            rerank_content_chars: default_rerank_content_chars(),
        }
    }
}

/// Grounded chat configuration.
///
/// # Examples
///
/// ```
/// use uema_core::ChatConfig;
///
/// let config = ChatConfig::default();
/// assert_eq!(config.temperature, 0.3);
/// assert_eq!(config.excerpt_chars, 500);
/// assert_eq!(config.history_limit, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature sent to the chat model (default: 0.3).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Characters of extracted content quoted per document (default: 500).
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Prior messages forwarded as history (default: 10).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_temperature() -> f64 {
    0.3
}

fn default_excerpt_chars() -> usize {
    500
}

fn default_history_limit() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            excerpt_chars: default_excerpt_chars(),
            history_limit: default_history_limit(),
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (default: `.uema/store.db`).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".uema/store.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}
