use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uema_core::{ChatRole, ChatTurn, ProviderConfig, UemaError};

/// A hosted chat model that answers one message given a preamble and history.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send `message` and return the model's reply text.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] on transport, status or parse failures.
    async fn chat(
        &self,
        preamble: &str,
        history: &[ChatTurn],
        message: &str,
        temperature: f64,
    ) -> Result<String, UemaError>;
}

/// Role names used by the chat endpoint's history entries.
///
/// # Examples
///
/// ```
/// use uema_chat::llm::HistoryRole;
/// use uema_core::ChatRole;
///
/// let role = HistoryRole::from(ChatRole::Assistant);
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"CHATBOT\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryRole {
    User,
    Chatbot,
}

impl From<ChatRole> for HistoryRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => HistoryRole::User,
            ChatRole::Assistant => HistoryRole::Chatbot,
        }
    }
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    role: HistoryRole,
    message: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    chat_history: Vec<HistoryEntry<'a>>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

/// Cohere-compatible `/v1/chat` client.
///
/// # Examples
///
/// ```
/// use uema_core::ProviderConfig;
/// use uema_chat::llm::CohereChat;
///
/// let client = CohereChat::new(&ProviderConfig::default(), "test-key").unwrap();
/// assert_eq!(client.model(), "command-r-plus");
/// ```
pub struct CohereChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for CohereChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereChat")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CohereChat {
    /// Create a chat client from provider settings and a resolved API key.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig, api_key: &str) -> Result<Self, UemaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UemaError::Provider(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        })
    }

    /// Build a client only if an API key resolves.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] if the HTTP client cannot be built.
    pub fn from_config(config: &ProviderConfig) -> Result<Option<Self>, UemaError> {
        config
            .resolved_api_key()
            .map(|key| Self::new(config, &key))
            .transpose()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatProvider for CohereChat {
    async fn chat(
        &self,
        preamble: &str,
        history: &[ChatTurn],
        message: &str,
        temperature: f64,
    ) -> Result<String, UemaError> {
        let url = format!("{}/v1/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            message,
            preamble,
            chat_history: history
                .iter()
                .map(|turn| HistoryEntry {
                    role: turn.role.into(),
                    message: &turn.content,
                })
                .collect(),
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UemaError::Provider(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(UemaError::Provider(format!(
                "chat API error {status}: {body_text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UemaError::Provider(format!("failed to parse chat response: {e}")))?;

        Ok(parsed.text)
    }
}
