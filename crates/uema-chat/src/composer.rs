//! Grounded chat composition.
//!
//! The reply's `document_ids` are the documents offered as context. The
//! model output is not parsed, so they are not guaranteed to be the ones it
//! actually cited.

use std::sync::Arc;

use serde::Serialize;
use uema_core::{ChatConfig, ChatTurn, ScoredDocument, UemaError};
use uema_rag::CancelToken;

use crate::llm::ChatProvider;
use crate::prompt::{build_preamble, APOLOGY};

/// Answer text plus the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    pub document_ids: Vec<String>,
    /// `text` is the fixed apology rather than a model answer.
    pub degraded: bool,
}

impl ChatReply {
    fn apology(document_ids: Vec<String>) -> Self {
        Self {
            text: APOLOGY.to_string(),
            document_ids,
            degraded: true,
        }
    }
}

/// Sends grounded prompts to a [`ChatProvider`] and never fails.
pub struct ChatComposer {
    provider: Option<Arc<dyn ChatProvider>>,
    temperature: f64,
    excerpt_chars: usize,
}

impl ChatComposer {
    pub fn new(provider: Arc<dyn ChatProvider>, config: &ChatConfig) -> Self {
        Self {
            provider: Some(provider),
            temperature: config.temperature,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// A composer with no chat model; every reply is the apology.
    pub fn unconfigured(config: &ChatConfig) -> Self {
        Self {
            provider: None,
            temperature: config.temperature,
            excerpt_chars: config.excerpt_chars,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Answer `message` using only `documents` as evidence.
    ///
    /// Failures of any kind, an empty answer, a missing provider and
    /// cancellation all yield the apology with `degraded` set.
    pub async fn respond(
        &self,
        message: &str,
        documents: &[ScoredDocument],
        history: &[ChatTurn],
        cancel: &CancelToken,
    ) -> ChatReply {
        let document_ids: Vec<String> = documents.iter().map(|s| s.document.id.clone()).collect();

        let Some(provider) = &self.provider else {
            tracing::warn!("no chat provider configured");
            return ChatReply::apology(document_ids);
        };

        let preamble = build_preamble(documents, self.excerpt_chars);
        tracing::debug!(
            documents = documents.len(),
            history = history.len(),
            preamble_chars = preamble.chars().count(),
            "sending grounded chat request"
        );

        let result = cancel
            .run(provider.chat(&preamble, history, message, self.temperature))
            .await;

        match result {
            Ok(text) if !text.trim().is_empty() => ChatReply {
                text,
                document_ids,
                degraded: false,
            },
            Ok(_) => {
                tracing::warn!("chat model returned an empty reply");
                ChatReply::apology(document_ids)
            }
            Err(UemaError::Cancelled) => {
                tracing::debug!("chat request cancelled");
                ChatReply::apology(document_ids)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                ChatReply::apology(document_ids)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uema_core::{Document, Sector};

    use crate::prompt::NOT_FOUND;

    #[derive(Default)]
    struct Recording {
        reply: Option<String>,
        preambles: Mutex<Vec<String>>,
        temperatures: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl ChatProvider for Recording {
        async fn chat(
            &self,
            preamble: &str,
            _history: &[ChatTurn],
            _message: &str,
            temperature: f64,
        ) -> Result<String, UemaError> {
            self.preambles.lock().push(preamble.to_string());
            self.temperatures.lock().push(temperature);
            self.reply
                .clone()
                .ok_or_else(|| UemaError::Provider("500 Internal Server Error".into()))
        }
    }

    fn answering(text: &str) -> Arc<Recording> {
        Arc::new(Recording {
            reply: Some(text.to_string()),
            ..Recording::default()
        })
    }

    #[tokio::test]
    async fn zero_documents_still_get_an_answer() {
        let provider = answering(NOT_FOUND);
        let composer = ChatComposer::new(provider.clone(), &ChatConfig::default());

        let reply = composer
            .respond("Quem ganhou a Copa?", &[], &[], &CancelToken::new())
            .await;

        assert!(!reply.degraded);
        assert!(!reply.text.is_empty());
        assert!(reply.document_ids.is_empty());
        let preambles = provider.preambles.lock();
        let context = preambles[0].split("CONTEXTO:\n").nth(1).unwrap();
        assert!(context.contains(NOT_FOUND));
    }

    #[tokio::test]
    async fn offered_documents_are_reported() {
        let provider = answering("Segundo o Edital 01/2025, o prazo é de 30 dias.");
        let composer = ChatComposer::new(provider.clone(), &ChatConfig::default());
        let docs = vec![ScoredDocument {
            document: Document::new("ed-1", "Edital 01/2025", Sector::Prog),
            score: 0.8,
        }];

        let reply = composer
            .respond("prazo?", &docs, &[], &CancelToken::new())
            .await;

        assert_eq!(reply.document_ids, vec!["ed-1".to_string()]);
        assert!(!reply.degraded);
        assert_eq!(provider.temperatures.lock()[0], 0.3);
    }

    #[tokio::test]
    async fn provider_failure_yields_apology() {
        let composer = ChatComposer::new(Arc::new(Recording::default()), &ChatConfig::default());
        let reply = composer.respond("oi", &[], &[], &CancelToken::new()).await;
        assert_eq!(reply.text, APOLOGY);
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn blank_reply_yields_apology() {
        let composer = ChatComposer::new(answering("  \n"), &ChatConfig::default());
        let reply = composer.respond("oi", &[], &[], &CancelToken::new()).await;
        assert_eq!(reply.text, APOLOGY);
    }

    #[tokio::test]
    async fn cancelled_request_never_reaches_provider() {
        let provider = answering("resposta");
        let composer = ChatComposer::new(provider.clone(), &ChatConfig::default());
        let cancel = CancelToken::new();
        cancel.cancel();

        let reply = composer.respond("oi", &[], &[], &cancel).await;
        assert!(reply.degraded);
        assert!(provider.preambles.lock().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_composer_apologizes() {
        let composer = ChatComposer::unconfigured(&ChatConfig::default());
        assert!(!composer.is_configured());
        let reply = composer.respond("oi", &[], &[], &CancelToken::new()).await;
        assert_eq!(reply.text, APOLOGY);
    }
}
