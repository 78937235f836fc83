//! The question-answering flow behind `uema chat`.
//!
//! Documents are filtered by what the acting user may view before any
//! ranking happens, so nothing outside the user's permissions can reach the
//! model's context.

use std::sync::Arc;

use serde::Serialize;
use uema_core::{Document, ScoredDocument, UemaConfig, UemaError, UserContext, UserRole};
use uema_rag::{CancelToken, Retrieval, Retriever, Strategy};
use uema_store::DocumentStore;

use crate::composer::{ChatComposer, ChatReply};
use crate::llm::CohereChat;

/// Everything one `ask` produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub session_id: i64,
    pub reply: ChatReply,
    pub strategy: Strategy,
    pub degraded_from: Option<Strategy>,
    /// Documents offered to the model, best first.
    pub related: Vec<ScoredDocument>,
}

/// Ties the store, retriever and composer together for one user at a time.
pub struct Assistant {
    store: DocumentStore,
    retriever: Retriever,
    composer: ChatComposer,
    history_limit: usize,
}

impl Assistant {
    pub fn new(
        store: DocumentStore,
        retriever: Retriever,
        composer: ChatComposer,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            composer,
            history_limit,
        }
    }

    /// Build the retriever and chat client from configuration.
    ///
    /// Without an API key both run unconfigured: retrieval uses keyword
    /// ranking and every answer is the apology.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] if an HTTP client cannot be built.
    pub fn from_config(store: DocumentStore, config: &UemaConfig) -> Result<Self, UemaError> {
        let retriever = Retriever::from_config(config)?;
        let composer = match CohereChat::from_config(&config.provider)? {
            Some(chat) => ChatComposer::new(Arc::new(chat), &config.chat),
            None => ChatComposer::unconfigured(&config.chat),
        };
        Ok(Self::new(
            store,
            retriever,
            composer,
            config.chat.history_limit,
        ))
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Documents `user` is allowed to see.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] if the store cannot be read.
    pub fn visible_documents(&self, user: &UserContext) -> Result<Vec<Document>, UemaError> {
        let mut documents = self.store.list_documents()?;
        let total = documents.len();
        documents.retain(|doc| user.can_view(doc));
        tracing::debug!(
            user = %user.name,
            visible = documents.len(),
            total,
            "filtered documents by permission"
        );
        Ok(documents)
    }

    /// Rank the documents `user` can see against `query`.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] if the store cannot be read.
    pub async fn search(
        &self,
        user: &UserContext,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Retrieval, UemaError> {
        let documents = self.visible_documents(user)?;
        Ok(self.retriever.retrieve(query, &documents, cancel).await)
    }

    /// Answer `message` for `user`, continuing `session_id` or starting a new session.
    ///
    /// The user message and the reply are persisted together once the reply
    /// exists. A cancelled query persists nothing.
    ///
    /// # Errors
    ///
    /// - [`UemaError::Cancelled`] if `cancel` fires before the reply is ready.
    /// - [`UemaError::NotFound`] if `session_id` does not exist.
    /// - [`UemaError::PermissionDenied`] if the session belongs to someone else.
    /// - [`UemaError::Database`] on store failures.
    pub async fn ask(
        &self,
        user: &UserContext,
        session_id: Option<i64>,
        message: &str,
        cancel: &CancelToken,
    ) -> Result<AssistantReply, UemaError> {
        if let Some(id) = session_id {
            self.check_session_owner(user, id)?;
        }

        let documents = self.visible_documents(user)?;
        let history = match session_id {
            Some(id) => self.store.history(id, self.history_limit)?,
            None => Vec::new(),
        };

        let retrieval = self.retriever.retrieve(message, &documents, cancel).await;
        if retrieval.cancelled {
            return Err(UemaError::Cancelled);
        }

        let reply = self
            .composer
            .respond(message, &retrieval.documents, &history, cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(UemaError::Cancelled);
        }

        let session_id = match session_id {
            Some(id) => id,
            None => self.store.create_session(&user.name)?,
        };
        self.store
            .append_exchange(session_id, message, &reply.text)?;

        tracing::info!(
            session = session_id,
            strategy = %retrieval.strategy,
            documents = retrieval.documents.len(),
            degraded = reply.degraded,
            "answered chat message"
        );

        Ok(AssistantReply {
            session_id,
            reply,
            strategy: retrieval.strategy,
            degraded_from: retrieval.degraded_from,
            related: retrieval.documents,
        })
    }

    fn check_session_owner(&self, user: &UserContext, session_id: i64) -> Result<(), UemaError> {
        let owner = self
            .store
            .session_owner(session_id)?
            .ok_or_else(|| UemaError::NotFound(format!("chat session {session_id}")))?;
        if owner == user.name || user.role == UserRole::Admin {
            return Ok(());
        }
        Err(UemaError::PermissionDenied(format!(
            "chat session {session_id} belongs to another user"
        )))
    }
}
