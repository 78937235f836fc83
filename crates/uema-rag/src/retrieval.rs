//! Retrieval orchestration across the three ranking strategies.
//!
//! One [`Strategy`] is selected per query from the provider state and the
//! candidate count, then degraded to [`Strategy::Keyword`] if its remote
//! call fails. `retrieve` never returns an error.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use uema_core::{Document, RetrievalConfig, ScoredDocument, UemaConfig, UemaError};

use crate::cancel::CancelToken;
use crate::embedding::EmbeddingClient;
use crate::keyword::rank_by_keywords;
use crate::provider::{CohereClient, InputType};
use crate::rerank::RerankerClient;
use crate::similarity::rank_by_similarity;
use crate::text::document_blurb;

/// How a query's documents are ranked.
///
/// # Examples
///
/// ```
/// use uema_rag::retrieval::Strategy;
///
/// assert_eq!(Strategy::select(false, 50, 10), Strategy::Keyword);
/// assert_eq!(Strategy::select(true, 0, 10), Strategy::Keyword);
/// assert_eq!(Strategy::select(true, 11, 10), Strategy::Rerank);
/// assert_eq!(Strategy::select(true, 10, 10), Strategy::Semantic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Query and document embeddings compared by cosine similarity.
    Semantic,
    /// Remote cross-encoder over the whole candidate set.
    Rerank,
    /// Offline word matching.
    Keyword,
}

impl Strategy {
    /// Pick the strategy for one query.
    pub fn select(provider_configured: bool, candidates: usize, rerank_threshold: usize) -> Self {
        if !provider_configured || candidates == 0 {
            Strategy::Keyword
        } else if candidates > rerank_threshold {
            Strategy::Rerank
        } else {
            Strategy::Semantic
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Semantic => write!(f, "semantic"),
            Strategy::Rerank => write!(f, "rerank"),
            Strategy::Keyword => write!(f, "keyword"),
        }
    }
}

/// Ranked documents for one query plus how they were obtained.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieval {
    /// Strategy that produced `documents`.
    pub strategy: Strategy,
    /// Strategy originally selected, when it failed and keyword ranking ran instead.
    pub degraded_from: Option<Strategy>,
    /// The query was superseded; `documents` is empty and must not be shown.
    pub cancelled: bool,
    pub documents: Vec<ScoredDocument>,
}

impl Retrieval {
    fn ranked(strategy: Strategy, documents: Vec<ScoredDocument>) -> Self {
        Self {
            strategy,
            degraded_from: None,
            cancelled: false,
            documents,
        }
    }

    fn cancelled(strategy: Strategy) -> Self {
        Self {
            strategy,
            degraded_from: None,
            cancelled: true,
            documents: Vec::new(),
        }
    }

    /// Identifiers of the ranked documents, in rank order.
    pub fn document_ids(&self) -> Vec<String> {
        self.documents.iter().map(|s| s.document.id.clone()).collect()
    }
}

/// Chooses and runs a ranking strategy per query.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, RetrievalConfig, Sector};
/// use uema_rag::cancel::CancelToken;
/// use uema_rag::retrieval::{Retriever, Strategy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let retriever = Retriever::offline(&RetrievalConfig::default());
/// let docs = vec![Document::new("1", "Edital 01/2025", Sector::Prog)];
/// let result = retriever.retrieve("edital", &docs, &CancelToken::new()).await;
/// assert_eq!(result.strategy, Strategy::Keyword);
/// assert_eq!(result.documents.len(), 1);
/// # }
/// ```
pub struct Retriever {
    embeddings: EmbeddingClient,
    reranker: Option<RerankerClient>,
    top_k: usize,
    rerank_threshold: usize,
    embed_chars: usize,
}

impl Retriever {
    /// Assemble a retriever from its parts.
    pub fn new(
        embeddings: EmbeddingClient,
        reranker: Option<RerankerClient>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            reranker,
            top_k: config.top_k.max(1),
            rerank_threshold: config.rerank_threshold,
            embed_chars: config.cache_prefix_chars,
        }
    }

    /// A retriever with no provider: every query uses keyword ranking.
    pub fn offline(config: &RetrievalConfig) -> Self {
        Self::new(EmbeddingClient::unconfigured(config), None, config)
    }

    /// Build from configuration, using the hosted provider when an API key resolves.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] if the HTTP client cannot be built.
    pub fn from_config(config: &UemaConfig) -> Result<Self, UemaError> {
        let retrieval = &config.retrieval;
        match CohereClient::from_config(&config.provider)? {
            Some(client) => {
                let client = Arc::new(client);
                Ok(Self::new(
                    EmbeddingClient::new(client.clone(), retrieval),
                    Some(RerankerClient::new(client, retrieval)),
                    retrieval,
                ))
            }
            None => {
                tracing::info!("no provider API key; retrieval runs in keyword mode");
                Ok(Self::offline(retrieval))
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.embeddings.is_configured()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embeddings(&self) -> &EmbeddingClient {
        &self.embeddings
    }

    /// Rank `documents` against `query`, returning at most `top_k` of them.
    pub async fn retrieve(
        &self,
        query: &str,
        documents: &[Document],
        cancel: &CancelToken,
    ) -> Retrieval {
        let strategy = Strategy::select(self.is_configured(), documents.len(), self.rerank_threshold);
        tracing::info!(%strategy, candidates = documents.len(), "selected retrieval strategy");

        if cancel.is_cancelled() {
            return Retrieval::cancelled(strategy);
        }

        match strategy {
            Strategy::Keyword => self.keyword(query, documents, None),
            Strategy::Rerank => self.rerank(query, documents, cancel).await,
            Strategy::Semantic => self.semantic(query, documents, cancel).await,
        }
    }

    fn keyword(
        &self,
        query: &str,
        documents: &[Document],
        degraded_from: Option<Strategy>,
    ) -> Retrieval {
        let mut retrieval = Retrieval::ranked(
            Strategy::Keyword,
            rank_by_keywords(query, documents, self.top_k),
        );
        retrieval.degraded_from = degraded_from;
        retrieval
    }

    async fn rerank(&self, query: &str, documents: &[Document], cancel: &CancelToken) -> Retrieval {
        let Some(reranker) = &self.reranker else {
            tracing::warn!("no reranker available, falling back to keyword ranking");
            return self.keyword(query, documents, Some(Strategy::Rerank));
        };

        match reranker.rerank(query, documents, self.top_k, cancel).await {
            Ok(ranked) => Retrieval::ranked(Strategy::Rerank, ranked),
            Err(UemaError::Cancelled) => {
                tracing::debug!("rerank cancelled");
                Retrieval::cancelled(Strategy::Rerank)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rerank failed, falling back to keyword ranking");
                self.keyword(query, documents, Some(Strategy::Rerank))
            }
        }
    }

    async fn semantic(
        &self,
        query: &str,
        documents: &[Document],
        cancel: &CancelToken,
    ) -> Retrieval {
        let Some(query_vector) = self
            .embeddings
            .embed(query, InputType::SearchQuery, cancel)
            .await
        else {
            if cancel.is_cancelled() {
                return Retrieval::cancelled(Strategy::Semantic);
            }
            tracing::warn!("query embedding unavailable, falling back to keyword ranking");
            return self.keyword(query, documents, Some(Strategy::Semantic));
        };

        let pending = documents.iter().map(|doc| {
            let text = document_blurb(doc, self.embed_chars);
            async move {
                self.embeddings
                    .embed(&text, InputType::SearchDocument, cancel)
                    .await
            }
        });
        let vectors = join_all(pending).await;

        if cancel.is_cancelled() {
            return Retrieval::cancelled(Strategy::Semantic);
        }

        let missing = vectors.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            tracing::debug!(missing, "documents without embeddings rank last");
        }

        let candidates = documents.iter().cloned().zip(vectors).collect();
        Retrieval::ranked(
            Strategy::Semantic,
            rank_by_similarity(&query_vector, candidates, self.top_k),
        )
    }
}
