//! Cross-encoder reranking for larger candidate sets.

use std::sync::Arc;

use uema_core::{Document, RetrievalConfig, ScoredDocument, UemaError};

use crate::cancel::CancelToken;
use crate::provider::RerankProvider;
use crate::text::document_blurb;

/// Maps a [`RerankProvider`] response back onto documents.
///
/// The provider's order is kept as returned; nothing here re-sorts it.
pub struct RerankerClient {
    provider: Arc<dyn RerankProvider>,
    content_chars: usize,
}

impl RerankerClient {
    pub fn new(provider: Arc<dyn RerankProvider>, config: &RetrievalConfig) -> Self {
        Self {
            provider,
            content_chars: config.rerank_content_chars,
        }
    }

    /// Rerank `documents` against `query` and return the top `top_n`.
    ///
    /// Hits pointing outside `documents` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Provider`] if the call fails or yields no usable
    /// hit, and [`UemaError::Cancelled`] if `cancel` fires first.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[Document],
        top_n: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<ScoredDocument>, UemaError> {
        let blurbs: Vec<String> = documents
            .iter()
            .map(|doc| document_blurb(doc, self.content_chars))
            .collect();

        let hits = cancel
            .run(self.provider.rerank(query, &blurbs, top_n))
            .await?;

        let ranked: Vec<ScoredDocument> = hits
            .into_iter()
            .filter_map(|hit| {
                let Some(doc) = documents.get(hit.index) else {
                    tracing::warn!(index = hit.index, "rerank hit out of range, dropped");
                    return None;
                };
                Some(ScoredDocument {
                    document: doc.clone(),
                    score: hit.relevance_score,
                })
            })
            .take(top_n)
            .collect();

        if ranked.is_empty() {
            return Err(UemaError::Provider("rerank returned no usable results".into()));
        }
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uema_core::Sector;

    use crate::provider::RerankHit;

    struct Scripted {
        hits: Vec<RerankHit>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RerankProvider for Scripted {
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<RerankHit>, UemaError> {
            self.seen.lock().extend(documents.iter().cloned());
            Ok(self.hits.clone())
        }
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("d{i}"), format!("Documento {i}"), Sector::Prog))
            .collect()
    }

    fn hit(index: usize, relevance_score: f64) -> RerankHit {
        RerankHit {
            index,
            relevance_score,
        }
    }

    #[tokio::test]
    async fn provider_order_is_authoritative() {
        // deliberately not sorted by score
        let provider = Arc::new(Scripted {
            hits: vec![hit(2, 0.4), hit(0, 0.9), hit(1, 0.1)],
            seen: Mutex::new(Vec::new()),
        });
        let client = RerankerClient::new(provider.clone(), &RetrievalConfig::default());

        let ranked = client
            .rerank("q", &docs(3), 5, &CancelToken::new())
            .await
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.document.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d0", "d1"]);
        assert_eq!(ranked[0].score, 0.4);
        assert_eq!(provider.seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn out_of_range_hits_are_dropped() {
        let provider = Arc::new(Scripted {
            hits: vec![hit(7, 0.9), hit(1, 0.5)],
            seen: Mutex::new(Vec::new()),
        });
        let client = RerankerClient::new(provider, &RetrievalConfig::default());

        let ranked = client
            .rerank("q", &docs(2), 5, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].document.id, "d1");
    }

    #[tokio::test]
    async fn no_usable_hits_is_an_error() {
        let provider = Arc::new(Scripted {
            hits: vec![hit(9, 0.9)],
            seen: Mutex::new(Vec::new()),
        });
        let client = RerankerClient::new(provider, &RetrievalConfig::default());
        let result = client.rerank("q", &docs(2), 5, &CancelToken::new()).await;
        assert!(matches!(result, Err(UemaError::Provider(_))));
    }

    #[tokio::test]
    async fn blurbs_carry_truncated_content() {
        let provider = Arc::new(Scripted {
            hits: vec![hit(0, 0.9)],
            seen: Mutex::new(Vec::new()),
        });
        let config = RetrievalConfig {
            rerank_content_chars: 5,
            ..RetrievalConfig::default()
        };
        let client = RerankerClient::new(provider.clone(), &config);
        let doc = Document::new("x", "Ata", Sector::Ccs).with_content("abcdefghij");

        client
            .rerank("q", &[doc], 1, &CancelToken::new())
            .await
            .unwrap();
        let seen = provider.seen.lock();
        assert!(seen[0].contains("Conteúdo: abcde"));
        assert!(!seen[0].contains("abcdef"));
    }
}
