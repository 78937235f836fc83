//! Embedding client with an in-memory LRU cache.
//!
//! Text is cut to a bounded prefix that doubles as the request payload and
//! the cache key. Failures never reach the caller: an unconfigured provider,
//! a transport or HTTP error, a malformed response or a cancelled request
//! all come back as `None` so that the caller can fall back.

use std::sync::Arc;

use uema_core::{truncate_chars, RetrievalConfig, UemaError};

use crate::cache::{CacheStats, EmbeddingCache};
use crate::cancel::CancelToken;
use crate::provider::{EmbeddingProvider, InputType};

/// Caching, non-failing front end to an [`EmbeddingProvider`].
///
/// # Examples
///
/// ```
/// use uema_core::RetrievalConfig;
/// use uema_rag::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::unconfigured(&RetrievalConfig::default());
/// assert!(!client.is_configured());
/// ```
pub struct EmbeddingClient {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    cache: EmbeddingCache,
    prefix_chars: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("configured", &self.is_configured())
            .field("prefix_chars", &self.prefix_chars)
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl EmbeddingClient {
    /// Create a client backed by `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &RetrievalConfig) -> Self {
        Self {
            provider: Some(provider),
            cache: EmbeddingCache::new(config.cache_capacity),
            prefix_chars: config.cache_prefix_chars,
        }
    }

    /// Create a client with no provider; every call returns `None`.
    pub fn unconfigured(config: &RetrievalConfig) -> Self {
        Self {
            provider: None,
            cache: EmbeddingCache::new(config.cache_capacity),
            prefix_chars: config.cache_prefix_chars,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Embed `text`, serving repeated prefixes from the cache.
    ///
    /// Returns `None` on any failure; see the module docs.
    pub async fn embed(
        &self,
        text: &str,
        input_type: InputType,
        cancel: &CancelToken,
    ) -> Option<Vec<f32>> {
        let provider = self.provider.as_ref()?;
        let prefix = truncate_chars(text, self.prefix_chars);

        if let Some(vector) = self.cache.get(prefix) {
            tracing::debug!(chars = prefix.chars().count(), "embedding cache hit");
            return Some(vector);
        }

        let texts = [prefix.to_string()];
        match cancel.run(provider.embed(&texts, input_type)).await {
            Ok(vectors) => match vectors.into_iter().next().filter(|v| !v.is_empty()) {
                Some(vector) => {
                    self.cache.insert(prefix, vector.clone());
                    Some(vector)
                }
                None => {
                    tracing::warn!(%input_type, "embedding provider returned no vector");
                    None
                }
            },
            Err(UemaError::Cancelled) => {
                tracing::debug!(%input_type, "embedding request cancelled");
                None
            }
            Err(e) => {
                tracing::warn!(%input_type, error = %e, "embedding request failed");
                None
            }
        }
    }

    /// Drop every cached vector.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for Counting {
        async fn embed(
            &self,
            texts: &[String],
            _input_type: InputType,
        ) -> Result<Vec<Vec<f32>>, UemaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UemaError::Provider("503".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn client(fail: bool, prefix_chars: usize) -> (Arc<Counting>, EmbeddingClient) {
        let provider = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        });
        let config = RetrievalConfig {
            cache_prefix_chars: prefix_chars,
            ..RetrievalConfig::default()
        };
        (provider.clone(), EmbeddingClient::new(provider, &config))
    }

    #[tokio::test]
    async fn same_text_calls_provider_once() {
        let (provider, client) = client(false, 512);
        let cancel = CancelToken::new();

        let first = client.embed("edital", InputType::SearchQuery, &cancel).await;
        let second = client.embed("edital", InputType::SearchQuery, &cancel).await;

        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn texts_sharing_a_prefix_share_a_cache_entry() {
        let (provider, client) = client(false, 6);
        let cancel = CancelToken::new();

        client
            .embed("edital 01/2025", InputType::SearchDocument, &cancel)
            .await;
        client
            .embed("edital 02/2025", InputType::SearchQuery, &cancel)
            .await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn failures_become_none_and_are_not_cached() {
        let (provider, client) = client(true, 512);
        let cancel = CancelToken::new();

        assert!(client.embed("x", InputType::SearchQuery, &cancel).await.is_none());
        assert!(client.embed("x", InputType::SearchQuery, &cancel).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn unconfigured_returns_none() {
        let client = EmbeddingClient::unconfigured(&RetrievalConfig::default());
        let cancel = CancelToken::new();
        assert!(client.embed("x", InputType::SearchQuery, &cancel).await.is_none());
    }

    #[tokio::test]
    async fn cancelled_token_skips_provider() {
        let (provider, client) = client(false, 512);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(client.embed("x", InputType::SearchQuery, &cancel).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let (provider, client) = client(false, 512);
        let cancel = CancelToken::new();

        client.embed("x", InputType::SearchQuery, &cancel).await;
        client.clear_cache();
        client.embed("x", InputType::SearchQuery, &cancel).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
