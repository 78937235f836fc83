use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uema_core::{Document, RetrievalConfig, Sector, UemaError};
use uema_rag::embedding::EmbeddingClient;
use uema_rag::keyword::rank_by_keywords;
use uema_rag::provider::{EmbeddingProvider, InputType, RerankHit, RerankProvider};
use uema_rag::rerank::RerankerClient;
use uema_rag::{CancelToken, QueryScope, Retriever, Strategy};

/// Embeds text as a two-dimensional vector: `[mentions "edital", 1.0]`.
#[derive(Default)]
struct FakeEmbedder {
    calls: AtomicUsize,
    fail_queries: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, UemaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_queries && input_type == InputType::SearchQuery {
            return Err(UemaError::Provider("503 Service Unavailable".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let hit = if t.to_lowercase().contains("edital") { 1.0 } else { 0.0 };
                vec![hit, 1.0 - hit]
            })
            .collect())
    }
}

#[derive(Default)]
struct FakeReranker {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl RerankProvider for FakeReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, UemaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UemaError::Provider("timeout".into()));
        }
        // Reverse input order with descending scores.
        Ok((0..documents.len())
            .rev()
            .take(top_n)
            .enumerate()
            .map(|(rank, index)| RerankHit {
                index,
                relevance_score: 1.0 - rank as f64 * 0.1,
            })
            .collect())
    }
}

fn retriever(embedder: Arc<FakeEmbedder>, reranker: Arc<FakeReranker>) -> Retriever {
    let config = RetrievalConfig::default();
    Retriever::new(
        EmbeddingClient::new(embedder, &config),
        Some(RerankerClient::new(reranker, &config)),
        &config,
    )
}

fn three_docs() -> Vec<Document> {
    vec![
        Document::new("edital", "Edital 01/2025 - Monitoria", Sector::Prog)
            .with_content("O Edital 01/2025 estabelece prazo de 30 dias para as inscrições."),
        Document::new("ata", "Ata da reunião do CONSUN", Sector::Reitoria)
            .with_summary("Deliberações sobre o calendário"),
        Document::new("portaria", "Portaria de férias", Sector::Progep)
            .with_content("Concessão de férias coletivas aos servidores."),
    ]
}

fn many_docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("d{i}"), format!("Edital {i}"), Sector::Prog))
        .collect()
}

#[tokio::test]
async fn unconfigured_matches_keyword_ranker_exactly() {
    let config = RetrievalConfig::default();
    let offline = Retriever::offline(&config);
    let docs = three_docs();

    let result = offline.retrieve("prazo edital", &docs, &CancelToken::new()).await;
    let direct = rank_by_keywords("prazo edital", &docs, config.top_k);

    assert_eq!(result.strategy, Strategy::Keyword);
    assert!(result.degraded_from.is_none());
    assert_eq!(result.documents, direct);
}

#[tokio::test]
async fn large_candidate_set_uses_reranker_not_embeddings() {
    let embedder = Arc::new(FakeEmbedder::default());
    let reranker = Arc::new(FakeReranker::default());
    let retriever = retriever(embedder.clone(), reranker.clone());

    let docs = many_docs(11);
    let result = retriever.retrieve("edital", &docs, &CancelToken::new()).await;

    assert_eq!(result.strategy, Strategy::Rerank);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.documents.len(), 5);
    // provider order kept: last document first
    assert_eq!(result.documents[0].document.id, "d10");
    assert_eq!(result.documents[4].document.id, "d6");
}

#[tokio::test]
async fn rerank_failure_degrades_to_keyword() {
    let embedder = Arc::new(FakeEmbedder::default());
    let reranker = Arc::new(FakeReranker {
        fail: true,
        ..FakeReranker::default()
    });
    let retriever = retriever(embedder, reranker);

    let docs = many_docs(12);
    let result = retriever.retrieve("edital 3", &docs, &CancelToken::new()).await;

    assert_eq!(result.strategy, Strategy::Keyword);
    assert_eq!(result.degraded_from, Some(Strategy::Rerank));
    assert_eq!(result.documents.len(), 5);
}

#[tokio::test]
async fn small_candidate_set_uses_semantic_ranking() {
    let embedder = Arc::new(FakeEmbedder::default());
    let reranker = Arc::new(FakeReranker::default());
    let retriever = retriever(embedder.clone(), reranker.clone());

    let docs = three_docs();
    let result = retriever
        .retrieve("qual o prazo do edital?", &docs, &CancelToken::new())
        .await;

    assert_eq!(result.strategy, Strategy::Semantic);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
    // one query embedding plus one per document
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    assert_eq!(result.documents.len(), 3);
    assert_eq!(result.documents[0].document.id, "edital");
    assert!((result.documents[0].score - 1.0).abs() < 1e-9);
    // zero-similarity documents are kept, not excluded
    assert_eq!(result.documents[2].score, 0.0);
}

#[tokio::test]
async fn repeated_semantic_query_is_served_from_cache() {
    let embedder = Arc::new(FakeEmbedder::default());
    let retriever = retriever(embedder.clone(), Arc::new(FakeReranker::default()));
    let docs = three_docs();

    retriever.retrieve("edital", &docs, &CancelToken::new()).await;
    retriever.retrieve("edital", &docs, &CancelToken::new()).await;

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn query_embedding_failure_degrades_to_keyword() {
    let embedder = Arc::new(FakeEmbedder {
        fail_queries: true,
        ..FakeEmbedder::default()
    });
    let retriever = retriever(embedder, Arc::new(FakeReranker::default()));

    let result = retriever
        .retrieve("prazo edital 01/2025", &three_docs(), &CancelToken::new())
        .await;

    assert_eq!(result.strategy, Strategy::Keyword);
    assert_eq!(result.degraded_from, Some(Strategy::Semantic));
    assert_eq!(result.document_ids(), vec!["edital"]);
}

#[tokio::test]
async fn empty_corpus_uses_keyword_without_calls() {
    let embedder = Arc::new(FakeEmbedder::default());
    let reranker = Arc::new(FakeReranker::default());
    let retriever = retriever(embedder.clone(), reranker.clone());

    let result = retriever.retrieve("edital", &[], &CancelToken::new()).await;

    assert_eq!(result.strategy, Strategy::Keyword);
    assert!(result.documents.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn superseded_query_returns_cancelled_without_fallback() {
    let embedder = Arc::new(FakeEmbedder {
        delay: Some(Duration::from_secs(30)),
        ..FakeEmbedder::default()
    });
    let retriever = Arc::new(retriever(embedder, Arc::new(FakeReranker::default())));
    let scope = QueryScope::new();

    let token = scope.begin();
    let in_flight = {
        let retriever = retriever.clone();
        tokio::spawn(async move { retriever.retrieve("edital", &three_docs(), &token).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let _newer = scope.begin();

    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .expect("cancelled retrieval should finish promptly")
        .unwrap();
    assert!(result.cancelled);
    assert!(result.documents.is_empty());
    assert!(result.degraded_from.is_none());
}

#[tokio::test]
async fn keyword_scenario_prazo_edital() {
    let result = Retriever::offline(&RetrievalConfig::default())
        .retrieve("prazo edital 01/2025", &three_docs(), &CancelToken::new())
        .await;

    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].document.id, "edital");
    assert!(result.documents[0].score > 0.0);
}

#[tokio::test]
async fn already_cancelled_query_publishes_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = Retriever::offline(&RetrievalConfig::default())
        .retrieve("edital", &three_docs(), &cancel)
        .await;

    assert!(result.cancelled);
    assert!(result.documents.is_empty());
}

#[tokio::test(start_paused = true)]
async fn document_embeddings_are_requested_together() {
    let delay = Duration::from_millis(100);
    let embedder = Arc::new(FakeEmbedder {
        delay: Some(delay),
        ..FakeEmbedder::default()
    });
    let retriever = retriever(embedder.clone(), Arc::new(FakeReranker::default()));

    let started = tokio::time::Instant::now();
    let result = retriever
        .retrieve("prazo do edital", &three_docs(), &CancelToken::new())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.strategy, Strategy::Semantic);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    // query embedding, then one round for all three documents
    assert!(elapsed >= delay * 2, "finished too early: {elapsed:?}");
    assert!(elapsed < delay * 3, "document embeddings ran one by one: {elapsed:?}");
}
