//! Remote model seams and the hosted HTTP client behind them.
//!
//! [`EmbeddingProvider`] and [`RerankProvider`] are the two remote
//! collaborators of the retrieval pipeline. [`CohereClient`] implements both
//! against a Cohere-compatible API (`/v1/embed`, `/v1/rerank`).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uema_core::{ProviderConfig, UemaError};

/// How the embedding model should treat the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// A user query.
    SearchQuery,
    /// A document to be retrieved.
    SearchDocument,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::SearchQuery => write!(f, "search_query"),
            InputType::SearchDocument => write!(f, "search_document"),
        }
    }
}

/// One entry of a rerank response.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RerankHit {
    /// Position of the document in the request's `documents` list.
    pub index: usize,
    pub relevance_score: f64,
}

/// Converts text to vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every text; the result holds one vector per input, in order.
    async fn embed(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, UemaError>;
}

/// Scores documents against a query with a cross-encoder.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Return at most `top_n` hits, most relevant first.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, UemaError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: InputType,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

/// Client for a Cohere-compatible embed and rerank API.
///
/// Each call is attempted exactly once; there is no retry or backoff.
///
/// # Examples
///
/// ```
/// use uema_core::ProviderConfig;
/// use uema_rag::provider::CohereClient;
///
/// let client = CohereClient::new(&ProviderConfig::default(), "test-key").unwrap();
/// assert_eq!(client.embed_model(), "embed-multilingual-v3.0");
/// ```
pub struct CohereClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embed_model: String,
    rerank_model: String,
}

impl fmt::Debug for CohereClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereClient")
            .field("base_url", &self.base_url)
            .field("embed_model", &self.embed_model)
            .field("rerank_model", &self.rerank_model)
            .finish_non_exhaustive()
    }
}

impl CohereClient {
    /// Create a client from provider settings and a resolved API key.
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
            embed_model: config.embed_model.clone(),
            rerank_model: config.rerank_model.clone(),
        })
    }

    /// Build a client only if an API key resolves from `config` or the environment.
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

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn rerank_model(&self) -> &str {
        &self.rerank_model
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, UemaError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| UemaError::Provider(format!("HTTP request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(UemaError::Provider(format!(
                "{path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UemaError::Provider(format!("failed to parse {path} response: {e}")))
    }
}

#[async_trait]
impl EmbeddingProvider for CohereClient {
    async fn embed(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, UemaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            texts,
            model: &self.embed_model,
            input_type,
            truncate: "END",
        };
        let response: EmbedResponse = self.post("/v1/embed", &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(UemaError::Provider(format!(
                "embed returned {} vectors for {} texts",
                response.embeddings.len(),
                texts.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl RerankProvider for CohereClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, UemaError> {
        let request = RerankRequest {
            model: &self.rerank_model,
            query,
            documents,
            top_n,
        };
        let response: RerankResponse = self.post("/v1/rerank", &request).await?;
        Ok(response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_request_format_is_correct() {
        let texts = vec!["Edital 01/2025".to_string(), "Resolução".to_string()];
        let request = EmbedRequest {
            texts: &texts,
            model: "embed-multilingual-v3.0",
            input_type: InputType::SearchDocument,
            truncate: "END",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "embed-multilingual-v3.0");
        assert_eq!(json["input_type"], "search_document");
        assert_eq!(json["truncate"], "END");
        assert_eq!(json["texts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn embed_response_parsing_works() {
        let json = r#"{"id": "x", "embeddings": [[0.1, 0.2], [0.3, 0.4]], "texts": ["a", "b"]}"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[1], vec![0.3, 0.4]);
    }

    #[test]
    fn rerank_request_and_response_shapes() {
        let docs = vec!["a".to_string()];
        let request = RerankRequest {
            model: "rerank-multilingual-v3.0",
            query: "prazo",
            documents: &docs,
            top_n: 5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["top_n"], 5);
        assert_eq!(json["query"], "prazo");

        let body = r#"{"results": [{"index": 3, "relevance_score": 0.91}, {"index": 0, "relevance_score": 0.12}]}"#;
        let response: RerankResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results[0].index, 3);
        assert!((response.results[0].relevance_score - 0.91).abs() < 1e-9);
    }

    #[test]
    fn input_type_displays_wire_name() {
        assert_eq!(InputType::SearchQuery.to_string(), "search_query");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ProviderConfig {
            base_url: "http://localhost:9000/".into(),
            ..ProviderConfig::default()
        };
        let client = CohereClient::new(&config, "k").unwrap();
        assert!(format!("{client:?}").contains("http://localhost:9000\""));
    }

    #[test]
    fn from_config_without_key_is_none() {
        let config = ProviderConfig {
            api_key: Some(String::new()),
            ..ProviderConfig::default()
        };
        // A blank file key falls through to the environment.
        if std::env::var(uema_core::API_KEY_ENV).is_err() {
            assert!(CohereClient::from_config(&config).unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn empty_embed_batch_skips_network() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..ProviderConfig::default()
        };
        let client = CohereClient::new(&config, "k").unwrap();
        let vectors = client.embed(&[], InputType::SearchQuery).await.unwrap();
        assert!(vectors.is_empty());
    }
}
