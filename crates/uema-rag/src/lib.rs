//! Document retrieval for grounded chat and search.
//!
//! Ranks institutional documents against a free-text query with one of
//! three strategies: cosine similarity over remote embeddings, a remote
//! cross-encoder reranker for larger candidate sets, and offline keyword
//! matching as the fallback whenever no provider is configured or a remote
//! call fails.

pub mod cache;
pub mod cancel;
pub mod embedding;
pub mod keyword;
pub mod provider;
pub mod rerank;
pub mod retrieval;
pub mod similarity;
pub mod text;

pub use cancel::{CancelToken, QueryScope};
pub use retrieval::{Retrieval, Retriever, Strategy};
