//! Local persistence for the UEMA retrieval core.
//!
//! Holds documents (with their tags, summaries and extracted text) and chat
//! sessions in a single SQLite database.

pub mod documents;

pub use documents::{DocumentStore, SessionInfo, StoreStats};
