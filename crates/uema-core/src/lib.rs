//! Core types, configuration, and error handling for the UEMA retrieval core.
//!
//! This crate provides the shared foundation used by all other UEMA crates:
//! - [`UemaError`]: unified error type using `thiserror`
//! - [`UemaConfig`]: configuration loaded from `.uema.toml`
//! - [`UserContext`]: the acting user, passed explicitly for permission checks
//! - Shared types: [`Document`], [`Sector`], [`ScoredDocument`], [`ChatTurn`],
//!   [`OutputFormat`]

mod config;
mod context;
mod error;
mod types;

pub use config::{
    ChatConfig, ProviderConfig, RetrievalConfig, StoreConfig, UemaConfig, API_KEY_ENV,
};
pub use context::{UserContext, UserRole};
pub use error::UemaError;
pub use types::{
    ChatRole, ChatTurn, Document, DocumentStatus, DocumentType, OutputFormat, ScoredDocument,
    Sector,
};

/// A convenience `Result` type for UEMA operations.
pub type Result<T> = std::result::Result<T, UemaError>;

/// Take at most `max_chars` characters of `text`, never splitting a code point.
///
/// # Examples
///
/// ```
/// use uema_core::truncate_chars;
///
/// assert_eq!(truncate_chars("edição", 4), "ediç");
/// assert_eq!(truncate_chars("abc", 10), "abc");
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
