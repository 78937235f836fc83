//! Grounded chat over retrieved institutional documents.
//!
//! - [`llm`]: the hosted chat model seam and its HTTP client
//! - [`prompt`]: the preamble confining answers to retrieved evidence
//! - [`composer`]: non-failing chat composition
//! - [`assistant`]: permission-filtered retrieval, chat and session persistence

pub mod assistant;
pub mod composer;
pub mod llm;
pub mod prompt;

pub use assistant::{Assistant, AssistantReply};
pub use composer::{ChatComposer, ChatReply};
