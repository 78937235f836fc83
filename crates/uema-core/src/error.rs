/// Errors that can occur across the UEMA retrieval core.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Report` at the boundary.
/// Retrieval and chat composition absorb these errors into fallbacks, so
/// they only surface from the store, configuration and CLI layers.
///
/// # Examples
///
/// ```
/// use uema_core::UemaError;
///
/// let err = UemaError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum UemaError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .uema.toml or run 'uema init' to create one"))]
    Config(String),

    /// Remote embedding, rerank or chat endpoint failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// SQLite store failure.
    #[error("database error: {0}")]
    Database(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A document or session id did not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// The acting user may not perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation was superseded before it completed.
    #[error("operation cancelled")]
    Cancelled,
}
