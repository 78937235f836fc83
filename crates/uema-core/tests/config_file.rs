use uema_core::{UemaConfig, UemaError};

#[test]
fn loads_partial_file_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".uema.toml");
    std::fs::write(
        &path,
        r#"
[provider]
chat_model = "command-r"

[retrieval]
rerank_threshold = 20

[store]
path = "data/uema.db"
"#,
    )
    .unwrap();

    let config = UemaConfig::from_file(&path).unwrap();
    assert_eq!(config.provider.chat_model, "command-r");
    assert_eq!(config.provider.embed_model, "embed-multilingual-v3.0");
    assert_eq!(config.retrieval.rerank_threshold, 20);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.chat.history_limit, 10);
    assert_eq!(config.store.path, std::path::PathBuf::from("data/uema.db"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = UemaConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(UemaError::Io(_))));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".uema.toml");
    std::fs::write(&path, "[chat]\ntemperature = 5.0\n").unwrap();

    assert!(matches!(
        UemaConfig::from_file(&path),
        Err(UemaError::Config(_))
    ));
}
