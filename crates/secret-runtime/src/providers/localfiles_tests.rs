//! Tests for the local filesystem provider.

use super::*;
use crate::client::SecretProvider;
use serde_json::json;
use tempfile::tempdir;
use tokio_stream::StreamExt;

async fn new_provider(directory: &Path) -> LocalFilesProvider {
    let mut config = SecretStoreConfig::new("test-store", "localfiles");
    config.uri = directory.to_string_lossy().into_owned();
    LocalFilesProvider::new(config).await.unwrap()
}

fn sample_data() -> SecretData {
    let mut data = SecretData::new();
    data.insert("username".to_string(), json!("admin"));
    data.insert("password".to_string(), json!("hunter2"));
    data
}

#[tokio::test]
async fn test_missing_uri_fails_construction() {
    let config = SecretStoreConfig::new("test-store", "localfiles");
    let err = LocalFilesProvider::new(config).await.unwrap_err();
    assert!(matches!(
        err,
        SecretError::MissingConfiguration { field } if field == "uri"
    ));
}

#[tokio::test]
async fn test_construction_creates_base_directory() {
    let directory = tempdir().unwrap();
    let base = directory.path().join("store");

    new_provider(&base).await;
    assert!(base.is_dir());
}

#[tokio::test]
async fn test_secret_lifecycle() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;
    let data = sample_data();

    provider.upsert_secret("a/b", &data).await.unwrap();
    assert!(directory.path().join("a").join("b.secret").is_file());

    let paths: Vec<String> = provider
        .list_secrets()
        .collect::<Result<Vec<_>, _>>()
        .await
        .unwrap();
    assert_eq!(paths, vec!["a/b"]);

    let records: Vec<SecretRecord> = provider
        .read_all_secrets()
        .collect::<Result<Vec<_>, _>>()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "a/b");
    assert_eq!(records[0].data, data);

    let record = provider.read_secret("a/b").await.unwrap();
    assert_eq!(record.path, "a/b");
    assert_eq!(record.data, data);

    provider.delete_secret("a/b").await.unwrap();
    let err = provider.read_secret("a/b").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_upsert_overwrites_existing_secret() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    provider.upsert_secret("app/db", &sample_data()).await.unwrap();

    let mut updated = SecretData::new();
    updated.insert("password".to_string(), json!("rotated"));
    provider.upsert_secret("app/db", &updated).await.unwrap();

    let record = provider.read_secret("app/db").await.unwrap();
    assert_eq!(record.data, updated);
}

#[tokio::test]
async fn test_empty_data_round_trips() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    provider
        .upsert_secret("empty", &SecretData::new())
        .await
        .unwrap();

    let record = provider.read_secret("empty").await.unwrap();
    assert!(record.data.is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    provider.delete_secret("never/existed").await.unwrap();
}

#[tokio::test]
async fn test_traversal_rejected_without_side_effects() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    let err = provider
        .upsert_secret("../escape", &sample_data())
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::InvalidPath { .. }));

    let err = provider.read_secret("a/../b").await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidPath { .. }));

    let err = provider.delete_secret("..").await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidPath { .. }));

    // Nothing may be written anywhere for a rejected path.
    let mut entries = fs::read_dir(directory.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_path_rejected() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    let err = provider.read_secret("").await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_unparseable_payload_reports_decode_error() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    fs::write(directory.path().join("broken.secret"), b"not json")
        .await
        .unwrap();

    let err = provider.read_secret("broken").await.unwrap_err();
    assert!(matches!(err, SecretError::Decode { .. }));
}

#[tokio::test]
async fn test_read_all_aborts_on_decode_failure() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    provider.upsert_secret("good", &sample_data()).await.unwrap();
    fs::write(directory.path().join("bad.secret"), b"not json")
        .await
        .unwrap();

    let results: Vec<Result<SecretRecord, SecretError>> =
        provider.read_all_secrets().collect().await;

    // The failure terminates the stream; nothing follows it.
    assert!(matches!(
        results.last(),
        Some(Err(SecretError::Decode { .. }))
    ));
    assert_eq!(
        results.iter().filter(|result| result.is_err()).count(),
        1
    );
}

#[tokio::test]
async fn test_listing_walks_nested_directories() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    provider.upsert_secret("top", &sample_data()).await.unwrap();
    provider
        .upsert_secret("deep/nested/entry", &sample_data())
        .await
        .unwrap();

    let mut paths: Vec<String> = provider
        .list_secrets()
        .collect::<Result<Vec<_>, _>>()
        .await
        .unwrap();
    paths.sort();
    assert_eq!(paths, vec!["deep/nested/entry", "top"]);
}

#[tokio::test]
async fn test_listing_empty_store_yields_nothing() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    let paths: Vec<String> = provider
        .list_secrets()
        .collect::<Result<Vec<_>, _>>()
        .await
        .unwrap();
    assert!(paths.is_empty());
}

#[tokio::test]
async fn test_create_token_is_not_implemented() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    let err = provider
        .create_token("id", "name", 1, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::NotImplemented { .. }));
}

#[tokio::test]
async fn test_provider_metadata() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;

    assert_eq!(provider.provider_type(), ProviderType::LocalFiles);
    assert_eq!(provider.store_id(), "test-store");
}

#[tokio::test]
async fn test_certificate_cache_lifecycle() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;
    let cache = provider.certificate_cache();

    let err = cache.get("example.com").await.unwrap_err();
    assert!(err.is_miss());

    cache.put("example.com", b"certificate bytes").await.unwrap();
    assert!(directory
        .path()
        .join(AUTOCERT_DIR)
        .join("example.com")
        .is_file());

    let cached = cache.get("example.com").await.unwrap();
    assert_eq!(cached, b"certificate bytes");

    cache.put("example.com", b"renewed").await.unwrap();
    assert_eq!(cache.get("example.com").await.unwrap(), b"renewed");

    cache.delete("example.com").await.unwrap();
    assert!(cache.get("example.com").await.unwrap_err().is_miss());

    // Absent entries delete cleanly.
    cache.delete("example.com").await.unwrap();
}

#[tokio::test]
async fn test_certificate_cache_rejects_separators() {
    let directory = tempdir().unwrap();
    let provider = new_provider(directory.path()).await;
    let cache = provider.certificate_cache();

    let err = cache.put("a/b", b"data").await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidName { .. }));

    let err = cache.get("..\\escape").await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidName { .. }));
}
