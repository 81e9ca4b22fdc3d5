//! Tests for the provider factory and client traits.

use super::*;
use crate::provider::{ENV_STORE_TYPE, ENV_STORE_URI};
use serial_test::serial;
use std::env;
use tempfile::tempdir;

fn files_config(directory: &std::path::Path) -> SecretStoreConfig {
    let mut config = SecretStoreConfig::new("test-store", "localfiles");
    config.uri = directory.to_string_lossy().into_owned();
    config
}

#[tokio::test]
#[serial]
async fn test_factory_rejects_unknown_type() {
    let config = SecretStoreConfig::new("test-store", "etcd");
    let err = SecretProviderFactory::create(config).await.unwrap_err();
    assert!(matches!(
        err,
        SecretError::UnknownProviderType { store_type } if store_type == "etcd"
    ));
}

#[tokio::test]
#[serial]
async fn test_factory_rejects_missing_type() {
    env::remove_var(ENV_STORE_TYPE);

    let config = SecretStoreConfig::new("test-store", "");
    let err = SecretProviderFactory::create(config).await.unwrap_err();
    assert!(matches!(err, SecretError::UnknownProviderType { .. }));
}

#[tokio::test]
#[serial]
async fn test_factory_dispatch_is_case_insensitive() {
    let directory = tempdir().unwrap();
    let mut config = files_config(directory.path());
    config.store_type = "LocalFiles".to_string();

    let provider = SecretProviderFactory::create(config).await.unwrap();
    assert_eq!(provider.provider_type(), ProviderType::LocalFiles);
    assert_eq!(provider.store_id(), "test-store");
}

#[tokio::test]
#[serial]
async fn test_factory_resolves_type_from_env() {
    let directory = tempdir().unwrap();
    env::set_var(ENV_STORE_TYPE, "localfiles");
    env::set_var(ENV_STORE_URI, directory.path().to_string_lossy().as_ref());

    let config = SecretStoreConfig::new("env-store", "");
    let provider = SecretProviderFactory::create(config).await.unwrap();
    assert_eq!(provider.provider_type(), ProviderType::LocalFiles);

    env::remove_var(ENV_STORE_TYPE);
    env::remove_var(ENV_STORE_URI);
}

#[tokio::test]
#[serial]
async fn test_factory_propagates_construction_errors() {
    env::remove_var(ENV_STORE_URI);

    let config = SecretStoreConfig::new("test-store", "localfiles");
    let err = SecretProviderFactory::create(config).await.unwrap_err();
    assert!(matches!(
        err,
        SecretError::MissingConfiguration { field } if field == "uri"
    ));
}

#[tokio::test]
#[serial]
async fn test_provider_usable_as_trait_object() {
    let directory = tempdir().unwrap();
    let provider = SecretProviderFactory::create(files_config(directory.path()))
        .await
        .unwrap();

    let mut data = SecretData::new();
    data.insert("key".to_string(), serde_json::json!("value"));
    provider.upsert_secret("app/db", &data).await.unwrap();

    let record = provider.read_secret("app/db").await.unwrap();
    assert_eq!(record.data, data);

    let cache = provider.certificate_cache();
    assert!(cache.get("example.com").await.unwrap_err().is_miss());
}
