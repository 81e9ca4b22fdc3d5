//! Tests for secret records and path helpers.

use super::*;
use serde_json::json;

fn sample_data() -> SecretData {
    let mut data = SecretData::new();
    data.insert("username".to_string(), json!("admin"));
    data.insert("password".to_string(), json!("hunter2"));
    data
}

#[test]
fn test_record_serialization_shape() {
    let record = SecretRecord::new("app/db", sample_data());
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["path"], json!("app/db"));
    assert_eq!(value["data"]["username"], json!("admin"));
}

#[test]
fn test_record_deserialization_defaults_data() {
    let record: SecretRecord = serde_json::from_str(r#"{"path":"app/db"}"#).unwrap();
    assert_eq!(record.path, "app/db");
    assert!(record.data.is_empty());
}

#[test]
fn test_validate_path_accepts_nested_paths() {
    assert!(validate_path("app/db").is_ok());
    assert!(validate_path("a").is_ok());
    assert!(validate_path("deep/nested/path/entry").is_ok());
}

#[test]
fn test_validate_path_rejects_empty() {
    let err = validate_path("").unwrap_err();
    assert!(matches!(err, SecretError::InvalidArgument { .. }));
}

#[test]
fn test_validate_path_rejects_traversal() {
    for path in ["../up", "a/../b", "a/..", ".."] {
        let err = validate_path(path).unwrap_err();
        assert!(matches!(err, SecretError::InvalidPath { .. }), "{path}");
    }
}

#[test]
fn test_validate_cache_name() {
    assert!(validate_cache_name("example.com").is_ok());

    let err = validate_cache_name("").unwrap_err();
    assert!(matches!(err, CacheError::InvalidName { .. }));

    let err = validate_cache_name("a/b").unwrap_err();
    assert!(matches!(err, CacheError::InvalidName { .. }));

    let err = validate_cache_name("a\\b").unwrap_err();
    assert!(matches!(err, CacheError::InvalidName { .. }));
}

#[test]
fn test_secret_file_name_appends_extension_once() {
    assert_eq!(secret_file_name("app/db"), "app/db.secret");
    assert_eq!(secret_file_name("app/db.secret"), "app/db.secret");
}

#[test]
fn test_strip_secret_extension() {
    assert_eq!(strip_secret_extension("app/db.secret"), "app/db");
    assert_eq!(strip_secret_extension("app/db"), "app/db");
}
