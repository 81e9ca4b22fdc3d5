//! Secret record type and the shared path-safety helpers.
//!
//! Every backend validates caller-supplied paths and cache names through
//! the helpers in this module before issuing any backend call.

use crate::error::{CacheError, SecretError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured payload of a secret: arbitrary string-keyed JSON values.
pub type SecretData = serde_json::Map<String, Value>;

/// File extension used by the filesystem backend
pub const SECRET_FILE_EXTENSION: &str = ".secret";

/// Canonical in-memory shape of a secret
///
/// Wire shape is `{ "data": <mapping>, "path": <string> }`. The path is
/// always non-empty and normalized when an operation succeeds; the data
/// mapping may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Secret data.
    #[serde(default)]
    pub data: SecretData,

    /// Storage path.
    pub path: String,
}

impl SecretRecord {
    /// Create a record for data stored at a path
    pub fn new(path: impl Into<String>, data: SecretData) -> Self {
        Self {
            data,
            path: path.into(),
        }
    }
}

/// Validate a secret path before any backend call
///
/// Rejects empty paths and parent-directory traversal sequences. Backends
/// apply their own prefixing rules after this check passes.
pub fn validate_path(path: &str) -> Result<(), SecretError> {
    if path.is_empty() {
        return Err(SecretError::InvalidArgument {
            message: "path is required".to_string(),
        });
    }

    if path.contains("..") {
        return Err(SecretError::InvalidPath {
            path: path.to_string(),
            reason: "parent-directory traversal is not allowed".to_string(),
        });
    }

    Ok(())
}

/// Validate a certificate cache name before any backend call
///
/// Cache names are opaque and must not contain path separators; allowing
/// one would let a key escape the fixed autocert sub-namespace.
pub fn validate_cache_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty() {
        return Err(CacheError::InvalidName {
            name: name.to_string(),
            reason: "name is required".to_string(),
        });
    }

    if name.contains('/') || name.contains('\\') {
        return Err(CacheError::InvalidName {
            name: name.to_string(),
            reason: "name cannot contain path separators".to_string(),
        });
    }

    Ok(())
}

/// Map a secret path to its on-disk file name
///
/// Appends the `.secret` extension exactly once.
pub fn secret_file_name(path: &str) -> String {
    if path.ends_with(SECRET_FILE_EXTENSION) {
        path.to_string()
    } else {
        format!("{path}{SECRET_FILE_EXTENSION}")
    }
}

/// Strip the `.secret` extension from a file name, if present
pub fn strip_secret_extension(name: &str) -> &str {
    name.strip_suffix(SECRET_FILE_EXTENSION).unwrap_or(name)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
