//! Error types for secret store operations.

use thiserror::Error;

/// Comprehensive error type for all secret store operations
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    #[error("Unknown secret provider type: {store_type}")]
    UnknownProviderType { store_type: String },

    #[error("Vault is sealed")]
    Sealed,

    #[error("Secret not found: {path}")]
    NotFound { path: String },

    #[error("Failed to decode secret at '{path}': {message}")]
    Decode { path: String, message: String },

    #[error("Operation '{operation}' is not implemented by the {provider} provider")]
    NotImplemented { operation: String, provider: String },

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecretError {
    /// Check if error is the normalized absent-resource signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error was raised before any backend call was attempted
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::InvalidPath { .. }
                | Self::MissingConfiguration { .. }
                | Self::UnknownProviderType { .. }
        )
    }
}

/// Errors raised by the certificate cache contract
///
/// Cache misses are a dedicated variant rather than a generic not-found:
/// the certificate-issuance logic treats a miss as "must (re)issue", which
/// is a different control path than a storage failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("certificate cache miss")]
    Miss,

    #[error("Invalid cache name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Failed to decode cached certificate: {message}")]
    Decode { message: String },

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Check if error is the normalized cache-miss signal
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
