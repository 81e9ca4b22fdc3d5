//! # Secret Runtime
//!
//! Multi-provider secret runtime with support for AWS Secrets Manager,
//! HashiCorp Vault, and local filesystem backing stores.
//!
//! This library provides:
//! - Provider-agnostic secret reads, writes, and deletes
//! - Streaming enumeration of stored secrets
//! - Certificate caching alongside each backing store
//! - Environment-based configuration resolution
//! - Token issuance where the backend supports it
//!
//! ## Module Organization
//!
//! - [error] - Error types for all secret operations
//! - [record] - Secret records and path validation
//! - [provider] - Provider types and configuration
//! - [client] - Client traits and the provider factory
//! - [providers] - Concrete backend implementations

// Module declarations
pub mod client;
pub mod error;
pub mod provider;
pub mod providers;
pub mod record;

// Re-export commonly used types at crate root for convenience
pub use client::{
    CertificateCache, PathStream, RecordStream, SecretProvider, SecretProviderFactory,
};
pub use error::{CacheError, SecretError};
pub use provider::{ProviderType, SecretStoreConfig};
pub use providers::{
    AwsCertificateCache, AwsSecretsManagerProvider, LocalFilesCertificateCache, LocalFilesProvider,
    VaultCertificateCache, VaultProvider,
};
pub use record::{SecretData, SecretRecord};
