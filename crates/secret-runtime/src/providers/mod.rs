//! Secret provider implementations.
//!
//! This module contains concrete implementations of the `SecretProvider` and
//! `CertificateCache` traits for different secret backends.

pub mod aws;
pub mod localfiles;
pub mod vault;

pub use aws::{AwsCertificateCache, AwsSecretsManagerProvider};
pub use localfiles::{LocalFilesCertificateCache, LocalFilesProvider};
pub use vault::{VaultCertificateCache, VaultProvider};
