//! Common secret provider contract and the provider factory.

use crate::error::{CacheError, SecretError};
use crate::provider::{ProviderType, SecretStoreConfig};
use crate::providers::{AwsSecretsManagerProvider, LocalFilesProvider, VaultProvider};
use crate::record::{SecretData, SecretRecord};
use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Buffer size for enumeration streams
pub(crate) const STREAM_BUFFER: usize = 16;

/// Lazy, non-restartable sequence of secret paths
///
/// Finite and single-pass; a terminal `Err` ends the sequence. Dropping
/// the stream stops the producer.
pub type PathStream = ReceiverStream<Result<String, SecretError>>;

/// Lazy, non-restartable sequence of secret records
pub type RecordStream = ReceiverStream<Result<SecretRecord, SecretError>>;

/// Uniform interface for secret operations across all providers
#[async_trait]
pub trait SecretProvider: Send + Sync + std::fmt::Debug {
    /// Write data at a path, creating the secret if absent
    ///
    /// Attempts a write first and falls back to a create call when the
    /// backend reports the resource missing, hiding backends that
    /// distinguish the two operations.
    async fn upsert_secret(&self, path: &str, data: &SecretData) -> Result<(), SecretError>;

    /// Fetch and deserialize the record at a path
    ///
    /// Absence is normalized to [`SecretError::NotFound`]; an unparseable
    /// payload is [`SecretError::Decode`].
    async fn read_secret(&self, path: &str) -> Result<SecretRecord, SecretError>;

    /// Delete the secret at a path
    ///
    /// The filesystem provider treats an absent entry as success; the
    /// other providers surface their backend's deletion error unmodified.
    async fn delete_secret(&self, path: &str) -> Result<(), SecretError>;

    /// Enumerate secret paths as a stream
    fn list_secrets(&self) -> PathStream;

    /// Enumerate full secret records as a stream
    fn read_all_secrets(&self) -> RecordStream;

    /// Issue a scoped, limited-use access token
    ///
    /// Only the Vault provider implements this; the others return
    /// [`SecretError::NotImplemented`].
    async fn create_token(
        &self,
        id: &str,
        display_name: &str,
        num_uses: u32,
        policies: &[String],
    ) -> Result<String, SecretError>;

    /// Derive the TLS certificate cache view over this store
    ///
    /// Pure and side-effect free; the cache shares the provider's
    /// connection and holds no independent state.
    fn certificate_cache(&self) -> Box<dyn CertificateCache>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get the opaque store ID this provider was configured with
    fn store_id(&self) -> &str;
}

/// Byte-blob cache contract consumed by TLS certificate issuance
///
/// Keys are opaque names without path separators; every provider confines
/// them to a fixed autocert sub-namespace.
#[async_trait]
pub trait CertificateCache: Send + Sync {
    /// Read cached certificate data for a name
    ///
    /// Returns [`CacheError::Miss`] when no entry exists.
    async fn get(&self, name: &str) -> Result<Vec<u8>, CacheError>;

    /// Store certificate data under a name
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), CacheError>;

    /// Remove the entry for a name; an absent entry is success
    async fn delete(&self, name: &str) -> Result<(), CacheError>;
}

/// Factory for constructing secret providers from configuration records
pub struct SecretProviderFactory;

impl SecretProviderFactory {
    /// Create the provider matching a secret store definition
    ///
    /// Resolves blank configuration fields from the environment once, then
    /// dispatches on the declared type (case-insensitive). Construction may
    /// perform network calls; any construction error is propagated.
    ///
    /// # Examples
    ///
    /// ```
    /// use secret_runtime::{SecretProviderFactory, SecretStoreConfig};
    ///
    /// # tokio_test::block_on(async {
    /// let directory = tempfile::tempdir().unwrap();
    /// let mut config = SecretStoreConfig::new("primary", "localfiles");
    /// config.uri = directory.path().display().to_string();
    ///
    /// let provider = SecretProviderFactory::create(config).await.unwrap();
    /// assert_eq!(provider.store_id(), "primary");
    /// # });
    /// ```
    pub async fn create(
        mut config: SecretStoreConfig,
    ) -> Result<Box<dyn SecretProvider>, SecretError> {
        config.resolve_from_env();

        let provider_type = ProviderType::parse(&config.store_type).ok_or_else(|| {
            SecretError::UnknownProviderType {
                store_type: config.store_type.clone(),
            }
        })?;

        match provider_type {
            ProviderType::AwsSecretsManager => {
                Ok(Box::new(AwsSecretsManagerProvider::new(config).await?))
            }
            ProviderType::LocalFiles => Ok(Box::new(LocalFilesProvider::new(config).await?)),
            ProviderType::Vault => Ok(Box::new(VaultProvider::new(config).await?)),
        }
    }
}
