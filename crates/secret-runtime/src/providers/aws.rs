//! AWS Secrets Manager secret provider.
//!
//! Secrets are stored as binary JSON payloads under their path name. The
//! service's write call only updates existing secrets, so upserts fall
//! back to an explicit create when the resource is missing.

use crate::client::{CertificateCache, PathStream, RecordStream, SecretProvider, STREAM_BUFFER};
use crate::error::{CacheError, SecretError};
use crate::provider::{ProviderType, SecretStoreConfig};
use crate::record::{self, SecretData, SecretRecord};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::config::Credentials;
use aws_sdk_secretsmanager::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueOutput;
use aws_sdk_secretsmanager::primitives::Blob;
use aws_sdk_secretsmanager::Client;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

/// Prefix confining certificate cache entries
const AUTOCERT_PREFIX: &str = "autocert/";

/// Secret provider backed by AWS Secrets Manager
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerProvider {
    id: String,
    client: Client,
}

impl AwsSecretsManagerProvider {
    /// Create an AWS Secrets Manager provider
    ///
    /// Uses the configured credential pair when one is supplied and the
    /// ambient AWS credential chain otherwise. A non-empty URI overrides
    /// the service endpoint, which lets tests target a local emulator.
    #[instrument(skip(config), fields(store_id = %config.id))]
    pub async fn new(config: SecretStoreConfig) -> Result<Self, SecretError> {
        if config.region.is_empty() {
            return Err(SecretError::MissingConfiguration {
                field: "region".to_string(),
            });
        }

        debug!("Creating AWS Secrets Manager client.");

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.client_id.is_empty() && !config.client_secret.is_empty() {
            let session_token =
                (!config.client_token.is_empty()).then(|| config.client_token.clone());
            loader = loader.credentials_provider(Credentials::new(
                config.client_id.clone(),
                config.client_secret.clone(),
                session_token,
                None,
                "secret-store-config",
            ));
        }
        let shared_config = loader.load().await;

        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&shared_config);
        if !config.uri.is_empty() {
            builder = builder.endpoint_url(&config.uri);
        }
        let client = Client::from_conf(builder.build());

        debug!("Created AWS Secrets Manager client.");

        Ok(Self {
            id: config.id,
            client,
        })
    }

    /// Fetch and decode one secret by name
    async fn fetch_secret(&self, path: &str) -> Result<SecretRecord, SecretError> {
        let output = match self
            .client
            .get_secret_value()
            .secret_id(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => {
                debug!(store_id = %self.id, path = %path, "Secret does not exist.");
                return Err(SecretError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(provider_error("get_secret_value", err)),
        };

        let data = decode_payload(path, &output)?;
        Ok(SecretRecord::new(path, data))
    }
}

/// Decode a fetched payload into secret data
///
/// The payload may live in either the string or the binary field; a
/// response carrying neither counts as not found.
fn decode_payload(
    path: &str,
    output: &GetSecretValueOutput,
) -> Result<SecretData, SecretError> {
    if let Some(value) = output.secret_string().filter(|value| !value.is_empty()) {
        serde_json::from_str(value).map_err(|err| SecretError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        })
    } else if let Some(blob) = output.secret_binary() {
        serde_json::from_slice(blob.as_ref()).map_err(|err| SecretError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        })
    } else {
        Err(SecretError::NotFound {
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl SecretProvider for AwsSecretsManagerProvider {
    async fn upsert_secret(&self, path: &str, data: &SecretData) -> Result<(), SecretError> {
        record::validate_path(path)?;

        let bytes = serde_json::to_vec(data)?;
        let result = self
            .client
            .put_secret_value()
            .secret_id(path)
            .secret_binary(Blob::new(bytes.clone()))
            .send()
            .await;

        match result {
            Ok(_) => {}
            // The secret does not exist yet; create it with the same payload.
            Err(err) if is_not_found(&err) => {
                self.client
                    .create_secret()
                    .name(path)
                    .secret_binary(Blob::new(bytes))
                    .send()
                    .await
                    .map_err(|err| provider_error("create_secret", err))?;
            }
            Err(err) => return Err(provider_error("put_secret_value", err)),
        }

        info!(store_id = %self.id, path = %path, "Upserted secret.");
        Ok(())
    }

    async fn read_secret(&self, path: &str) -> Result<SecretRecord, SecretError> {
        record::validate_path(path)?;

        let record = self.fetch_secret(path).await?;
        debug!(store_id = %self.id, path = %path, "Read secret.");
        Ok(record)
    }

    async fn delete_secret(&self, path: &str) -> Result<(), SecretError> {
        record::validate_path(path)?;

        // Deletion errors, including not-found, pass through unmodified.
        self.client
            .delete_secret()
            .secret_id(path)
            .send()
            .await
            .map_err(|err| provider_error("delete_secret", err))?;

        info!(store_id = %self.id, path = %path, "Deleted secret.");
        Ok(())
    }

    fn list_secrets(&self) -> PathStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let client = self.client.clone();
        let store_id = self.id.clone();

        tokio::spawn(async move {
            let mut token: Option<String> = None;

            loop {
                let mut request = client.list_secrets();
                if let Some(ref next) = token {
                    request = request.next_token(next);
                }

                let response = match request.send().await {
                    Ok(response) => response,
                    Err(err) => {
                        let _ = tx.send(Err(provider_error("list_secrets", err))).await;
                        return;
                    }
                };

                for entry in response.secret_list() {
                    if let Some(name) = entry.name() {
                        if tx.send(Ok(name.to_string())).await.is_err() {
                            return;
                        }
                    }
                }

                match response.next_token() {
                    Some(next) => token = Some(next.to_string()),
                    None => break,
                }
            }

            debug!(store_id = %store_id, "Listed secrets.");
        });

        ReceiverStream::new(rx)
    }

    fn read_all_secrets(&self) -> RecordStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let provider = self.clone();

        tokio::spawn(async move {
            let mut token: Option<String> = None;

            loop {
                let mut request = provider.client.list_secrets();
                if let Some(ref next) = token {
                    request = request.next_token(next);
                }

                let response = match request.send().await {
                    Ok(response) => response,
                    Err(err) => {
                        let _ = tx.send(Err(provider_error("list_secrets", err))).await;
                        return;
                    }
                };

                for entry in response.secret_list() {
                    let Some(name) = entry.name() else {
                        continue;
                    };

                    let record = match provider.fetch_secret(name).await {
                        Ok(record) => record,
                        Err(error) => {
                            let _ = tx.send(Err(error)).await;
                            return;
                        }
                    };

                    if tx.send(Ok(record)).await.is_err() {
                        return;
                    }
                }

                match response.next_token() {
                    Some(next) => token = Some(next.to_string()),
                    None => break,
                }
            }

            debug!(store_id = %provider.id, "Read all secrets.");
        });

        ReceiverStream::new(rx)
    }

    async fn create_token(
        &self,
        _id: &str,
        _display_name: &str,
        _num_uses: u32,
        _policies: &[String],
    ) -> Result<String, SecretError> {
        Err(SecretError::NotImplemented {
            operation: "create_token".to_string(),
            provider: ProviderType::AwsSecretsManager.to_string(),
        })
    }

    fn certificate_cache(&self) -> Box<dyn CertificateCache> {
        Box::new(AwsCertificateCache {
            id: self.id.clone(),
            client: self.client.clone(),
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSecretsManager
    }

    fn store_id(&self) -> &str {
        &self.id
    }
}

/// Certificate cache stored as binary secrets under `autocert/`
#[derive(Debug, Clone)]
pub struct AwsCertificateCache {
    id: String,
    client: Client,
}

#[async_trait]
impl CertificateCache for AwsCertificateCache {
    async fn get(&self, name: &str) -> Result<Vec<u8>, CacheError> {
        record::validate_cache_name(name)?;

        let path = format!("{AUTOCERT_PREFIX}{name}");
        let output = match self
            .client
            .get_secret_value()
            .secret_id(&path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => {
                debug!(store_id = %self.id, path = %path, "Certificate is not cached.");
                return Err(CacheError::Miss);
            }
            Err(err) => return Err(cache_provider_error("get_secret_value", err)),
        };

        match output.secret_binary() {
            Some(blob) => Ok(blob.as_ref().to_vec()),
            None => Err(CacheError::Miss),
        }
    }

    async fn put(&self, name: &str, data: &[u8]) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        let path = format!("{AUTOCERT_PREFIX}{name}");
        let result = self
            .client
            .put_secret_value()
            .secret_id(&path)
            .secret_binary(Blob::new(data))
            .send()
            .await;

        match result {
            Ok(_) => {}
            Err(err) if is_not_found(&err) => {
                self.client
                    .create_secret()
                    .name(&path)
                    .secret_binary(Blob::new(data))
                    .send()
                    .await
                    .map_err(|err| cache_provider_error("create_secret", err))?;
            }
            Err(err) => return Err(cache_provider_error("put_secret_value", err)),
        }

        info!(store_id = %self.id, path = %path, "Cached certificate.");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        let path = format!("{AUTOCERT_PREFIX}{name}");
        match self.client.delete_secret().secret_id(&path).send().await {
            Ok(_) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(cache_provider_error("delete_secret", err)),
        }

        info!(store_id = %self.id, path = %path, "Deleted cached certificate.");
        Ok(())
    }
}

/// Check a service error for the not-found condition
fn is_not_found<E>(err: &SdkError<E>) -> bool
where
    E: ProvideErrorMetadata,
{
    if let SdkError::ServiceError(context) = err {
        return context.err().code() == Some("ResourceNotFoundException");
    }
    false
}

fn provider_error<E>(operation: &str, err: SdkError<E>) -> SecretError
where
    E: std::fmt::Display,
{
    SecretError::Provider {
        provider: ProviderType::AwsSecretsManager.to_string(),
        message: format!("{operation} failed: {err}"),
    }
}

fn cache_provider_error<E>(operation: &str, err: SdkError<E>) -> CacheError
where
    E: std::fmt::Display,
{
    CacheError::Provider {
        provider: ProviderType::AwsSecretsManager.to_string(),
        message: format!("{operation} failed: {err}"),
    }
}
