//! HashiCorp Vault secret provider.
//!
//! Targets the KV v2 engine on the conventional `secret` mount.
//! Construction applies any configured unseal shards before the client is
//! handed out, and token issuance maps onto Vault's token auth backend.

use crate::client::{CertificateCache, PathStream, RecordStream, SecretProvider, STREAM_BUFFER};
use crate::error::{CacheError, SecretError};
use crate::provider::{ProviderType, SecretStoreConfig};
use crate::record::{self, SecretData, SecretRecord};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};
use vaultrs::api::token::requests::CreateTokenRequest;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;
use vaultrs::sys::ServerStatus;

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;

/// KV mount every secret lives under
const DEFAULT_MOUNT: &str = "secret";

/// Key prefix confining certificate cache entries
const AUTOCERT_PREFIX: &str = "autocert/";

/// Field holding base64-encoded certificate bytes in cache entries
const CERT_FIELD: &str = "cert";

/// Secret provider backed by HashiCorp Vault
#[derive(Clone)]
pub struct VaultProvider {
    id: String,
    client: Arc<VaultClient>,
    mount: String,
}

impl std::fmt::Debug for VaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultProvider")
            .field("id", &self.id)
            .field("mount", &self.mount)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultProvider {
    /// Create a Vault provider, unsealing the server if shards are supplied
    ///
    /// Each unseal shard is applied in order. When no shards are supplied a
    /// bare seal-status check decides whether the server is usable; a
    /// still-sealed server fails construction with [`SecretError::Sealed`].
    #[instrument(skip(config), fields(store_id = %config.id))]
    pub async fn new(config: SecretStoreConfig) -> Result<Self, SecretError> {
        if config.uri.is_empty() {
            return Err(SecretError::MissingConfiguration {
                field: "uri".to_string(),
            });
        }
        if config.client_secret.is_empty() {
            return Err(SecretError::MissingConfiguration {
                field: "clientSecret".to_string(),
            });
        }

        debug!("Creating Vault client.");

        let settings = VaultClientSettingsBuilder::default()
            .address(&config.uri)
            .token(&config.client_secret)
            .build()
            .map_err(|err| SecretError::Provider {
                provider: ProviderType::Vault.to_string(),
                message: format!("invalid client settings: {err}"),
            })?;
        let client = VaultClient::new(settings).map_err(vault_error)?;

        info!("Unsealing Vault.");
        let mut sealed_after_unseal: Option<bool> = None;
        for shard in &config.unseal_shards {
            let response = vaultrs::sys::unseal(&client, Some(shard.clone()), None, None)
                .await
                .map_err(vault_error)?;
            sealed_after_unseal = Some(response.sealed);
        }

        let sealed = match sealed_after_unseal {
            Some(sealed) => sealed,
            // No shards were supplied; the server may already be unsealed
            // elsewhere, so fall through to a bare seal-status check.
            None => matches!(
                vaultrs::sys::status(&client).await.map_err(vault_error)?,
                ServerStatus::SEALED
            ),
        };
        if sealed {
            return Err(SecretError::Sealed);
        }
        info!("Unsealed Vault.");

        Ok(Self {
            id: config.id,
            client: Arc::new(client),
            mount: DEFAULT_MOUNT.to_string(),
        })
    }
}

/// Map a caller path to its mount-relative key
///
/// A path carrying the `secret/` prefix is accepted and silently stripped;
/// one lacking it is used as-is.
fn mount_key(path: &str) -> &str {
    path.strip_prefix("secret/").unwrap_or(path)
}

/// Report a mount-relative key as a full record path
fn record_path(key: &str) -> String {
    format!("{DEFAULT_MOUNT}/{key}")
}

fn is_not_found(err: &ClientError) -> bool {
    matches!(err, ClientError::APIError { code: 404, .. })
}

fn vault_error(err: ClientError) -> SecretError {
    SecretError::Provider {
        provider: ProviderType::Vault.to_string(),
        message: err.to_string(),
    }
}

fn cache_vault_error(err: ClientError) -> CacheError {
    CacheError::Provider {
        provider: ProviderType::Vault.to_string(),
        message: err.to_string(),
    }
}

/// Walk the KV tree under a mount, collecting leaf keys
///
/// Directory entries in a KV listing end with `/`. An empty mount lists as
/// a 404, which counts as an empty result rather than an error.
async fn collect_keys(client: &VaultClient, mount: &str) -> Result<Vec<String>, SecretError> {
    let mut keys = Vec::new();
    let mut pending = vec![String::new()];

    while let Some(prefix) = pending.pop() {
        let entries = match kv2::list(client, mount, &prefix).await {
            Ok(entries) => entries,
            Err(err) if is_not_found(&err) => continue,
            Err(err) => return Err(vault_error(err)),
        };

        for entry in entries {
            if entry.ends_with('/') {
                pending.push(format!("{prefix}{entry}"));
            } else {
                keys.push(format!("{prefix}{entry}"));
            }
        }
    }

    Ok(keys)
}

#[async_trait]
impl SecretProvider for VaultProvider {
    async fn upsert_secret(&self, path: &str, data: &SecretData) -> Result<(), SecretError> {
        record::validate_path(path)?;

        // KV v2 writes are upsert-capable; no create fallback is needed.
        let key = mount_key(path);
        kv2::set(self.client.as_ref(), &self.mount, key, data)
            .await
            .map_err(vault_error)?;

        info!(store_id = %self.id, path = %record_path(key), "Upserted secret.");
        Ok(())
    }

    async fn read_secret(&self, path: &str) -> Result<SecretRecord, SecretError> {
        record::validate_path(path)?;

        let key = mount_key(path);
        let data: SecretData = match kv2::read(self.client.as_ref(), &self.mount, key).await {
            Ok(data) => data,
            Err(err) if is_not_found(&err) => {
                debug!(store_id = %self.id, path = %record_path(key), "Secret does not exist.");
                return Err(SecretError::NotFound {
                    path: record_path(key),
                });
            }
            Err(err) => return Err(vault_error(err)),
        };

        debug!(store_id = %self.id, path = %record_path(key), "Read secret.");
        Ok(SecretRecord::new(record_path(key), data))
    }

    async fn delete_secret(&self, path: &str) -> Result<(), SecretError> {
        record::validate_path(path)?;

        // Deletion errors, including not-found, pass through unmodified.
        let key = mount_key(path);
        kv2::delete_latest(self.client.as_ref(), &self.mount, key)
            .await
            .map_err(vault_error)?;

        info!(store_id = %self.id, path = %record_path(key), "Deleted secret.");
        Ok(())
    }

    fn list_secrets(&self) -> PathStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let client = Arc::clone(&self.client);
        let mount = self.mount.clone();
        let store_id = self.id.clone();

        tokio::spawn(async move {
            let keys = match collect_keys(client.as_ref(), &mount).await {
                Ok(keys) => keys,
                Err(error) => {
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            };

            for key in keys {
                if tx.send(Ok(record_path(&key))).await.is_err() {
                    return;
                }
            }

            debug!(store_id = %store_id, "Listed secrets.");
        });

        ReceiverStream::new(rx)
    }

    fn read_all_secrets(&self) -> RecordStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let client = Arc::clone(&self.client);
        let mount = self.mount.clone();
        let store_id = self.id.clone();

        tokio::spawn(async move {
            let keys = match collect_keys(client.as_ref(), &mount).await {
                Ok(keys) => keys,
                Err(error) => {
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            };

            for key in keys {
                let data: SecretData = match kv2::read(client.as_ref(), &mount, &key).await {
                    Ok(data) => data,
                    Err(err) => {
                        let _ = tx.send(Err(vault_error(err))).await;
                        return;
                    }
                };

                let secret = SecretRecord::new(record_path(&key), data);
                if tx.send(Ok(secret)).await.is_err() {
                    return;
                }
            }

            debug!(store_id = %store_id, "Read all secrets.");
        });

        ReceiverStream::new(rx)
    }

    async fn create_token(
        &self,
        id: &str,
        display_name: &str,
        num_uses: u32,
        policies: &[String],
    ) -> Result<String, SecretError> {
        if id.is_empty() {
            return Err(SecretError::InvalidArgument {
                message: "token ID is required".to_string(),
            });
        }
        if display_name.is_empty() {
            return Err(SecretError::InvalidArgument {
                message: "display name is required".to_string(),
            });
        }

        let mut request = CreateTokenRequest::builder();
        request
            .id(id)
            .display_name(display_name)
            .num_uses(u64::from(num_uses))
            .policies(policies.to_vec());

        let auth = vaultrs::token::new(self.client.as_ref(), Some(&mut request))
            .await
            .map_err(vault_error)?;

        info!(store_id = %self.id, "Created token.");
        Ok(auth.client_token)
    }

    fn certificate_cache(&self) -> Box<dyn CertificateCache> {
        Box::new(VaultCertificateCache {
            id: self.id.clone(),
            client: Arc::clone(&self.client),
            mount: self.mount.clone(),
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Vault
    }

    fn store_id(&self) -> &str {
        &self.id
    }
}

/// Certificate cache stored under `secret/autocert/` with base64 payloads
#[derive(Clone)]
pub struct VaultCertificateCache {
    id: String,
    client: Arc<VaultClient>,
    mount: String,
}

impl VaultCertificateCache {
    fn cache_key(name: &str) -> String {
        format!("{AUTOCERT_PREFIX}{name}")
    }
}

#[async_trait]
impl CertificateCache for VaultCertificateCache {
    async fn get(&self, name: &str) -> Result<Vec<u8>, CacheError> {
        record::validate_cache_name(name)?;

        let key = Self::cache_key(name);
        let data: SecretData = match kv2::read(self.client.as_ref(), &self.mount, &key).await {
            Ok(data) => data,
            Err(err) if is_not_found(&err) => {
                debug!(store_id = %self.id, key = %key, "Certificate is not cached.");
                return Err(CacheError::Miss);
            }
            Err(err) => return Err(cache_vault_error(err)),
        };

        // An entry without the cert field is indistinguishable from a miss.
        let Some(encoded) = data.get(CERT_FIELD).and_then(Value::as_str) else {
            debug!(store_id = %self.id, key = %key, "Cached entry has no cert field.");
            return Err(CacheError::Miss);
        };

        BASE64.decode(encoded).map_err(|err| CacheError::Decode {
            message: err.to_string(),
        })
    }

    async fn put(&self, name: &str, data: &[u8]) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        let key = Self::cache_key(name);
        let mut entry = SecretData::new();
        entry.insert(CERT_FIELD.to_string(), Value::from(BASE64.encode(data)));

        kv2::set(self.client.as_ref(), &self.mount, &key, &entry)
            .await
            .map_err(cache_vault_error)?;

        info!(store_id = %self.id, key = %key, "Cached certificate.");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        let key = Self::cache_key(name);
        match kv2::delete_latest(self.client.as_ref(), &self.mount, &key).await {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(cache_vault_error(err)),
        }

        info!(store_id = %self.id, key = %key, "Deleted cached certificate.");
        Ok(())
    }
}
