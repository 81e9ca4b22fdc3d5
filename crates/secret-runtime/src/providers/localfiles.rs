//! Local filesystem secret provider.
//!
//! Stores each secret as a `<path>.secret` file under a base directory,
//! containing only the serialized data mapping; the path is reconstructed
//! from the file name. Intended for development and single-node
//! deployments.

use crate::client::{CertificateCache, PathStream, RecordStream, SecretProvider, STREAM_BUFFER};
use crate::error::{CacheError, SecretError};
use crate::provider::{ProviderType, SecretStoreConfig};
use crate::record::{self, SecretData, SecretRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};

#[cfg(test)]
#[path = "localfiles_tests.rs"]
mod tests;

/// Sub-directory holding certificate cache entries
const AUTOCERT_DIR: &str = "autocert";

/// Secret provider backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalFilesProvider {
    id: String,
    base_path: PathBuf,
}

impl LocalFilesProvider {
    /// Create a local files provider rooted at the configured directory
    ///
    /// The URI field is the base directory; it is created if missing.
    #[instrument(skip(config), fields(store_id = %config.id))]
    pub async fn new(config: SecretStoreConfig) -> Result<Self, SecretError> {
        if config.uri.is_empty() {
            return Err(SecretError::MissingConfiguration {
                field: "uri".to_string(),
            });
        }

        fs::create_dir_all(&config.uri).await?;
        debug!("Created local files client.");

        Ok(Self {
            id: config.id,
            base_path: PathBuf::from(config.uri),
        })
    }

    /// Map a secret path to its absolute on-disk location
    fn secret_location(&self, path: &str) -> PathBuf {
        let file_name = record::secret_file_name(path);
        let mut location = self.base_path.clone();
        for segment in file_name.split('/') {
            location.push(segment);
        }
        location
    }
}

#[async_trait]
impl SecretProvider for LocalFilesProvider {
    async fn upsert_secret(&self, path: &str, data: &SecretData) -> Result<(), SecretError> {
        record::validate_path(path)?;

        let target = self.secret_location(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(data)?;

        // Write to a temporary file first, then rename into place.
        let temp_path = target.with_extension("tmp");
        fs::write(&temp_path, &bytes).await?;
        fs::rename(&temp_path, &target).await?;

        info!(store_id = %self.id, path = %path, "Upserted secret.");
        Ok(())
    }

    async fn read_secret(&self, path: &str) -> Result<SecretRecord, SecretError> {
        record::validate_path(path)?;

        let target = self.secret_location(path);
        let bytes = match fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(store_id = %self.id, path = %path, "Secret does not exist.");
                return Err(SecretError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let data: SecretData =
            serde_json::from_slice(&bytes).map_err(|err| SecretError::Decode {
                path: path.to_string(),
                message: err.to_string(),
            })?;

        debug!(store_id = %self.id, path = %path, "Read secret.");
        Ok(SecretRecord::new(record::strip_secret_extension(path), data))
    }

    async fn delete_secret(&self, path: &str) -> Result<(), SecretError> {
        record::validate_path(path)?;

        // Removing an entry that is already absent is a success.
        let target = self.secret_location(path);
        match fs::remove_file(&target).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        info!(store_id = %self.id, path = %path, "Deleted secret.");
        Ok(())
    }

    fn list_secrets(&self) -> PathStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let base_path = self.base_path.clone();
        let store_id = self.id.clone();

        tokio::spawn(async move {
            let entries = match collect_secret_files(&base_path).await {
                Ok(entries) => entries,
                Err(error) => {
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            };

            for (path, _) in entries {
                if tx.send(Ok(path)).await.is_err() {
                    return;
                }
            }

            debug!(store_id = %store_id, "Listed secrets.");
        });

        ReceiverStream::new(rx)
    }

    fn read_all_secrets(&self) -> RecordStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let base_path = self.base_path.clone();
        let store_id = self.id.clone();

        tokio::spawn(async move {
            let entries = match collect_secret_files(&base_path).await {
                Ok(entries) => entries,
                Err(error) => {
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            };

            for (path, location) in entries {
                // A mid-stream read or decode failure aborts the remainder
                // of the sequence rather than skipping the bad entry.
                let record = match read_record(&path, &location).await {
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

            debug!(store_id = %store_id, "Read all secrets.");
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
            provider: ProviderType::LocalFiles.to_string(),
        })
    }

    fn certificate_cache(&self) -> Box<dyn CertificateCache> {
        Box::new(LocalFilesCertificateCache {
            directory: self.base_path.join(AUTOCERT_DIR),
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::LocalFiles
    }

    fn store_id(&self) -> &str {
        &self.id
    }
}

/// Walk the base directory for `*.secret` files
///
/// Returns `/`-separated paths relative to the base, without the `.secret`
/// extension, paired with their absolute locations.
async fn collect_secret_files(
    base_path: &Path,
) -> Result<Vec<(String, PathBuf)>, SecretError> {
    let mut results = Vec::new();
    let mut pending = vec![base_path.to_path_buf()];

    while let Some(directory) = pending.pop() {
        let mut entries = fs::read_dir(&directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(entry_path);
            } else if entry_path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(record::SECRET_FILE_EXTENSION))
            {
                if let Ok(relative) = entry_path.strip_prefix(base_path) {
                    let segments: Vec<&str> = relative
                        .iter()
                        .filter_map(|segment| segment.to_str())
                        .collect();
                    let joined = segments.join("/");
                    results.push((
                        record::strip_secret_extension(&joined).to_string(),
                        entry_path,
                    ));
                }
            }
        }
    }

    Ok(results)
}

/// Read and deserialize one secret file
async fn read_record(path: &str, location: &Path) -> Result<SecretRecord, SecretError> {
    let bytes = fs::read(location).await?;
    let data: SecretData = serde_json::from_slice(&bytes).map_err(|err| SecretError::Decode {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    Ok(SecretRecord::new(path, data))
}

/// Certificate cache backed by a dedicated autocert directory
#[derive(Debug, Clone)]
pub struct LocalFilesCertificateCache {
    directory: PathBuf,
}

#[async_trait]
impl CertificateCache for LocalFilesCertificateCache {
    async fn get(&self, name: &str) -> Result<Vec<u8>, CacheError> {
        record::validate_cache_name(name)?;

        match fs::read(self.directory.join(name)).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(CacheError::Miss),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, name: &str, data: &[u8]) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        fs::create_dir_all(&self.directory).await?;

        // Write to a temporary file first, then rename into place. A
        // caller canceling the future abandons the pending rename as
        // best-effort.
        let temp_path = self.directory.join(format!(".{name}.tmp"));
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, self.directory.join(name)).await?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CacheError> {
        record::validate_cache_name(name)?;

        match fs::remove_file(self.directory.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
