//! Provider types and the secret store configuration record.

use crate::error::SecretError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

// Environment variables consulted by the one-shot resolution step.
pub const ENV_STORE_TYPE: &str = "SECRET_STORE_TYPE";
pub const ENV_STORE_URI: &str = "SECRET_STORE_URI";
pub const ENV_STORE_CLIENT_ID: &str = "SECRET_STORE_CLIENT_ID";
pub const ENV_STORE_CLIENT_SECRET: &str = "SECRET_STORE_CLIENT_SECRET";
pub const ENV_STORE_CLIENT_TOKEN: &str = "SECRET_STORE_CLIENT_TOKEN";
pub const ENV_STORE_REGION: &str = "SECRET_STORE_REGION";
pub const ENV_STORE_UNSEAL_SHARDS: &str = "SECRET_STORE_UNSEAL_SHARDS";

// Vault-conventional fallbacks, honored for the Vault provider only.
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";

/// Enumeration of supported secret store providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSecretsManager,
    LocalFiles,
    Vault,
}

impl ProviderType {
    /// Parse a declared provider type, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "awssecretsmanager" => Some(Self::AwsSecretsManager),
            "localfiles" => Some(Self::LocalFiles),
            "vault" => Some(Self::Vault),
            _ => None,
        }
    }

    /// Check if provider can issue scoped access tokens
    pub fn supports_token_issuance(&self) -> bool {
        matches!(self, Self::Vault)
    }

    /// Get canonical provider name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsSecretsManager => "awssecretsmanager",
            Self::LocalFiles => "localfiles",
            Self::Vault => "vault",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SecretError::UnknownProviderType {
            store_type: s.to_string(),
        })
    }
}

/// Declarative configuration for one secret store instance
///
/// Constructed once by the caller, consumed exactly once by the factory to
/// build an adapter. Each backend reads only the subset of fields it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretStoreConfig {
    /// ID of the secret store.
    pub id: String,

    /// Type of secret storage (e.g., "vault"), matched case-insensitively.
    #[serde(rename = "type")]
    pub store_type: String,

    /// Address of the secret store, or base directory for local files.
    pub uri: String,

    /// Client ID used by the secret store provider.
    #[serde(rename = "clientID")]
    pub client_id: String,

    /// Shared secret used by the secret store provider.
    #[serde(rename = "clientSecret")]
    pub client_secret: String,

    /// Optional session token used by the secret store provider.
    #[serde(rename = "clientToken")]
    pub client_token: String,

    /// Region of the secret store provider.
    pub region: String,

    /// Shared secrets to unseal the secret store.
    #[serde(rename = "unsealShards")]
    pub unseal_shards: Vec<String>,
}

impl SecretStoreConfig {
    /// Create a configuration record for a store type
    pub fn new(id: impl Into<String>, store_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            store_type: store_type.into(),
            ..Self::default()
        }
    }

    /// Merge blank fields from process-wide environment settings
    ///
    /// Performed exactly once before adapter construction, never ad hoc
    /// inside per-field checks. Declared values always win over the
    /// environment.
    pub fn resolve_from_env(&mut self) {
        fill_if_empty(&mut self.store_type, ENV_STORE_TYPE);
        fill_if_empty(&mut self.uri, ENV_STORE_URI);
        fill_if_empty(&mut self.client_id, ENV_STORE_CLIENT_ID);
        fill_if_empty(&mut self.client_secret, ENV_STORE_CLIENT_SECRET);
        fill_if_empty(&mut self.client_token, ENV_STORE_CLIENT_TOKEN);
        fill_if_empty(&mut self.region, ENV_STORE_REGION);

        if self.unseal_shards.is_empty() {
            if let Ok(shards) = env::var(ENV_STORE_UNSEAL_SHARDS) {
                self.unseal_shards = shards
                    .split(',')
                    .map(|shard| shard.trim().to_string())
                    .filter(|shard| !shard.is_empty())
                    .collect();
            }
        }

        // Vault deployments conventionally configure through VAULT_ADDR
        // and VAULT_TOKEN; honor those only when the store is a Vault.
        if ProviderType::parse(&self.store_type) == Some(ProviderType::Vault) {
            fill_if_empty(&mut self.uri, ENV_VAULT_ADDR);
            fill_if_empty(&mut self.client_secret, ENV_VAULT_TOKEN);
        }
    }
}

fn fill_if_empty(field: &mut String, var: &str) {
    if field.is_empty() {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                *field = value;
            }
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
