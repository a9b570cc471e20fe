//! SSH credential provisioning
//!
//! Installs a stored SSH key into the build container so private
//! repositories can be cloned. Keys protected by a passphrase also get an
//! askpass helper that hands the passphrase to `ssh-add`.

use base64ct::{Base64, Encoding};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::store::{KeyStore, StoreError};

/// In-container path of the private key
pub const KEY_PATH: &str = "/root/.ssh/id_rsa";

/// In-container path of the askpass helper
pub const PASSPHRASE_HELPER_PATH: &str = "/root/.password";

const KEY_MODE: u32 = 0o600;
const HELPER_MODE: u32 = 0o700;

/// Errors raised while provisioning credentials
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("error fetching ssh key {key_id}: {source}")]
    Fetch {
        key_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("error decoding ssh key {key_id}: {source}")]
    Decode {
        key_id: Uuid,
        #[source]
        source: base64ct::Error,
    },

    #[error("error copying {path} into the container: {source}")]
    Push {
        path: String,
        #[source]
        source: RuntimeError,
    },

    #[error("error preparing ssh configuration: {source}")]
    SshConfig {
        #[source]
        source: RuntimeError,
    },
}

/// Installs SSH keys into build containers
pub struct CredentialProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
    keys: Arc<dyn KeyStore>,
}

impl CredentialProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, keys: Arc<dyn KeyStore>) -> Self {
        Self { runtime, keys }
    }

    /// Installs the key `key_id` into `container`
    ///
    /// Returns whether the clone must go through the passphrase workflow.
    /// Without a key nothing happens and no passphrase is needed.
    pub async fn provision(
        &self,
        container: &str,
        key_id: Option<Uuid>,
    ) -> Result<bool, ProvisionError> {
        let Some(key_id) = key_id else {
            debug!("No ssh key for container {}", container);
            return Ok(false);
        };

        let key = self
            .keys
            .get_key(key_id)
            .await
            .map_err(|source| ProvisionError::Fetch { key_id, source })?;

        let material = decode_key(&key.data).map_err(|source| ProvisionError::Decode { key_id, source })?;

        self.push(container, KEY_PATH, &material, KEY_MODE).await?;
        info!("Installed ssh key {} in container {}", key_id, container);

        let Some(passphrase) = key.password.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(false);
        };

        let helper = passphrase_helper(passphrase);
        self.push(container, PASSPHRASE_HELPER_PATH, helper.as_bytes(), HELPER_MODE)
            .await?;
        debug!("Installed passphrase helper in container {}", container);

        Ok(true)
    }

    async fn push(
        &self,
        container: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), ProvisionError> {
        self.runtime
            .push_file(container, path, content, mode)
            .await
            .map_err(|source| ProvisionError::Push {
                path: path.to_string(),
                source,
            })
    }
}

/// Decodes base64 key material, ignoring whitespace and line breaks
pub fn decode_key(data: &str) -> Result<Vec<u8>, base64ct::Error> {
    let compact: String = data.split_ascii_whitespace().collect();
    Base64::decode_vec(&compact)
}

/// Askpass helper printing the passphrase
fn passphrase_helper(passphrase: &str) -> String {
    format!("#!/bin/sh\necho {}\n", shell_quote(passphrase))
}

/// Quotes a value for POSIX sh, leaving shell-safe values untouched
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\"'\"'"))
    }
}
