//! Secret Service (GNOME Keyring, KWallet) backed vault.

use async_trait::async_trait;
use std::collections::HashMap;
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use super::{CredentialLookupKey, CredentialVault, VaultError, VaultResult};

/// Schema GNOME Keyring uses for network passwords
const NETWORK_PASSWORD_SCHEMA: &str = "org.gnome.keyring.NetworkPassword";

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Service",
    default_service = "org.freedesktop.secrets",
    default_path = "/org/freedesktop/secrets",
    gen_blocking = false
)]
trait SecretService {
    fn search_items(
        &self,
        attributes: HashMap<&str, &str>,
    ) -> zbus::Result<(Vec<OwnedObjectPath>, Vec<OwnedObjectPath>)>;
}

/// Vault that searches the session's Secret Service.
///
/// Each lookup is an independent `SearchItems` call, so an unavailable
/// service only fails the lookups made while it is down.
pub struct SecretServiceVault {
    connection: Connection,
}

impl SecretServiceVault {
    /// Create a vault on an existing session bus connection
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

/// Search attributes for a network password record
fn search_attributes(key: &CredentialLookupKey) -> HashMap<&str, &str> {
    HashMap::from([
        ("xdg:schema", NETWORK_PASSWORD_SCHEMA),
        ("server", key.host.as_str()),
        ("protocol", key.protocol.as_str()),
    ])
}

#[async_trait]
impl CredentialVault for SecretServiceVault {
    async fn count_network_credentials(&self, key: &CredentialLookupKey) -> VaultResult<usize> {
        let proxy = SecretServiceProxy::new(&self.connection)
            .await
            .map_err(|e| VaultError::query(key, e.to_string()))?;

        let (unlocked, locked) = proxy
            .search_items(search_attributes(key))
            .await
            .map_err(|e| VaultError::query(key, e.to_string()))?;

        Ok(unlocked.len() + locked.len())
    }
}
