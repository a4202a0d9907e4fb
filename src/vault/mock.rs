//! Mock credential vault for testing.
//!
//! Answers lookups from an in-memory table and counts calls, with optional
//! failure injection. No bus connection is involved.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CredentialLookupKey, CredentialVault, VaultError, VaultResult};

/// In-memory vault with configurable answers.
///
/// Clones share the call counter, so a test can keep one clone and hand
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockVault {
    records: HashMap<CredentialLookupKey, usize>,
    failure: Option<String>,
    lookups: Arc<AtomicUsize>,
}

impl MockVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `count` records for (protocol, host).
    pub fn with_credentials(mut self, protocol: &str, host: &str, count: usize) -> Self {
        self.records.insert(
            CredentialLookupKey {
                protocol: protocol.to_string(),
                host: host.to_string(),
            },
            count,
        );
        self
    }

    /// Make every lookup fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of lookups made so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialVault for MockVault {
    async fn count_network_credentials(&self, key: &CredentialLookupKey) -> VaultResult<usize> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(ref message) = self.failure {
            return Err(VaultError::query(key, message.clone()));
        }

        Ok(self.records.get(key).copied().unwrap_or(0))
    }
}
