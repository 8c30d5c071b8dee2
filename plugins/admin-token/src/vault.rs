//! Durable per-document capability token cache

use mdedit_core::{KeyValueStore, StorageConfig};
use std::sync::Arc;

/// Capability tokens keyed by document slug.
///
/// Tokens live in the shared [`KeyValueStore`] under `<prefix><slug>`, so they
/// survive reloads when the store is durable and never collide with unrelated
/// keys. Every operation is synchronous and infallible; a miss is `None`.
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl TokenVault {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Vault using the configured key prefix
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &StorageConfig) -> Self {
        Self::new(store, config.token_key_prefix.clone())
    }

    /// Storage key of a document's token
    pub fn key_for(&self, slug: &str) -> String {
        format!("{}{}", self.prefix, slug)
    }

    /// Remember the token granted for a document, replacing any previous one
    pub fn store(&self, slug: &str, token: &str) {
        self.store.set(&self.key_for(slug), token);
        tracing::debug!("Stored token under {}", self.key_for(slug));
    }

    pub fn get(&self, slug: &str) -> Option<String> {
        self.store.get(&self.key_for(slug))
    }

    /// Forget a document's token; clearing an absent token is a no-op
    pub fn clear(&self, slug: &str) {
        self.store.delete(&self.key_for(slug));
        tracing::debug!("Cleared token under {}", self.key_for(slug));
    }

    /// Slugs of every document that currently has a token
    pub fn documents(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("prefix", &self.prefix)
            .field("documents", &self.documents().len())
            .finish()
    }
}
