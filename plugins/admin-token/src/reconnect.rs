//! Connect parameters carrying the capability token of the open document

use mdedit_core::{
    ClientConfig, ConnectParams, KeyValueStore, MdeditError, ParamsProvider, Result,
    ADMIN_TOKEN_PARAM,
};
use regex::Regex;
use std::sync::Arc;

use crate::vault::TokenVault;

/// Adds `admin_token` to the handshake when the path names a document with a
/// stored token. Consulted on every connect attempt, so nothing is cached.
#[derive(Debug, Clone)]
pub struct ReconnectParamBuilder {
    vault: TokenVault,
    pattern: Regex,
}

impl ReconnectParamBuilder {
    /// Builder matching `<route_prefix>/<slug>`
    pub fn new(vault: TokenVault, route_prefix: &str) -> Result<Self> {
        let prefix = route_prefix.trim_end_matches('/');
        let pattern = Regex::new(&format!("^{}/([^/]+)$", regex::escape(prefix)))
            .map_err(|e| MdeditError::config(format!("Invalid editor route prefix: {}", e)))?;

        Ok(Self { vault, pattern })
    }

    /// Builder over the configured storage prefix and editor route
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &ClientConfig) -> Result<Self> {
        Self::new(
            TokenVault::from_config(store, &config.storage),
            &config.editor.route_prefix,
        )
    }

    /// Document slug named by a navigation path, if it is an editor route
    pub fn slug_for_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(path)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    /// Augment the base parameters for the given path
    pub fn build(&self, path: &str, base: ConnectParams) -> ConnectParams {
        let Some(slug) = self.slug_for_path(path) else {
            tracing::trace!("Path {} is not an editor route", path);
            return base;
        };

        match self.vault.get(slug) {
            // An empty stored value counts as no grant
            Some(token) if !token.is_empty() => {
                tracing::debug!("Attaching admin token for document {}", slug);
                base.with(ADMIN_TOKEN_PARAM, token)
            }
            _ => {
                tracing::trace!("No admin token for document {}", slug);
                base
            }
        }
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }
}

impl ParamsProvider for ReconnectParamBuilder {
    fn connect_params(&self, path: &str, base: ConnectParams) -> ConnectParams {
        self.build(path, base)
    }
}
