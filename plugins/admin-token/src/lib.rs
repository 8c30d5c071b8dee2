//! Admin token plugin for mdedit
//!
//! Keeps the capability tokens the server grants per document and feeds them
//! back into every connection handshake.

use async_trait::async_trait;
use mdedit_core::{
    ClientEvent, ClientEventHandler, EventBus, EventKind, KindFilter, Plugin, PluginContext,
    PluginStatus, Result, SubscriptionId,
};
use std::sync::Arc;

pub mod reconnect;
pub mod vault;

pub use reconnect::ReconnectParamBuilder;
pub use vault::TokenVault;

/// Plugin applying `store_admin_token` / `clear_admin_token` events
pub struct AdminTokenPlugin {
    name: String,
    version: String,
    status: PluginStatus,
    vault: Option<TokenVault>,
    event_bus: Option<Arc<dyn EventBus>>,
    subscription: Option<SubscriptionId>,
}

impl AdminTokenPlugin {
    pub fn new() -> Self {
        Self {
            name: "admin-token".to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
            vault: None,
            event_bus: None,
            subscription: None,
        }
    }

    /// The vault, available once the plugin is mounted
    pub fn vault(&self) -> Option<&TokenVault> {
        self.vault.as_ref()
    }
}

impl Default for AdminTokenPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for AdminTokenPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Initializing admin token plugin");

        let vault = TokenVault::from_config(context.storage.clone(), &context.config.storage);
        let handler = Arc::new(AdminTokenEventHandler {
            vault: vault.clone(),
        });

        let subscription = context
            .event_bus
            .subscribe(
                handler,
                Some(Box::new(KindFilter::new([
                    EventKind::StoreAdminToken,
                    EventKind::ClearAdminToken,
                ]))),
            )
            .await?;

        self.vault = Some(vault);
        self.event_bus = Some(context.event_bus.clone());
        self.subscription = Some(subscription);
        self.status = PluginStatus::Active;

        tracing::info!("Admin token plugin initialized successfully");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down admin token plugin");
        self.status = PluginStatus::Shutting;

        if let (Some(bus), Some(id)) = (self.event_bus.take(), self.subscription.take()) {
            bus.unsubscribe(id).await?;
        }

        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_services(&self) -> Vec<&str> {
        vec!["admin-token", "connect-params"]
    }
}

/// Applies token grants and revocations to the vault
pub struct AdminTokenEventHandler {
    vault: TokenVault,
}

impl AdminTokenEventHandler {
    pub fn new(vault: TokenVault) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl ClientEventHandler for AdminTokenEventHandler {
    async fn handle_event(&self, event: &ClientEvent) -> Result<()> {
        match event {
            ClientEvent::StoreAdminToken { slug, admin_token } => {
                self.vault.store(slug, admin_token);
                tracing::info!("Admin token stored for document: {}", slug);
            }
            ClientEvent::ClearAdminToken { slug } => {
                self.vault.clear(slug);
                tracing::info!("Admin token cleared for document: {}", slug);
            }
            _ => {}
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "admin-token-handler"
    }
}
