//! mdedit Core - The client engine for the mdedit collaborative markdown editor
//!
//! This crate provides the core interfaces, event system, storage capability,
//! live connection handle and plugin lifecycle shared by every client hook.

pub mod config;
pub mod error;
pub mod event;
pub mod plugin;
pub mod socket;
pub mod storage;

#[cfg(test)]
mod event_test;

#[cfg(test)]
mod plugin_test;

// Re-export commonly used types
pub use config::{
    ClientConfig, EditorConfig, FlashConfig, SaveModifier, SocketConfig, StorageConfig,
    ValidationResult,
};
pub use error::{ErrorSeverity, MdeditError, Result};
pub use event::{
    ClientEvent, ClientEventHandler, Event, EventBus, EventFilter, EventKind, InMemoryEventBus,
    KindFilter, SubscriptionId,
};
pub use plugin::{Plugin, PluginContext, PluginInfo, PluginRegistry, PluginStatus};
pub use socket::{
    BaseParams, ConnectParams, ConnectRequest, ConnectionState, LiveSocket, ParamsProvider,
    Transport, ADMIN_TOKEN_PARAM, CSRF_TOKEN_PARAM,
};
pub use storage::{open_store, FileStore, KeyValueStore, MemoryStore};

use event::serialization;
use std::sync::Arc;

/// Client engine that owns the plugins, the event bus and the live socket
pub struct ClientEngine {
    event_bus: Arc<dyn EventBus>,
    plugin_registry: PluginRegistry,
    storage: Arc<dyn KeyValueStore>,
    config: Arc<ClientConfig>,
    socket: Option<Arc<LiveSocket>>,
    is_initialized: bool,
}

impl ClientEngine {
    /// Create a new engine; the configuration must validate
    pub fn new(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            event_bus: Arc::new(InMemoryEventBus::new()),
            plugin_registry: PluginRegistry::new(),
            storage,
            config: Arc::new(config),
            socket: None,
            is_initialized: false,
        })
    }

    /// Initialize the engine; plugins are registered afterwards
    pub async fn initialize(&mut self) -> Result<()> {
        if self.is_initialized {
            tracing::warn!("Client engine is already initialized");
            return Ok(());
        }

        tracing::info!("Initializing mdedit client engine");
        if self.config.dev_mode {
            tracing::debug!("Development mode enabled");
        }

        self.is_initialized = true;
        tracing::info!("Client engine initialized successfully");
        Ok(())
    }

    /// Register and mount a plugin
    pub async fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        if !self.is_initialized {
            return Err(MdeditError::state(
                "Client engine must be initialized before registering plugins",
            ));
        }

        let context = self.plugin_context();
        self.plugin_registry.register_plugin(plugin, &context).await
    }

    /// Build the context handed to plugins on mount
    pub fn plugin_context(&self) -> PluginContext {
        PluginContext::new(
            self.event_bus.clone(),
            self.config.clone(),
            self.storage.clone(),
        )
    }

    /// Deliver an inbound server event to the mounted plugins
    pub async fn publish(&self, event: ClientEvent) -> Result<()> {
        if event.is_token_event() {
            tracing::info!("Capability token update, next reconnect will use it");
        }
        tracing::debug!("Dispatching {}", serialization::format_event_for_log(&event));
        self.event_bus.publish(event).await
    }

    /// Decode a wire-format event and deliver it
    pub async fn dispatch_wire(&self, json: &str) -> Result<()> {
        let event = serialization::deserialize_event(json)?;
        self.publish(event).await
    }

    /// Create the live socket and open the first connection
    pub async fn connect(
        &mut self,
        csrf_token: impl Into<String>,
        path: impl Into<String>,
        provider: Arc<dyn ParamsProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<ConnectParams> {
        if self.socket.is_some() {
            return Err(MdeditError::state("Live socket already exists"));
        }

        let socket = Arc::new(LiveSocket::new(
            &self.config.socket,
            csrf_token,
            path,
            provider,
            transport,
        ));

        let params = socket.connect().await?;
        self.socket = Some(socket);
        Ok(params)
    }

    /// Reconnect the existing socket with freshly computed parameters
    pub async fn reconnect(&self) -> Result<ConnectParams> {
        match &self.socket {
            Some(socket) => socket.reconnect().await,
            None => Err(MdeditError::state("No live socket to reconnect")),
        }
    }

    /// The live socket, present between `connect` and `disconnect`
    pub fn socket(&self) -> Option<Arc<LiveSocket>> {
        self.socket.clone()
    }

    /// Close and drop the live socket
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(socket) = self.socket.take() {
            socket.disconnect().await?;
        }
        Ok(())
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        self.event_bus.clone()
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.storage.clone()
    }

    pub fn list_plugins(&self) -> Vec<&PluginInfo> {
        self.plugin_registry.list_plugins()
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Disconnect and unmount every plugin
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.is_initialized {
            return Ok(());
        }

        tracing::info!("Shutting down mdedit client engine");

        if let Err(e) = self.disconnect().await {
            tracing::error!("Failed to close live socket: {}", e);
        }
        self.plugin_registry.shutdown().await?;

        self.is_initialized = false;
        tracing::info!("Client engine shutdown complete");
        Ok(())
    }
}
