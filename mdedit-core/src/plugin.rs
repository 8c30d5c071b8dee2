//! Plugin system: mount/unmount lifecycle for client hooks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::ClientConfig;
use crate::error::{MdeditError, Result};
use crate::event::EventBus;
use crate::storage::KeyValueStore;

/// Core plugin trait that all client hooks implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Get the plugin version
    fn version(&self) -> &str;

    /// Get plugin dependencies (other plugin names)
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Mount the plugin with the given context
    async fn initialize(&mut self, context: &PluginContext) -> Result<()>;

    /// Unmount the plugin, releasing subscriptions and timers
    async fn shutdown(&mut self) -> Result<()>;

    /// Get plugin status
    fn status(&self) -> PluginStatus {
        PluginStatus::Active
    }

    /// Get services provided by this plugin
    fn provided_services(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Context provided to plugins during initialization
#[derive(Clone)]
pub struct PluginContext {
    pub event_bus: Arc<dyn EventBus>,
    pub config: Arc<ClientConfig>,
    pub storage: Arc<dyn KeyValueStore>,
}

impl PluginContext {
    /// Create a new plugin context
    pub fn new(
        event_bus: Arc<dyn EventBus>,
        config: Arc<ClientConfig>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            event_bus,
            config,
            storage,
        }
    }
}

/// Plugin registry for managing mounted plugins
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn Plugin>>,
    plugin_info: HashMap<String, PluginInfo>,
    load_order: Vec<String>,
}

impl PluginRegistry {
    /// Create a new plugin registry
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            plugin_info: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Register and initialize a plugin
    pub async fn register_plugin(
        &mut self,
        mut plugin: Box<dyn Plugin>,
        context: &PluginContext,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        let version = plugin.version().to_string();

        tracing::info!("Registering plugin: {} v{}", name, version);

        if self.plugins.contains_key(&name) {
            return Err(MdeditError::Plugin(format!(
                "Plugin {} is already registered",
                name
            )));
        }

        for dep in plugin.dependencies() {
            if !self.plugins.contains_key(dep) {
                return Err(MdeditError::Plugin(format!(
                    "Plugin {} depends on {}, which is not loaded",
                    name, dep
                )));
            }
        }

        plugin.initialize(context).await?;

        let info = PluginInfo {
            name: name.clone(),
            version,
            status: plugin.status(),
            load_time: SystemTime::now(),
            dependencies: plugin
                .dependencies()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            provided_services: plugin
                .provided_services()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        self.plugin_info.insert(name.clone(), info);
        self.plugins.insert(name.clone(), plugin);
        self.load_order.push(name);

        Ok(())
    }

    /// Shutdown all plugins in reverse load order
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down plugins");

        for plugin_name in self.load_order.iter().rev() {
            if let Some(plugin) = self.plugins.get_mut(plugin_name) {
                if let Err(e) = plugin.shutdown().await {
                    tracing::error!("Failed to shutdown plugin {}: {}", plugin_name, e);
                }
            }
        }

        self.plugins.clear();
        self.plugin_info.clear();
        self.load_order.clear();

        Ok(())
    }

    /// Get plugin information
    pub fn get_plugin_info(&self, name: &str) -> Option<&PluginInfo> {
        self.plugin_info.get(name)
    }

    /// List all loaded plugins in load order
    pub fn list_plugins(&self) -> Vec<&PluginInfo> {
        self.load_order
            .iter()
            .filter_map(|name| self.plugin_info.get(name))
            .collect()
    }

    /// Check if a plugin is loaded
    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a loaded plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub load_time: SystemTime,
    pub dependencies: Vec<String>,
    pub provided_services: Vec<String>,
}

/// Plugin status enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginStatus {
    Loading,
    Active,
    Error(String),
    Disabled,
    Shutting,
    Stopped,
}
