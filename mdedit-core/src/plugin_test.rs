//! Tests for the plugin system

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::error::{MdeditError, Result};
    use crate::event::InMemoryEventBus;
    use crate::plugin::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Mock plugin for testing
    struct MockPlugin {
        name: String,
        version: String,
        dependencies: Vec<String>,
        status: PluginStatus,
        journal: Arc<Mutex<Vec<String>>>,
        fail_init: bool,
    }

    impl MockPlugin {
        fn new(name: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                version: "0.1.0".to_string(),
                dependencies: Vec::new(),
                status: PluginStatus::Loading,
                journal,
                fail_init: false,
            }
        }

        fn with_dependencies(mut self, deps: Vec<&str>) -> Self {
            self.dependencies = deps.iter().map(|s| s.to_string()).collect();
            self
        }

        fn failing(mut self) -> Self {
            self.fail_init = true;
            self
        }
    }

    #[async_trait]
    impl Plugin for MockPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            &self.version
        }

        fn dependencies(&self) -> Vec<&str> {
            self.dependencies.iter().map(|s| s.as_str()).collect()
        }

        async fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
            if self.fail_init {
                return Err(MdeditError::plugin("mount failed"));
            }
            self.journal.lock().push(format!("mount:{}", self.name));
            self.status = PluginStatus::Active;
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.journal.lock().push(format!("unmount:{}", self.name));
            self.status = PluginStatus::Stopped;
            Ok(())
        }

        fn status(&self) -> PluginStatus {
            self.status.clone()
        }
    }

    fn create_test_context() -> PluginContext {
        PluginContext::new(
            Arc::new(InMemoryEventBus::new()),
            Arc::new(ClientConfig::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn test_register_and_list_plugins() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        let context = create_test_context();

        registry
            .register_plugin(Box::new(MockPlugin::new("tokens", journal.clone())), &context)
            .await
            .unwrap();
        registry
            .register_plugin(
                Box::new(MockPlugin::new("editor", journal.clone()).with_dependencies(vec!["tokens"])),
                &context,
            )
            .await
            .unwrap();

        assert!(registry.is_plugin_loaded("editor"));
        let names: Vec<_> = registry.list_plugins().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["tokens".to_string(), "editor".to_string()]);
        assert_eq!(
            registry.get_plugin_info("editor").unwrap().status,
            PluginStatus::Active
        );
    }

    #[tokio::test]
    async fn test_missing_dependency_is_rejected() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();

        let result = registry
            .register_plugin(
                Box::new(MockPlugin::new("editor", journal.clone()).with_dependencies(vec!["tokens"])),
                &create_test_context(),
            )
            .await;

        assert!(matches!(result, Err(MdeditError::Plugin(_))));
        assert!(journal.lock().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_and_failing_plugins() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        let context = create_test_context();

        registry
            .register_plugin(Box::new(MockPlugin::new("flash", journal.clone())), &context)
            .await
            .unwrap();
        assert!(registry
            .register_plugin(Box::new(MockPlugin::new("flash", journal.clone())), &context)
            .await
            .is_err());

        assert!(registry
            .register_plugin(Box::new(MockPlugin::new("broken", journal.clone()).failing()), &context)
            .await
            .is_err());
        assert!(!registry.is_plugin_loaded("broken"));
    }

    #[tokio::test]
    async fn test_shutdown_runs_in_reverse_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        let context = create_test_context();

        for name in ["a", "b", "c"] {
            registry
                .register_plugin(Box::new(MockPlugin::new(name, journal.clone())), &context)
                .await
                .unwrap();
        }

        registry.shutdown().await.unwrap();
        let journal = journal.lock().clone();
        assert_eq!(
            &journal[3..],
            &["unmount:c".to_string(), "unmount:b".to_string(), "unmount:a".to_string()]
        );
        assert!(registry.list_plugins().is_empty());
    }
}
