//! Clipboard plugin for mdedit
//!
//! Places server-provided text on the clipboard. When the primary clipboard
//! refuses the write, the text is copied synchronously through a transient
//! scratch buffer instead. Failures are logged, never returned.

use async_trait::async_trait;
use mdedit_core::{
    ClientEvent, ClientEventHandler, EventBus, EventKind, KindFilter, MdeditError, Plugin,
    PluginContext, PluginStatus, Result, SubscriptionId,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Asynchronous system clipboard
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    async fn write_text(&self, text: &str) -> std::result::Result<(), ClipboardError>;

    fn backend_name(&self) -> &str {
        "clipboard"
    }
}

/// Synchronous copy path used when the backend fails
pub trait FallbackCopier: Send + Sync {
    fn copy(&self, text: &str) -> std::result::Result<(), ClipboardError>;
}

/// In-process clipboard; the primary path can be switched off to model a
/// denied permission
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: RwLock<Option<String>>,
    unavailable: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.read().clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn store(&self, text: &str) {
        *self.contents.write() = Some(text.to_string());
    }
}

#[async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn write_text(&self, text: &str) -> std::result::Result<(), ClipboardError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClipboardError::Unavailable(
                "write permission denied".to_string(),
            ));
        }
        self.store(text);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Off-screen buffer holding the text while it is selected and copied
struct ScratchBuffer {
    text: String,
}

impl ScratchBuffer {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    fn select_all(&self) -> &str {
        &self.text
    }
}

/// Fallback that selects the text in a scratch buffer and copies the
/// selection straight into the clipboard, bypassing its async write path
pub struct ScratchBufferCopier {
    clipboard: Arc<MemoryClipboard>,
}

impl ScratchBufferCopier {
    pub fn new(clipboard: Arc<MemoryClipboard>) -> Self {
        Self { clipboard }
    }
}

impl FallbackCopier for ScratchBufferCopier {
    fn copy(&self, text: &str) -> std::result::Result<(), ClipboardError> {
        let scratch = ScratchBuffer::new(text);
        self.clipboard.store(scratch.select_all());
        Ok(())
    }
}

/// Copy counters, by path taken
#[derive(Debug, Default)]
pub struct CopyStats {
    primary: AtomicU64,
    fallback: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of [`CopyStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CopyReport {
    pub primary: u64,
    pub fallback: u64,
    pub failed: u64,
}

impl CopyStats {
    pub fn report(&self) -> CopyReport {
        CopyReport {
            primary: self.primary.load(Ordering::SeqCst),
            fallback: self.fallback.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Plugin handling `copy_to_clipboard` events
pub struct ClipboardPlugin {
    name: String,
    version: String,
    status: PluginStatus,
    backend: Arc<dyn ClipboardBackend>,
    fallback: Arc<dyn FallbackCopier>,
    stats: Arc<CopyStats>,
    event_bus: Option<Arc<dyn EventBus>>,
    subscription: Option<SubscriptionId>,
}

impl ClipboardPlugin {
    pub fn new(backend: Arc<dyn ClipboardBackend>, fallback: Arc<dyn FallbackCopier>) -> Self {
        Self {
            name: "clipboard".to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
            backend,
            fallback,
            stats: Arc::new(CopyStats::default()),
            event_bus: None,
            subscription: None,
        }
    }

    /// Plugin over an in-process clipboard with the scratch-buffer fallback
    pub fn in_memory(clipboard: Arc<MemoryClipboard>) -> Self {
        let fallback = Arc::new(ScratchBufferCopier::new(clipboard.clone()));
        Self::new(clipboard, fallback)
    }

    pub fn stats(&self) -> Arc<CopyStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Plugin for ClipboardPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!(
            "Initializing clipboard plugin with {} backend",
            self.backend.backend_name()
        );

        let handler = Arc::new(ClipboardHandler {
            backend: self.backend.clone(),
            fallback: self.fallback.clone(),
            stats: self.stats.clone(),
        });
        let subscription = context
            .event_bus
            .subscribe(
                handler,
                Some(Box::new(KindFilter::only(EventKind::CopyToClipboard))),
            )
            .await?;

        self.event_bus = Some(context.event_bus.clone());
        self.subscription = Some(subscription);
        self.status = PluginStatus::Active;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down clipboard plugin");
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
        vec!["clipboard"]
    }
}

/// Copies event text, falling back once when the backend fails
pub struct ClipboardHandler {
    backend: Arc<dyn ClipboardBackend>,
    fallback: Arc<dyn FallbackCopier>,
    stats: Arc<CopyStats>,
}

impl ClipboardHandler {
    async fn copy(&self, text: &str) {
        match self.backend.write_text(text).await {
            Ok(()) => {
                self.stats.primary.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Copied {} chars to clipboard", text.chars().count());
            }
            Err(e) => {
                tracing::error!("Failed to copy to clipboard: {}", e);
                match self.fallback.copy(text) {
                    Ok(()) => {
                        self.stats.fallback.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!("Copied to clipboard through fallback");
                    }
                    Err(e) => {
                        self.stats.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::error!("Fallback clipboard copy failed: {}", e);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ClientEventHandler for ClipboardHandler {
    async fn handle_event(&self, event: &ClientEvent) -> Result<()> {
        if let ClientEvent::CopyToClipboard { text } = event {
            self.copy(text).await;
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "clipboard-handler"
    }
}

/// Clipboard-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Copy command failed: {0}")]
    CopyFailed(String),
}

impl From<ClipboardError> for MdeditError {
    fn from(err: ClipboardError) -> Self {
        MdeditError::Plugin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdedit_core::{ClientConfig, InMemoryEventBus, MemoryStore};

    struct BrokenFallback;

    impl FallbackCopier for BrokenFallback {
        fn copy(&self, _text: &str) -> std::result::Result<(), ClipboardError> {
            Err(ClipboardError::CopyFailed("no document body".to_string()))
        }
    }

    fn context() -> PluginContext {
        PluginContext::new(
            Arc::new(InMemoryEventBus::new()),
            Arc::new(ClientConfig::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn test_primary_copy() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let mut plugin = ClipboardPlugin::in_memory(clipboard.clone());
        let context = context();
        plugin.initialize(&context).await.unwrap();

        context
            .event_bus
            .publish(ClientEvent::copy_to_clipboard("https://pads/doc1"))
            .await
            .unwrap();

        assert_eq!(clipboard.contents(), Some("https://pads/doc1".to_string()));
        assert_eq!(
            plugin.stats().report(),
            CopyReport {
                primary: 1,
                fallback: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failure_falls_back_exactly_once() {
        let clipboard = Arc::new(MemoryClipboard::new());
        clipboard.set_unavailable(true);
        let mut plugin = ClipboardPlugin::in_memory(clipboard.clone());
        let context = context();
        plugin.initialize(&context).await.unwrap();

        context
            .event_bus
            .publish(ClientEvent::copy_to_clipboard("share link"))
            .await
            .unwrap();

        assert_eq!(clipboard.contents(), Some("share link".to_string()));
        assert_eq!(plugin.stats().report().fallback, 1);
        assert_eq!(plugin.stats().report().primary, 0);
    }

    #[tokio::test]
    async fn test_failing_fallback_is_not_surfaced() {
        let clipboard = Arc::new(MemoryClipboard::new());
        clipboard.set_unavailable(true);
        let mut plugin = ClipboardPlugin::new(clipboard.clone(), Arc::new(BrokenFallback));
        let context = context();
        plugin.initialize(&context).await.unwrap();

        let result = context
            .event_bus
            .publish(ClientEvent::copy_to_clipboard("text"))
            .await;

        assert!(result.is_ok());
        assert_eq!(clipboard.contents(), None);
        assert_eq!(plugin.stats().report().failed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_unsubscribes() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let mut plugin = ClipboardPlugin::in_memory(clipboard.clone());
        let context = context();
        plugin.initialize(&context).await.unwrap();
        plugin.shutdown().await.unwrap();

        context
            .event_bus
            .publish(ClientEvent::copy_to_clipboard("late"))
            .await
            .unwrap();
        assert_eq!(clipboard.contents(), None);
    }
}
