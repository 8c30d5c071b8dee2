//! Editor hook for mdedit: snapshot reconciliation and key bindings
//!
//! The hook mounts an [`EditorSurface`] holding the buffer. Inbound
//! `sync_content` snapshots reach it through the event bus; key presses and
//! typing reach it through the surface methods.

use async_trait::async_trait;
use mdedit_core::{
    ClientEvent, ClientEventHandler, EditorConfig, EventBus, EventKind, KindFilter, MdeditError,
    Plugin, PluginContext, PluginStatus, Result, SubscriptionId,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod editor_state;
pub mod keyboard_shortcuts;
pub mod text_sync;

pub use editor_state::{EditorBuffer, Selection};
pub use keyboard_shortcuts::{Key, KeyCommandRouter, KeyEvent, KeyOutcome, Modifiers};
pub use text_sync::{ReconcileOutcome, SyncStats, TextSyncEngine};

/// Outbound save action, addressed by selector
pub trait SaveTrigger: Send + Sync {
    fn trigger(&self, selector: &str);
}

/// Observer of buffer mutations made on the surface (typing, tab insertion)
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, buffer: &EditorBuffer);
}

/// The mounted editing surface
pub struct EditorSurface {
    engine: Mutex<TextSyncEngine>,
    router: KeyCommandRouter,
    save_trigger: Arc<dyn SaveTrigger>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    mounted: AtomicBool,
}

impl EditorSurface {
    pub fn new(
        config: &EditorConfig,
        initial: impl Into<String>,
        save_trigger: Arc<dyn SaveTrigger>,
    ) -> Self {
        Self {
            engine: Mutex::new(TextSyncEngine::new(initial)),
            router: KeyCommandRouter::new(config),
            save_trigger,
            listeners: RwLock::new(Vec::new()),
            mounted: AtomicBool::new(false),
        }
    }

    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Handle a key-down event
    pub fn key_down(&self, event: &KeyEvent) -> std::result::Result<KeyOutcome, EditorError> {
        self.ensure_mounted()?;

        let (outcome, snapshot) = {
            let mut engine = self.engine.lock();
            let outcome = self.router.route(event, engine.buffer_mut());
            if let KeyOutcome::InsertedTab { .. } = outcome {
                engine.record_local_edit();
                (outcome, Some(engine.buffer().clone()))
            } else {
                (outcome, None)
            }
        };

        match outcome {
            KeyOutcome::Save => self.save_trigger.trigger(self.router.save_selector()),
            KeyOutcome::InsertedTab { .. } => {
                if let Some(buffer) = snapshot {
                    self.notify(&buffer);
                }
            }
            KeyOutcome::PassThrough => {}
        }

        Ok(outcome)
    }

    /// Apply text typed by the user
    pub fn input(
        &self,
        text: impl Into<String>,
        selection: Selection,
    ) -> std::result::Result<(), EditorError> {
        self.ensure_mounted()?;

        let snapshot = {
            let mut engine = self.engine.lock();
            engine.apply_local_edit(text, selection);
            engine.buffer().clone()
        };
        self.notify(&snapshot);
        Ok(())
    }

    /// Move the selection without editing
    pub fn select(&self, start: usize, end: usize) -> std::result::Result<(), EditorError> {
        self.ensure_mounted()?;
        self.engine.lock().buffer_mut().set_selection(start, end);
        Ok(())
    }

    /// Apply an authoritative snapshot
    pub fn reconcile(&self, content: &str) -> std::result::Result<ReconcileOutcome, EditorError> {
        self.ensure_mounted()?;
        Ok(self.engine.lock().reconcile(content))
    }

    /// Copy of the current buffer
    pub fn snapshot(&self) -> EditorBuffer {
        self.engine.lock().buffer().clone()
    }

    pub fn stats(&self) -> SyncStats {
        self.engine.lock().stats()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    // Swaps in a fresh buffer, dropping the previous one with its stats.
    fn reset(&self, content: &str) {
        *self.engine.lock() = TextSyncEngine::new(content);
    }

    fn ensure_mounted(&self) -> std::result::Result<(), EditorError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(EditorError::NotMounted)
        }
    }

    // Listeners run without the buffer lock held.
    fn notify(&self, buffer: &EditorBuffer) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_change(buffer);
        }
    }
}

/// Plugin mounting one editing surface
pub struct EditorHook {
    name: String,
    version: String,
    status: PluginStatus,
    initial: String,
    surface: Arc<EditorSurface>,
    event_bus: Option<Arc<dyn EventBus>>,
    subscription: Option<SubscriptionId>,
}

impl EditorHook {
    pub fn new(
        config: &EditorConfig,
        initial: impl Into<String>,
        save_trigger: Arc<dyn SaveTrigger>,
    ) -> Self {
        let initial = initial.into();
        Self {
            name: "editor".to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
            surface: Arc::new(EditorSurface::new(config, initial.clone(), save_trigger)),
            initial,
            event_bus: None,
            subscription: None,
        }
    }

    /// Shared handle to the surface, usable after the hook is registered
    pub fn surface(&self) -> Arc<EditorSurface> {
        self.surface.clone()
    }
}

#[async_trait]
impl Plugin for EditorHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Initializing editor hook");

        if self.surface.mounted.swap(true, Ordering::SeqCst) {
            return Err(EditorError::AlreadyMounted.into());
        }
        self.surface.reset(&self.initial);

        let handler = Arc::new(EditorSyncHandler {
            surface: self.surface.clone(),
        });
        let subscription = context
            .event_bus
            .subscribe(handler, Some(Box::new(KindFilter::only(EventKind::SyncContent))))
            .await;

        let subscription = match subscription {
            Ok(id) => id,
            Err(e) => {
                self.surface.mounted.store(false, Ordering::SeqCst);
                self.status = PluginStatus::Error(e.to_string());
                return Err(e);
            }
        };

        self.event_bus = Some(context.event_bus.clone());
        self.subscription = Some(subscription);
        self.status = PluginStatus::Active;

        tracing::info!("Editor hook mounted");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down editor hook");
        self.status = PluginStatus::Shutting;

        if let (Some(bus), Some(id)) = (self.event_bus.take(), self.subscription.take()) {
            bus.unsubscribe(id).await?;
        }
        self.surface.mounted.store(false, Ordering::SeqCst);
        self.surface.listeners.write().clear();
        self.surface.reset("");

        self.status = PluginStatus::Stopped;
        tracing::info!("Editor hook unmounted");
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_services(&self) -> Vec<&str> {
        vec!["editor", "text-sync", "key-commands"]
    }
}

/// Feeds `sync_content` snapshots into the surface
pub struct EditorSyncHandler {
    surface: Arc<EditorSurface>,
}

#[async_trait]
impl ClientEventHandler for EditorSyncHandler {
    async fn handle_event(&self, event: &ClientEvent) -> Result<()> {
        if let ClientEvent::SyncContent { content } = event {
            let outcome = self.surface.reconcile(content)?;
            tracing::debug!("Editor reconciled snapshot: {:?}", outcome);
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "editor-sync-handler"
    }
}

/// Editor-specific errors
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Editor surface is not mounted")]
    NotMounted,

    #[error("Editor surface is already mounted")]
    AlreadyMounted,

    #[error("Invalid key chord: {0}")]
    InvalidKeyChord(String),
}

impl From<EditorError> for MdeditError {
    fn from(err: EditorError) -> Self {
        MdeditError::Plugin(err.to_string())
    }
}
