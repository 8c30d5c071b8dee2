//! Scripted client session: engine, hooks and a logging transport

use anyhow::{Context, Result};
use async_trait::async_trait;
use mdedit_admin_token::{AdminTokenPlugin, ReconnectParamBuilder, TokenVault};
use mdedit_clipboard::{ClipboardPlugin, CopyReport, CopyStats, MemoryClipboard};
use mdedit_core::{ClientConfig, ClientEngine, ConnectRequest, KeyValueStore, Transport};
use mdedit_editor::{
    ChangeListener, EditorBuffer, EditorHook, EditorSurface, KeyOutcome, SaveTrigger, SyncStats,
};
use mdedit_flash::{FlashBoard, FlashHook};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::script::ScriptStep;

/// One connect attempt as seen by the transport
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRecord {
    pub attempt: u32,
    pub endpoint: String,
    pub params: Vec<String>,
    pub admin_token: bool,
}

/// Transport that logs and records handshakes instead of opening sockets
#[derive(Default)]
pub struct LoggingTransport {
    records: Mutex<Vec<ConnectionRecord>>,
}

impl LoggingTransport {
    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn open(&self, request: &ConnectRequest) -> mdedit_core::Result<()> {
        tracing::info!(
            "Opening {} (attempt {}, long-poll fallback {:?}) with params {:?}",
            request.endpoint,
            request.attempt,
            request.long_poll_fallback,
            request.params
        );

        self.records.lock().push(ConnectionRecord {
            attempt: request.attempt,
            endpoint: request.endpoint.clone(),
            params: request.params.as_map().keys().cloned().collect(),
            admin_token: request.params.admin_token().is_some(),
        });
        Ok(())
    }

    async fn close(&self) -> mdedit_core::Result<()> {
        tracing::info!("Closing live connection");
        Ok(())
    }
}

#[derive(Default)]
struct SaveLog {
    saves: AtomicUsize,
}

impl SaveTrigger for SaveLog {
    fn trigger(&self, selector: &str) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Save triggered via {}", selector);
    }
}

#[derive(Default)]
struct ChangeCounter {
    changes: AtomicUsize,
}

impl ChangeListener for ChangeCounter {
    fn on_change(&self, buffer: &EditorBuffer) {
        self.changes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Buffer changed, {} chars", buffer.len());
    }
}

/// Final state of a session, printed as JSON
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub path: String,
    pub buffer: EditorBuffer,
    pub sync: SyncStats,
    pub connections: Vec<ConnectionRecord>,
    pub saves: usize,
    pub change_notifications: usize,
    pub clipboard: Option<String>,
    pub clipboard_copies: CopyReport,
    pub flash_pending: usize,
    pub flash_dismissed: Vec<String>,
    pub documents_with_tokens: Vec<String>,
}

/// Options for starting a session
pub struct SessionOptions {
    pub csrf_token: String,
    pub path: String,
    pub initial_content: String,
}

/// A running client session
pub struct Session {
    engine: ClientEngine,
    vault: TokenVault,
    editor: Arc<EditorSurface>,
    flash: Arc<FlashBoard>,
    clipboard: Arc<MemoryClipboard>,
    clipboard_stats: Arc<CopyStats>,
    transport: Arc<LoggingTransport>,
    saves: Arc<SaveLog>,
    changes: Arc<ChangeCounter>,
    dismissed: Arc<Mutex<Vec<String>>>,
}

impl Session {
    /// Build the engine, mount every hook and open the connection
    pub async fn start(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut engine = ClientEngine::new(config, storage.clone())?;
        engine.initialize().await?;

        let config = engine.config();
        let saves = Arc::new(SaveLog::default());
        let changes = Arc::new(ChangeCounter::default());

        let editor_hook = EditorHook::new(&config.editor, options.initial_content, saves.clone());
        let editor = editor_hook.surface();
        editor.add_change_listener(changes.clone());

        let flash_hook = FlashHook::new();
        let flash = flash_hook.board();

        let clipboard = Arc::new(MemoryClipboard::new());
        let clipboard_plugin = ClipboardPlugin::in_memory(clipboard.clone());
        let clipboard_stats = clipboard_plugin.stats();

        engine
            .register_plugin(Box::new(AdminTokenPlugin::new()))
            .await?;
        engine.register_plugin(Box::new(editor_hook)).await?;
        engine.register_plugin(Box::new(flash_hook)).await?;
        engine.register_plugin(Box::new(clipboard_plugin)).await?;

        let builder = ReconnectParamBuilder::from_config(storage, &config)?;
        let vault = builder.vault().clone();
        let transport = Arc::new(LoggingTransport::default());

        engine
            .connect(
                options.csrf_token,
                options.path,
                Arc::new(builder),
                transport.clone(),
            )
            .await
            .context("Failed to open the live connection")?;

        Ok(Self {
            engine,
            vault,
            editor,
            flash,
            clipboard,
            clipboard_stats,
            transport,
            saves,
            changes,
            dismissed: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Execute one script step
    pub async fn run_step(&mut self, step: &ScriptStep) -> Result<()> {
        tracing::debug!("Running step {:?}", step);

        match step {
            ScriptStep::Server { .. } => {
                if let Some(event) = step.client_event()? {
                    self.engine.publish(event).await?;
                }
            }
            ScriptStep::Key { .. } => {
                if let Some(event) = step.key_event()? {
                    let outcome = self.editor.key_down(&event)?;
                    if outcome != KeyOutcome::PassThrough {
                        tracing::debug!("Key {:?} handled as {:?}", event, outcome);
                    }
                }
            }
            ScriptStep::Input { text, selection } => {
                let selection = ScriptStep::input_selection(text, *selection);
                self.editor.input(text.clone(), selection)?;
            }
            ScriptStep::Select { start, end } => {
                self.editor.select(*start, *end)?;
            }
            ScriptStep::Navigate { path } => {
                let socket = self
                    .engine
                    .socket()
                    .context("No live socket to navigate")?;
                socket.navigate(path.clone());
            }
            ScriptStep::Reconnect => {
                self.engine.reconnect().await?;
            }
            ScriptStep::FlashMount { id } => {
                let dismissed = self.dismissed.clone();
                let element = id.clone();
                self.flash.mount(id, move || {
                    tracing::info!("Flash {} dismissed", element);
                    dismissed.lock().push(element);
                })?;
            }
            ScriptStep::FlashUnmount { id } => {
                if self.flash.unmount(id) {
                    tracing::info!("Flash {} removed before its dismissal", id);
                }
            }
            ScriptStep::SleepMs { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }

        Ok(())
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run_script(&mut self, steps: &[ScriptStep]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.run_step(step)
                .await
                .with_context(|| format!("Script step {} failed", index + 1))?;
        }
        Ok(())
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            path: self
                .engine
                .socket()
                .map(|socket| socket.current_path())
                .unwrap_or_default(),
            buffer: self.editor.snapshot(),
            sync: self.editor.stats(),
            connections: self.transport.records(),
            saves: self.saves.saves.load(Ordering::SeqCst),
            change_notifications: self.changes.changes.load(Ordering::SeqCst),
            clipboard: self.clipboard.contents(),
            clipboard_copies: self.clipboard_stats.report(),
            flash_pending: self.flash.pending(),
            flash_dismissed: self.dismissed.lock().clone(),
            documents_with_tokens: self.vault.documents(),
        }
    }

    /// Disconnect and unmount every hook
    pub async fn shutdown(mut self) -> Result<()> {
        self.engine.shutdown().await?;
        Ok(())
    }
}
