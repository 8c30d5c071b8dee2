//! Flash hook for mdedit: auto-dismiss of flash messages

use async_trait::async_trait;
use mdedit_core::{MdeditError, Plugin, PluginContext, PluginStatus, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub mod dismiss_timer;

pub use dismiss_timer::{DismissTimer, DismissTimerError, TimerState};

/// Dismiss timers of the flash elements currently on the page, by element id
pub struct FlashBoard {
    delay: RwLock<Duration>,
    timers: Mutex<HashMap<String, DismissTimer>>,
    mounted: AtomicBool,
}

impl FlashBoard {
    fn new(delay: Duration) -> Self {
        Self {
            delay: RwLock::new(delay),
            timers: Mutex::new(HashMap::new()),
            mounted: AtomicBool::new(false),
        }
    }

    pub fn delay(&self) -> Duration {
        *self.delay.read()
    }

    /// Arm the dismiss timer of a newly mounted flash element.
    ///
    /// An id whose previous timer already fired or was cancelled belongs to a
    /// new element and gets a fresh timer. Finished timers of other elements
    /// are dropped here as well.
    pub fn mount<F>(
        &self,
        element_id: &str,
        dismiss: F,
    ) -> std::result::Result<(), DismissTimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.mounted.load(Ordering::SeqCst) {
            return Err(DismissTimerError::NotMounted);
        }

        let mut timers = self.timers.lock();
        timers.retain(|_, timer| timer.state() == TimerState::Scheduled);
        if timers.contains_key(element_id) {
            return Err(DismissTimerError::ElementBusy(element_id.to_string()));
        }

        let mut timer = DismissTimer::new(self.delay());
        timer.mount(dismiss)?;
        timers.insert(element_id.to_string(), timer);

        tracing::debug!("Flash {} will dismiss in {:?}", element_id, self.delay());
        Ok(())
    }

    /// Element removed from the page; returns `true` if its dismissal was
    /// still pending and has been cancelled
    pub fn unmount(&self, element_id: &str) -> bool {
        let timer = self.timers.lock().remove(element_id);
        match timer {
            Some(mut timer) => timer.unmount(),
            None => {
                tracing::trace!("Unmount of unknown flash element {}", element_id);
                false
            }
        }
    }

    pub fn state(&self, element_id: &str) -> Option<TimerState> {
        self.timers.lock().get(element_id).map(DismissTimer::state)
    }

    /// Number of flash elements still waiting for their deadline
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .values()
            .filter(|timer| timer.state() == TimerState::Scheduled)
            .count()
    }

    fn cancel_all(&self) -> usize {
        let timers: Vec<DismissTimer> = self.timers.lock().drain().map(|(_, t)| t).collect();
        timers
            .into_iter()
            .map(|mut timer| timer.unmount())
            .filter(|cancelled| *cancelled)
            .count()
    }
}

/// Plugin owning the flash dismiss timers
pub struct FlashHook {
    name: String,
    version: String,
    status: PluginStatus,
    board: Arc<FlashBoard>,
}

impl FlashHook {
    pub fn new() -> Self {
        Self {
            name: "flash".to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
            board: Arc::new(FlashBoard::new(Duration::from_millis(1000))),
        }
    }

    /// Shared handle to the timers, usable after the hook is registered
    pub fn board(&self) -> Arc<FlashBoard> {
        self.board.clone()
    }
}

impl Default for FlashHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for FlashHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Initializing flash hook");

        if self.board.mounted.swap(true, Ordering::SeqCst) {
            return Err(MdeditError::plugin("Flash hook is already mounted"));
        }
        *self.board.delay.write() = context.config.flash.dismiss_delay();

        self.status = PluginStatus::Active;
        tracing::info!(
            "Flash hook mounted with dismiss delay {:?}",
            self.board.delay()
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down flash hook");
        self.status = PluginStatus::Shutting;

        self.board.mounted.store(false, Ordering::SeqCst);
        let cancelled = self.board.cancel_all();
        if cancelled > 0 {
            tracing::debug!("Cancelled {} pending flash dismissals", cancelled);
        }

        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_services(&self) -> Vec<&str> {
        vec!["flash-dismiss"]
    }
}

impl From<DismissTimerError> for MdeditError {
    fn from(err: DismissTimerError) -> Self {
        MdeditError::Plugin(err.to_string())
    }
}
