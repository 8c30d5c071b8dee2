//! One-shot, cancellable auto-dismiss timer for flash messages

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lifecycle of a dismiss timer; `Fired` and `Cancelled` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Scheduled,
    Fired,
    Cancelled,
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerState::Idle => write!(f, "idle"),
            TimerState::Scheduled => write!(f, "scheduled"),
            TimerState::Fired => write!(f, "fired"),
            TimerState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DismissTimerError {
    #[error("Dismiss timer is single-use, current state is {0}")]
    AlreadyUsed(TimerState),

    #[error("Dismiss timer needs a running tokio runtime")]
    NoRuntime,

    #[error("Flash hook is not mounted")]
    NotMounted,

    #[error("Flash element {0} already has a pending dismissal")]
    ElementBusy(String),
}

/// Single-use timer: `mount` arms it, `unmount` before the deadline disarms it.
///
/// The state transition out of `Scheduled` happens under one lock, so an
/// `unmount` that returns `true` guarantees the action never runs. Dropping a
/// scheduled timer cancels it.
pub struct DismissTimer {
    delay: Duration,
    state: Arc<Mutex<TimerState>>,
    task: Option<JoinHandle<()>>,
}

impl DismissTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(TimerState::Idle)),
            task: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> TimerState {
        *self.state.lock()
    }

    /// Arm the deadline; `action` runs once when it passes
    pub fn mount<F>(&mut self, action: F) -> Result<(), DismissTimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DismissTimerError::NoRuntime)?;

        {
            let mut state = self.state.lock();
            if *state != TimerState::Idle {
                return Err(DismissTimerError::AlreadyUsed(*state));
            }
            *state = TimerState::Scheduled;
        }

        let state = self.state.clone();
        let delay = self.delay;
        self.task = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut state = state.lock();
                if *state != TimerState::Scheduled {
                    return;
                }
                *state = TimerState::Fired;
            }

            tracing::debug!("Dismiss deadline of {:?} reached", delay);
            action();
        }));

        tracing::trace!("Dismiss timer armed for {:?}", self.delay);
        Ok(())
    }

    /// Disarm the timer. Returns `true` when a pending dismissal was cancelled.
    pub fn unmount(&mut self) -> bool {
        let cancelled = {
            let mut state = self.state.lock();
            match *state {
                TimerState::Scheduled => {
                    *state = TimerState::Cancelled;
                    true
                }
                TimerState::Idle => {
                    *state = TimerState::Cancelled;
                    false
                }
                TimerState::Fired | TimerState::Cancelled => false,
            }
        };

        if let Some(task) = self.task.take() {
            if cancelled {
                task.abort();
            }
        }

        if cancelled {
            tracing::trace!("Dismiss timer cancelled before deadline");
        }
        cancelled
    }
}

impl Drop for DismissTimer {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for DismissTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DismissTimer")
            .field("delay", &self.delay)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = fired.clone();
        (fired, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (fired, action) = counter();
        let mut timer = DismissTimer::new(Duration::from_millis(1000));
        timer.mount(action).unwrap();
        assert_eq!(timer.state(), TimerState::Scheduled);

        sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), TimerState::Fired);
        assert!(!timer.unmount());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_never_fires() {
        let (fired, action) = counter();
        let mut timer = DismissTimer::new(Duration::from_millis(1000));
        timer.mount(action).unwrap();

        sleep(Duration::from_millis(500)).await;
        assert!(timer.unmount());
        assert_eq!(timer.state(), TimerState::Cancelled);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (fired, action) = counter();
        {
            let mut timer = DismissTimer::new(Duration::from_millis(1000));
            timer.mount(action).unwrap();
        }

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_use() {
        let mut timer = DismissTimer::new(Duration::from_millis(10));
        timer.mount(|| {}).unwrap();
        assert_eq!(
            timer.mount(|| {}),
            Err(DismissTimerError::AlreadyUsed(TimerState::Scheduled))
        );

        timer.unmount();
        assert_eq!(
            timer.mount(|| {}),
            Err(DismissTimerError::AlreadyUsed(TimerState::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_unmount_before_mount() {
        let mut timer = DismissTimer::new(Duration::from_millis(10));
        assert!(!timer.unmount());
        assert_eq!(timer.state(), TimerState::Cancelled);
        assert!(timer.mount(|| {}).is_err());
    }

    #[test]
    fn test_mount_without_runtime() {
        let mut timer = DismissTimer::new(Duration::from_millis(10));
        assert_eq!(timer.mount(|| {}), Err(DismissTimerError::NoRuntime));
        assert_eq!(timer.state(), TimerState::Idle);
    }
}
