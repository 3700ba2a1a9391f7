use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared cooperative cancellation signal.
///
/// Cloning yields another handle to the same signal. Cancellation is sticky and idempotent.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `dur` unless cancelled first. Returns `true` when cancelled.
    pub fn sleep(&self, dur: Duration) -> bool {
        if dur.is_zero() {
            return self.is_cancelled();
        }
        let guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (_guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, dur, |_| !self.is_cancelled())
            .unwrap_or_else(|e| e.into_inner());
        self.is_cancelled()
    }
}

/// Shutdown lifecycle of one pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    /// Producing normally.
    Running,
    /// Input ended or cancellation observed; finishing in-flight work.
    Draining,
    /// Output queue closed. Terminal.
    Closed,
}

/// Observable state of a stage, shared between the stage thread and the coordinator.
///
/// Transitions only move forward: `Running -> Draining -> Closed`.
#[derive(Clone, Debug)]
pub struct StageStatus {
    state: Arc<AtomicU8>,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(0)),
        }
    }
}

impl StageStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StageState {
        match self.state.load(Ordering::SeqCst) {
            0 => StageState::Running,
            1 => StageState::Draining,
            _ => StageState::Closed,
        }
    }

    pub fn advance(&self, to: StageState) {
        let v = match to {
            StageState::Running => 0,
            StageState::Draining => 1,
            StageState::Closed => 2,
        };
        self.state.fetch_max(v, Ordering::SeqCst);
    }
}
