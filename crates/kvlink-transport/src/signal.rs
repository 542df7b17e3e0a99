use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// Reasons a [`CompletionSignal::wait`] returns without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// `wait` was called without a preceding `reset`.
    #[error("completion signal is not armed")]
    NotArmed,

    /// The armed signal was cancelled before it was released.
    #[error("completion signal cancelled")]
    Cancelled,
}

/// One-shot, single-waiter bridge from an I/O completion to a blocked caller.
///
/// Each cycle is `reset` → (completion calls `release`) → `wait`. Only one
/// thread may wait per cycle and only the first `release` is delivered.
pub struct CompletionSignal<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
    receiver: Mutex<Option<oneshot::Receiver<T>>>,
}

impl<T> CompletionSignal<T> {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            receiver: Mutex::new(None),
        }
    }

    /// Arm the signal for a new cycle, discarding any previous one.
    pub fn reset(&self) {
        let (tx, rx) = oneshot::channel();
        *lock(&self.sender) = Some(tx);
        *lock(&self.receiver) = Some(rx);
    }

    /// Deliver `value` to the waiter.
    ///
    /// Returns `false` if the signal was already released, cancelled, or never armed.
    pub fn release(&self, value: T) -> bool {
        match lock(&self.sender).take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Wake the waiter with [`SignalError::Cancelled`].
    pub fn cancel(&self) {
        lock(&self.sender).take();
    }

    /// Whether a release is still pending for the current cycle.
    pub fn is_armed(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Block the current thread until the signal is released or cancelled.
    ///
    /// Must not be called from inside an async execution context.
    pub fn wait(&self) -> Result<T, SignalError> {
        let rx = lock(&self.receiver).take().ok_or(SignalError::NotArmed)?;
        rx.blocking_recv().map_err(|_| SignalError::Cancelled)
    }
}

impl<T> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CompletionSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("armed", &self.is_armed())
            .finish()
    }
}

fn lock<S>(slot: &Mutex<S>) -> MutexGuard<'_, S> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
