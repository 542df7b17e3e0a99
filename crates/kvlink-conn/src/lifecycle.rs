use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Open,
    ShuttingDown,
    Disposed,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::ShuttingDown,
            _ => Self::Disposed,
        }
    }
}

/// Atomic lifecycle shared between a connection and its completions.
#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Open as u8))
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Open → ShuttingDown`. Exactly one caller ever gets `true`.
    pub fn begin_shutdown(&self) -> bool {
        self.0
            .compare_exchange(
                LifecycleState::Open as u8,
                LifecycleState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn finish(&self) {
        self.0
            .store(LifecycleState::Disposed as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == LifecycleState::Open
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
