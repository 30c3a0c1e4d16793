use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// An adjustment run is in progress.
    Busy,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "an adjustment run is in progress"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Default)]
struct Flags {
    busy: AtomicBool,
    cancel: AtomicBool,
}

/// Shared context owning the busy and cancel flags of an adjustment session.
///
/// Cloning yields another handle to the same flags.
#[derive(Debug, Clone, Default)]
pub struct OptimizationSession {
    flags: Arc<Flags>,
}

impl OptimizationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.flags.busy.load(Ordering::Acquire)
    }

    /// Mark a run as started. The flag clears when the guard drops.
    pub fn begin(&self) -> Result<RunGuard, SessionError> {
        if self
            .flags
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        self.flags.cancel.store(false, Ordering::Release);
        Ok(RunGuard {
            flags: Arc::clone(&self.flags),
        })
    }

    /// Run a structural re-parse or reload, refusing while a run is active.
    pub fn reparse<T>(&self, f: impl FnOnce() -> T) -> Result<T, SessionError> {
        if self.is_busy() {
            log::warn!("re-parse refused: adjustment in progress");
            return Err(SessionError::Busy);
        }
        Ok(f())
    }

    /// Ask the active run to stop at its next outer iteration.
    pub fn request_cancel(&self) {
        self.flags.cancel.store(true, Ordering::Release);
    }

    pub fn cancel_requested(&self) -> bool {
        self.flags.cancel.load(Ordering::Acquire)
    }
}

/// Holds the session busy for the lifetime of a run.
#[derive(Debug)]
pub struct RunGuard {
    flags: Arc<Flags>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flags.cancel.store(false, Ordering::Release);
        self.flags.busy.store(false, Ordering::Release);
    }
}
