//! At most one outstanding call per trigger.
//!
//! The presentation layer disables a control while its call is pending;
//! this is the same rule enforced where the call is made. A second trigger
//! while the first is outstanding is refused without touching the network.

use std::sync::{Mutex, MutexGuard, TryLockError};

use super::WorkflowError;

pub struct InFlight {
    action: &'static str,
    lock: Mutex<()>,
}

/// Held for the duration of one call. Dropping it re-enables the trigger.
pub struct InFlightGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl InFlight {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            lock: Mutex::new(()),
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Claim the trigger without blocking.
    pub fn try_begin(&self) -> Result<InFlightGuard<'_>, WorkflowError> {
        match self.lock.try_lock() {
            Ok(guard) => Ok(InFlightGuard { _guard: guard }),
            // A panicked call leaves nothing half-written on our side.
            Err(TryLockError::Poisoned(poisoned)) => Ok(InFlightGuard {
                _guard: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!(action = self.action, "Trigger ignored, call already in flight");
                Err(WorkflowError::Busy(self.action))
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.lock.try_lock(), Err(TryLockError::WouldBlock))
    }
}
