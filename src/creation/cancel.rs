use crate::core::{DbError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Level, event};

/// Cancellation request for running operations, settable from any task.
///
/// A request made while one or more creation loops hold the flag is
/// deferred to those loops and never leaks into an operation that starts
/// later. A request made while nothing holds the flag stays pending until
/// the next `check` or `hold` consumes it.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    state: Arc<Mutex<CancelState>>,
}

#[derive(Debug, Default)]
struct CancelState {
    pending: bool,
    /// Active holds and whether a request was deferred to each.
    holds: HashMap<u64, bool>,
    next_hold_id: u64,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CancelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_cancel(&self) {
        let mut state = self.state();
        if state.holds.is_empty() {
            state.pending = true;
        } else {
            for deferred in state.holds.values_mut() {
                *deferred = true;
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        let state = self.state();
        state.pending || state.holds.values().any(|deferred| *deferred)
    }

    /// Honors a pending request outside a critical section.
    ///
    /// Consumes the request and fails with `Cancelled`.
    pub fn check(&self) -> Result<()> {
        let mut state = self.state();
        if std::mem::take(&mut state.pending) {
            return Err(DbError::Cancelled);
        }
        Ok(())
    }

    /// Enters a critical section in which cancel requests are deferred.
    ///
    /// A request still pending at entry is honored instead.
    pub fn hold(&self) -> Result<CancelHoldGuard> {
        let mut state = self.state();
        if std::mem::take(&mut state.pending) {
            return Err(DbError::Cancelled);
        }
        let hold_id = state.next_hold_id;
        state.next_hold_id += 1;
        state.holds.insert(hold_id, false);
        Ok(CancelHoldGuard {
            flag: self.clone(),
            hold_id,
            released: false,
        })
    }

    fn leave(&self, hold_id: u64) -> bool {
        let ignored = self.state().holds.remove(&hold_id).unwrap_or(false);
        if ignored {
            event!(
                Level::WARN,
                "cancel requests are ignored during shard creation"
            );
        }
        ignored
    }
}

/// Critical section around a shard creation loop.
///
/// Requests made while the guard lives are not acted upon. Leaving the
/// section, by `release` or by drop on an error path, reports a request
/// deferred to this guard as a warning and clears it.
#[derive(Debug)]
pub struct CancelHoldGuard {
    flag: CancellationFlag,
    hold_id: u64,
    released: bool,
}

impl CancelHoldGuard {
    /// Leaves the section. Returns true if a cancel request was ignored.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.flag.leave(self.hold_id)
    }
}

impl Drop for CancelHoldGuard {
    fn drop(&mut self) {
        if !self.released {
            self.flag.leave(self.hold_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_consumes_request() {
        let flag = CancellationFlag::new();
        assert!(flag.check().is_ok());
        flag.request_cancel();
        assert!(matches!(flag.check(), Err(DbError::Cancelled)));
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_requests_are_deferred_inside_hold() {
        let flag = CancellationFlag::new();
        let hold = flag.hold().unwrap();
        flag.request_cancel();
        assert!(flag.is_pending());
        assert!(hold.release());
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_release_without_request() {
        let flag = CancellationFlag::new();
        assert!(!flag.hold().unwrap().release());
    }

    #[test]
    fn test_drop_clears_deferred_request() {
        let flag = CancellationFlag::new();
        {
            let _hold = flag.hold().unwrap();
            flag.request_cancel();
        }
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_hold_honors_request_pending_at_entry() {
        let flag = CancellationFlag::new();
        flag.request_cancel();
        assert!(matches!(flag.hold(), Err(DbError::Cancelled)));
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_deferred_request_does_not_reach_later_operation() {
        let flag = CancellationFlag::new();
        let first = flag.hold().unwrap();
        flag.request_cancel();

        // An operation starting now must not see the deferred request.
        assert!(flag.check().is_ok());
        let second = flag.hold().unwrap();
        assert!(!second.release());

        assert!(first.release());
        assert!(!flag.is_pending());
    }

    #[test]
    fn test_request_reaches_every_active_hold() {
        let flag = CancellationFlag::new();
        let first = flag.hold().unwrap();
        let second = flag.hold().unwrap();
        flag.request_cancel();
        assert!(first.release());
        assert!(second.release());
        assert!(flag.check().is_ok());
    }
}
