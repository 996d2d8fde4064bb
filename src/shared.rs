//! Lock-guarded ledger handle for hosts that call in from several threads.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::EventSink;
use crate::ledger::Ledger;
use crate::store::StateStore;

/// Cloneable handle; each [`SharedLedger::with`] call holds the lock for the
/// whole operation (validation, commit and event emission), so callers only
/// ever observe fully committed states.
pub struct SharedLedger<S, E> {
    inner: Arc<Mutex<Ledger<S, E>>>,
}

impl<S, E> Clone for SharedLedger<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateStore, E: EventSink> SharedLedger<S, E> {
    pub fn new(ledger: Ledger<S, E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger<S, E>) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Returns the ledger when this is the last handle.
    pub fn try_unwrap(self) -> Result<Ledger<S, E>, Self> {
        Arc::try_unwrap(self.inner)
            .map(|mutex| mutex.into_inner())
            .map_err(|inner| Self { inner })
    }
}
