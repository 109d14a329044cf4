//! store/shared: one document-wide lock around a TextStore.
//!
//! Every operation (reads included, they move the position cache and page pools)
//! runs under the same Mutex, so the chain, cache, spares and scratch table are never
//! observed half-updated. The swap worker does not take this lock; its result is
//! applied by whichever caller next holds it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::swap::SwapState;

use super::core::{StoreStats, TextStore};
use super::reconcile::ReconcileSummary;

#[derive(Clone)]
pub struct SharedTextStore {
    inner: Arc<Mutex<TextStore>>,
}

impl SharedTextStore {
    pub fn new(store: TextStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TextStore> {
        // A panic under the lock is a precondition failure; the chain is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut TextStore) -> R) -> R {
        let mut g = self.lock();
        f(&mut *g)
    }

    pub fn get(&self, offset: usize) -> Option<char> {
        self.lock().get(offset)
    }

    pub fn get_range(&self, offset: usize, len: usize) -> String {
        self.lock().get_range(offset, len)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn set(&self, text: &str) {
        self.lock().set(text)
    }

    pub fn replace(&self, offset: usize, len: usize, text: &str) {
        self.lock().replace(offset, len, text)
    }

    pub fn reconcile(&self) -> ReconcileSummary {
        self.lock().reconcile()
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats()
    }

    pub fn swap_state(&self) -> Option<SwapState> {
        let mut g = self.lock();
        g.poll_swap();
        g.swap_state()
    }

    /// Wait for the in-flight swap without holding the lock while the worker copies.
    pub fn wait_for_swap(&self) -> Option<SwapState> {
        loop {
            {
                let mut g = self.lock();
                g.poll_swap();
                if !g.swap_pending() {
                    return g.swap_state();
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
