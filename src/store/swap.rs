//! store/swap: store side of the background swap.
//!
//! The store never shares its chain with the worker. It polls the outcome channel at
//! the start of every public operation (and in wait_for_swap) and applies a completed
//! copy itself: every chain run on the source snapshot rider is repointed to the new
//! file rider with unchanged offsets, then the snapshot rider is dropped.

use log::{info, warn};
use std::sync::Arc;

use crate::metrics::{record_swap_completed, record_swap_failed, record_swap_scheduled};
use crate::rider::{FileRider, Rider, RiderId};
use crate::swap::{SwapHandle, SwapJob, SwapOutcome, SwapState};

use super::core::TextStore;

pub(crate) struct PendingSwap {
    pub(crate) handle: SwapHandle,
    /// Snapshot rider the job copies from.
    pub(crate) source: RiderId,
    pub(crate) snapshot: Arc<[char]>,
}

impl TextStore {
    pub(crate) fn schedule_swap(&mut self, source: RiderId, snapshot: Arc<[char]>) {
        match SwapJob::spawn(snapshot.clone(), &self.cfg) {
            Ok(handle) => {
                record_swap_scheduled();
                info!("swap: scheduled for {} chars", snapshot.len());
                self.swap = Some(PendingSwap {
                    handle,
                    source,
                    snapshot,
                });
                self.last_swap = None;
            }
            Err(e) => {
                record_swap_failed();
                warn!("swap: could not start, staying in memory: {:#}", e);
                self.last_swap = Some(SwapState::Failed);
            }
        }
    }

    /// Apply the swap result if the worker has reported. Never blocks.
    pub fn poll_swap(&mut self) {
        let outcome = match &self.swap {
            Some(p) => p.handle.try_outcome(),
            None => None,
        };
        if let Some(o) = outcome {
            if let Some(p) = self.swap.take() {
                self.apply_swap(p, o);
            }
        }
    }

    /// Block until the in-flight swap (if any) ends and apply it. Returns the final state.
    pub fn wait_for_swap(&mut self) -> Option<SwapState> {
        if let Some(p) = self.swap.take() {
            let o = p.handle.wait();
            self.apply_swap(p, o);
        }
        self.last_swap
    }

    /// Stop the in-flight swap. The document is unaffected.
    pub fn cancel_swap(&mut self) {
        if let Some(p) = self.swap.take() {
            p.handle.cancel();
            self.last_swap = Some(SwapState::Cancelled);
            info!("swap: cancelled by the store");
        }
    }

    /// State of the current or most recent swap.
    pub fn swap_state(&self) -> Option<SwapState> {
        match &self.swap {
            Some(p) => Some(p.handle.state()),
            None => self.last_swap,
        }
    }

    /// Chars copied by the in-flight swap.
    pub fn swap_progress(&self) -> Option<u64> {
        self.swap.as_ref().map(|p| p.handle.progress())
    }

    pub fn swap_pending(&self) -> bool {
        self.swap.is_some()
    }

    /// The snapshot, if a swap is pending and the chain is still exactly that snapshot.
    pub(crate) fn untouched_snapshot(&self) -> Option<Arc<[char]>> {
        let p = self.swap.as_ref()?;
        let head = self.head?;
        if self.tail != Some(head) {
            return None;
        }
        let run = self.runs.get(head);
        if run.rider == p.source && run.offset == 0 && run.len == p.snapshot.len() {
            Some(p.snapshot.clone())
        } else {
            None
        }
    }

    fn apply_swap(&mut self, p: PendingSwap, outcome: SwapOutcome) {
        match outcome {
            SwapOutcome::Completed(file) => {
                if self.riders.get(p.source).is_none() {
                    // Source already gone (set/reconcile raced the worker); nothing to repoint.
                    drop(file);
                } else {
                    let target = self.riders.insert(Rider::File(FileRider::new(file)));
                    let mut repointed = 0usize;
                    let mut cur = self.head;
                    while let Some(id) = cur {
                        let r = self.runs.get_mut(id);
                        if r.rider == p.source {
                            r.rider = target;
                            repointed += 1;
                        }
                        cur = r.next;
                    }
                    self.riders.remove(p.source);
                    if repointed == 0 {
                        self.riders.remove(target);
                    }
                    info!("swap: completed, {} run(s) now on disk", repointed);
                }
                p.handle.mark_completed();
                record_swap_completed();
                self.last_swap = Some(SwapState::Completed);
            }
            SwapOutcome::Cancelled => {
                self.last_swap = Some(SwapState::Cancelled);
            }
            SwapOutcome::Failed(msg) => {
                warn!("swap: ended without migrating: {}", msg);
                self.last_swap = Some(SwapState::Failed);
            }
        }
    }
}
