//! swap: background migration of a large in-memory document to a scratch file.
//!
//! State machine: Created → Running → {Completed, Cancelled, Failed}.
//!
//! The worker thread only reads the immutable snapshot and writes a private scratch
//! file; it never touches the store. The finished file travels back over an mpsc
//! channel and the store performs the rider substitution itself (and only then is the
//! job marked Completed). Cancellation is a flag polled between chunks; a cancelled
//! or failed job disposes its file and leaves the document untouched.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::consts::{SWAP_DELAY_POLL_MS, SWAP_THREAD_NAME};
use crate::metrics::{record_swap_cancelled, record_swap_chars, record_swap_failed};
use crate::scratch::ScratchFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SwapState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl SwapState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SwapState::Created,
            1 => SwapState::Running,
            2 => SwapState::Completed,
            3 => SwapState::Cancelled,
            _ => SwapState::Failed,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SwapState::Completed | SwapState::Cancelled | SwapState::Failed
        )
    }
}

/// What the worker hands back.
#[derive(Debug)]
pub enum SwapOutcome {
    /// Copy finished; the file mirrors the snapshot offset for offset.
    Completed(ScratchFile),
    Cancelled,
    Failed(String),
}

struct SwapShared {
    cancel: AtomicBool,
    state: AtomicU8,
    progress: AtomicU64,
}

impl SwapShared {
    fn set_state(&self, s: SwapState) {
        self.state.store(s as u8, Ordering::Release);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Worker side of a swap.
pub struct SwapJob {
    snapshot: Arc<[char]>,
    dir: PathBuf,
    pages: usize,
    page_chars: usize,
    chunk: usize,
    delay: Duration,
    shared: Arc<SwapShared>,
}

impl SwapJob {
    /// Start copying `snapshot` to a new scratch file on a background thread.
    pub fn spawn(snapshot: Arc<[char]>, cfg: &StoreConfig) -> Result<SwapHandle> {
        let shared = Arc::new(SwapShared {
            cancel: AtomicBool::new(false),
            state: AtomicU8::new(SwapState::Created as u8),
            progress: AtomicU64::new(0),
        });
        let job = SwapJob {
            snapshot,
            dir: cfg.scratch_dir(),
            pages: cfg.page_pool,
            page_chars: cfg.page_chars,
            chunk: cfg.swap_chunk_chars.max(1),
            delay: Duration::from_millis(cfg.swap_delay_ms),
            shared: shared.clone(),
        };
        let total = job.snapshot.len();
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name(SWAP_THREAD_NAME.to_string())
            .spawn(move || job.run(tx))
            .context("spawn swap worker")?;

        debug!("swap: scheduled for {} chars", total);
        Ok(SwapHandle {
            shared,
            rx,
            total: total as u64,
        })
    }

    fn run(self, tx: Sender<SwapOutcome>) {
        let outcome = self.copy();
        match &outcome {
            SwapOutcome::Completed(f) => {
                debug!("swap: copied {} chars to {}", f.len(), f.path().display())
            }
            SwapOutcome::Cancelled => {
                self.shared.set_state(SwapState::Cancelled);
                record_swap_cancelled();
                info!("swap: cancelled");
            }
            SwapOutcome::Failed(msg) => {
                self.shared.set_state(SwapState::Failed);
                record_swap_failed();
                warn!("swap: failed: {}", msg);
            }
        }
        // Receiver gone = store moved on; the file is disposed on drop.
        let _ = tx.send(outcome);
    }

    fn copy(&self) -> SwapOutcome {
        // Short delay before starting, cancellable.
        let step = Duration::from_millis(SWAP_DELAY_POLL_MS);
        let mut waited = Duration::ZERO;
        while waited < self.delay {
            if self.shared.cancelled() {
                return SwapOutcome::Cancelled;
            }
            let nap = step.min(self.delay - waited);
            std::thread::sleep(nap);
            waited += nap;
        }
        if self.shared.cancelled() {
            return SwapOutcome::Cancelled;
        }

        self.shared.set_state(SwapState::Running);
        let mut file = match ScratchFile::create(&self.dir, self.pages, self.page_chars) {
            Ok(f) => f,
            Err(e) => return SwapOutcome::Failed(format!("{:#}", e)),
        };

        for chunk in self.snapshot.chunks(self.chunk) {
            if self.shared.cancelled() {
                file.dispose();
                return SwapOutcome::Cancelled;
            }
            if let Err(e) = file.append(chunk) {
                file.dispose();
                return SwapOutcome::Failed(format!("{:#}", e));
            }
            self.shared
                .progress
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
            record_swap_chars(chunk.len());
        }

        if let Err(e) = file.flush() {
            file.dispose();
            return SwapOutcome::Failed(format!("{:#}", e));
        }
        SwapOutcome::Completed(file)
    }
}

/// Store side of a swap: cancellation token, progress, and the outcome channel.
/// Dropping the handle cancels the job without waiting for it.
pub struct SwapHandle {
    shared: Arc<SwapShared>,
    rx: Receiver<SwapOutcome>,
    total: u64,
}

impl SwapHandle {
    pub fn state(&self) -> SwapState {
        SwapState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Chars copied so far.
    pub fn progress(&self) -> u64 {
        self.shared.progress.load(Ordering::Relaxed)
    }

    /// Chars to copy in total.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Non-blocking check for the worker's result.
    pub fn try_outcome(&self) -> Option<SwapOutcome> {
        match self.rx.try_recv() {
            Ok(o) => Some(o),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.shared.set_state(SwapState::Failed);
                record_swap_failed();
                Some(SwapOutcome::Failed("swap worker exited without a result".into()))
            }
        }
    }

    /// Block until the worker reports.
    pub fn wait(&self) -> SwapOutcome {
        match self.rx.recv() {
            Ok(o) => o,
            Err(_) => {
                self.shared.set_state(SwapState::Failed);
                record_swap_failed();
                SwapOutcome::Failed("swap worker exited without a result".into())
            }
        }
    }

    /// Called by the store once the substitution has been applied.
    pub(crate) fn mark_completed(&self) {
        self.shared.set_state(SwapState::Completed);
    }
}

impl Drop for SwapHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
