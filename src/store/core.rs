//! store/core: TextStore structure, construction, read path, set() and stats.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::rider::{MemoryRider, Rider, RiderId, RiderTable};
use crate::run::{Run, RunArena, RunId};
use crate::swap::SwapState;

use super::swap::PendingSwap;

/// Mutable text storage over a chain of runs, spilling to scratch files.
///
/// All offsets and lengths count chars. Out-of-range arguments panic.
pub struct TextStore {
    pub(crate) cfg: StoreConfig,

    // ----- chain -----
    pub(crate) runs: RunArena,
    pub(crate) head: Option<RunId>,
    pub(crate) tail: Option<RunId>,
    pub(crate) length: usize,
    /// (run, absolute offset of its first char)
    pub(crate) cache: Option<(RunId, usize)>,

    // ----- storage -----
    pub(crate) riders: RiderTable,
    /// Scratch file pool (file riders new text is appended to).
    pub(crate) scratch: Vec<RiderId>,
    /// Writable memory rider collecting text whose scratch write failed.
    pub(crate) fallback: Option<RiderId>,

    // ----- fragmentation -----
    /// Deleted runs whose storage can be overwritten by later inserts.
    pub(crate) spares: Vec<RunId>,
    /// Chars held by spares.
    pub(crate) dead_length: usize,

    // ----- swap -----
    pub(crate) swap: Option<PendingSwap>,
    pub(crate) last_swap: Option<SwapState>,
}

/// Point-in-time description of a store's layout.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub length: usize,
    pub runs: usize,
    pub spares: usize,
    pub dead_length: usize,
    /// Logical length (chars) of every file-backed rider.
    pub scratch_files: Vec<u64>,
    /// Chars held by memory riders (snapshots and fallback buffers).
    pub memory_chars: u64,
    pub swap_state: Option<SwapState>,
    pub swap_progress: Option<u64>,
}

impl Default for TextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TextStore {
    /// Empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(cfg: StoreConfig) -> Self {
        Self {
            cfg: cfg.normalized(),
            runs: RunArena::new(),
            head: None,
            tail: None,
            length: 0,
            cache: None,
            riders: RiderTable::new(),
            scratch: Vec::new(),
            fallback: None,
            spares: Vec::new(),
            dead_length: 0,
            swap: None,
            last_swap: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    /// Document length in chars. O(1).
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Char at `offset`. None only when the backing storage failed to deliver it.
    pub fn get(&mut self, offset: usize) -> Option<char> {
        self.poll_swap();
        assert!(
            offset < self.length,
            "get({}) out of range (len={})",
            offset,
            self.length
        );
        let (id, start) = self.locate(offset);
        let run = *self.runs.get(id);
        let c = run.char_at(rider_mut(&mut self.riders, run.rider), offset - start);
        if c.is_none() {
            warn!("get({}): backing read failed", offset);
        }
        c
    }

    /// `len` chars starting at `offset`. A result with fewer chars than asked
    /// signals a truncated read of the backing storage.
    pub fn get_range(&mut self, offset: usize, len: usize) -> String {
        self.poll_swap();
        assert!(
            offset <= self.length && len <= self.length - offset,
            "get_range({}, {}) out of range (len={})",
            offset,
            len,
            self.length
        );
        if len == 0 {
            return String::new();
        }
        if offset == 0 && len == self.length {
            if let Some(snap) = self.untouched_snapshot() {
                return snap.iter().collect();
            }
        }

        let mut out = String::with_capacity(len);
        let mut scratch = vec!['\0'; self.cfg.page_chars.min(len)];
        let (mut id, start) = self.locate(offset);
        let mut from = offset - start;
        let mut left = len;
        loop {
            let run = *self.runs.get(id);
            let n = left.min(run.len - from);
            let rider = rider_mut(&mut self.riders, run.rider);
            if !run.append_to(rider, from, n, &mut scratch, &mut out) {
                warn!("get_range({}, {}): truncated read", offset, len);
                break;
            }
            left -= n;
            if left == 0 {
                break;
            }
            id = run.next.expect("run chain shorter than document length");
            from = 0;
        }
        out
    }

    /// Whole document as a String (same as `get_range(0, len())`).
    pub fn text(&mut self) -> String {
        let len = self.length;
        self.get_range(0, len)
    }

    /// Stream the document as UTF-8 without materializing it.
    pub fn write_to<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.poll_swap();
        let len = self.length;
        let mut buf = String::new();
        let mut io_err: Option<std::io::Error> = None;
        let complete = self.read_span(0, len, |chunk| {
            if io_err.is_some() {
                return;
            }
            buf.clear();
            buf.extend(chunk);
            if let Err(e) = w.write_all(buf.as_bytes()) {
                io_err = Some(e);
            }
        });
        if let Some(e) = io_err {
            return Err(e).context("write document");
        }
        if !complete {
            return Err(anyhow!("truncated read while writing {} chars", len));
        }
        Ok(())
    }

    /// Reset the store to a single in-memory run covering `text`. Content above the
    /// memory ceiling is migrated to disk by a background swap.
    pub fn set(&mut self, text: &str) {
        self.cancel_swap();
        // A new document starts without swap history.
        self.last_swap = None;
        self.reset_chain();

        let chars: Arc<[char]> = text.chars().collect::<Vec<_>>().into();
        if chars.is_empty() {
            return;
        }
        let len = chars.len();
        let rider = self
            .riders
            .insert(Rider::Memory(MemoryRider::snapshot(chars.clone())));
        let id = self.runs.alloc(Run::new(rider, 0, len));
        self.head = Some(id);
        self.tail = Some(id);
        self.length = len;
        self.cache = Some((id, 0));
        debug!("set: {} chars in memory", len);

        if len > self.cfg.memory_ceiling && self.cfg.swap_enabled {
            self.schedule_swap(rider, chars);
        }
    }

    /// Runs in the document chain.
    pub fn run_count(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(id) = cur {
            n += 1;
            cur = self.runs.get(id).next;
        }
        n
    }

    pub fn spare_count(&self) -> usize {
        self.spares.len()
    }

    pub fn dead_length(&self) -> usize {
        self.dead_length
    }

    /// File-backed riders currently open (pool + swapped document).
    pub fn scratch_file_count(&self) -> usize {
        self.riders
            .ids()
            .into_iter()
            .filter(|id| self.riders.get(*id).map_or(false, |r| r.is_file()))
            .count()
    }

    pub fn stats(&self) -> StoreStats {
        let mut scratch_files = Vec::new();
        let mut memory_chars = 0u64;
        for id in self.riders.ids() {
            match self.riders.get(id) {
                Some(r) if r.is_file() => scratch_files.push(r.len()),
                Some(r) => memory_chars += r.len(),
                None => {}
            }
        }
        StoreStats {
            length: self.length,
            runs: self.run_count(),
            spares: self.spares.len(),
            dead_length: self.dead_length,
            scratch_files,
            memory_chars,
            swap_state: self.swap_state(),
            swap_progress: self.swap_progress(),
        }
    }

    /// Cancel the swap, drop the content and remove every scratch file.
    /// The store stays usable; `set` starts over.
    pub fn dispose(&mut self) {
        self.cancel_swap();
        self.reset_chain();
        self.scratch.clear();
        self.riders.clear();
        debug!("dispose: scratch files removed");
    }

    // ---------------- internal helpers ----------------

    /// Empty chain. Pool scratch files are purged (kept for reuse); every other rider is dropped.
    pub(crate) fn reset_chain(&mut self) {
        self.runs.clear();
        self.head = None;
        self.tail = None;
        self.length = 0;
        self.cache = None;
        self.spares.clear();
        self.dead_length = 0;
        self.fallback = None;

        for id in self.riders.ids() {
            if self.scratch.contains(&id) {
                if let Some(Rider::File(f)) = self.riders.get_mut(id) {
                    f.file_mut().purge();
                }
            } else {
                self.riders.remove(id);
            }
        }
        self.scratch.retain(|id| self.riders.get(*id).is_some());
    }

    /// Feed `len` chars from `offset` to `sink` chunk by chunk. Returns false on a short read.
    pub(crate) fn read_span<F: FnMut(&[char])>(&mut self, offset: usize, len: usize, mut sink: F) -> bool {
        if len == 0 {
            return true;
        }
        let mut buf = vec!['\0'; self.cfg.page_chars.min(len)];
        let (mut id, start) = self.locate(offset);
        let mut from = offset - start;
        let mut left = len;
        loop {
            let run = *self.runs.get(id);
            let mut in_run = left.min(run.len - from);
            left -= in_run;
            while in_run > 0 {
                let n = in_run.min(buf.len());
                let rider = rider_mut(&mut self.riders, run.rider);
                let got = run.copy_into(rider, from, &mut buf[..n]);
                sink(&buf[..got]);
                if got < n {
                    return false;
                }
                from += n;
                in_run -= n;
            }
            if left == 0 {
                return true;
            }
            id = run.next.expect("run chain shorter than document length");
            from = 0;
        }
    }
}

impl Drop for TextStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Rider a run points at. A missing rider means the chain is corrupt.
pub(crate) fn rider_mut(riders: &mut RiderTable, id: RiderId) -> &mut Rider {
    riders
        .get_mut(id)
        .unwrap_or_else(|| panic!("run references missing rider {:?}", id))
}
