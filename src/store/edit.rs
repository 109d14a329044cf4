//! store/edit: chain surgery: locate, split, delete, insert, merge, replace.
//!
//! Invariants kept by every function here before it returns:
//! - length == sum of chain run lengths;
//! - dead_length == sum of spare run lengths;
//! - spares are detached (prev/next None) and never backed by a read-only rider;
//! - the position cache, when set, names a chain run and its true absolute offset.

use anyhow::{anyhow, Result};
use log::{error, warn};

use crate::metrics::{
    record_insert_fallback, record_run_discarded, record_run_merged, record_run_recycled,
    record_run_split,
};
use crate::rider::{FileRider, MemoryRider, Rider, RiderId};
use crate::run::{Run, RunId};
use crate::scratch::ScratchFile;

use super::core::{rider_mut, TextStore};

impl TextStore {
    /// Replace `len` chars at `offset` with `text`.
    pub fn replace(&mut self, offset: usize, len: usize, text: &str) {
        self.poll_swap();
        assert!(
            offset <= self.length && len <= self.length - offset,
            "replace({}, {}) out of range (len={})",
            offset,
            len,
            self.length
        );
        if len == 0 && text.is_empty() {
            return;
        }

        self.delete(offset, len);
        let chars: Vec<char> = text.chars().collect();
        self.insert(offset, &chars);

        if self.needs_reconcile() {
            self.reconcile();
        }
    }

    /// Run covering `offset` and the absolute offset of its first char.
    /// Walks from the position cache (or the head, whichever is closer).
    pub(crate) fn locate(&mut self, offset: usize) -> (RunId, usize) {
        assert!(
            offset < self.length,
            "locate({}) out of range (len={})",
            offset,
            self.length
        );
        let head = self.head.expect("non-empty document without a head run");
        let (mut id, mut start) = match self.cache {
            Some((c, s)) if offset >= s || offset >= s / 2 => (c, s),
            _ => (head, 0),
        };

        while offset < start {
            id = self
                .runs
                .get(id)
                .prev
                .expect("position cache ahead of the chain head");
            start -= self.runs.get(id).len;
        }
        loop {
            let r = self.runs.get(id);
            if offset < start + r.len {
                break;
            }
            start += r.len;
            id = r.next.expect("offset beyond the chain end");
        }

        self.cache = Some((id, start));
        (id, start)
    }

    /// Make `offset` a run boundary. Returns the run starting there, None at the end.
    /// The left piece keeps its id, so cached positions stay valid.
    pub(crate) fn split(&mut self, offset: usize) -> Option<RunId> {
        if offset >= self.length {
            return None;
        }
        let (id, start) = self.locate(offset);
        if offset == start {
            return Some(id);
        }

        let cut = offset - start;
        let run = *self.runs.get(id);
        let mut right = Run::new(run.rider, run.offset + cut as u64, run.len - cut);
        right.prev = Some(id);
        right.next = run.next;
        let rid = self.runs.alloc(right);

        match run.next {
            Some(n) => self.runs.get_mut(n).prev = Some(rid),
            None => self.tail = Some(rid),
        }
        let left = self.runs.get_mut(id);
        left.len = cut;
        left.next = Some(rid);

        record_run_split();
        Some(rid)
    }

    /// Unlink `[offset, offset+len)`. Writable runs go to the spare list,
    /// read-only ones are discarded.
    pub(crate) fn delete(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let first = self
            .split(offset)
            .expect("delete start must lie inside the document");
        let end = self.split(offset + len);
        let before = self.runs.get(first).prev;

        let mut cur = Some(first);
        while cur != end {
            let id = cur.expect("delete range ran past the chain end");
            let run = *self.runs.get(id);
            cur = run.next;
            self.retire(id, run);
        }

        match before {
            Some(b) => self.runs.get_mut(b).next = end,
            None => self.head = end,
        }
        match end {
            Some(e) => self.runs.get_mut(e).prev = before,
            None => self.tail = before,
        }
        self.length -= len;

        self.cache = match (end, before) {
            (Some(e), _) => Some((e, offset)),
            (None, Some(b)) => Some((b, offset - self.runs.get(b).len)),
            (None, None) => None,
        };
    }

    fn retire(&mut self, id: RunId, run: Run) {
        let writable = self
            .riders
            .get(run.rider)
            .map_or(false, |r| !r.is_readonly());
        if writable {
            let r = self.runs.get_mut(id);
            r.prev = None;
            r.next = None;
            self.spares.push(id);
            self.dead_length += run.len;
        } else {
            self.runs.release(id);
            record_run_discarded();
        }
    }

    /// Link `text` in at `offset`: overwrite spares first, then append the rest to a
    /// scratch file (or the in-memory fallback if that fails), then coalesce.
    pub(crate) fn insert(&mut self, offset: usize, text: &[char]) {
        if text.is_empty() {
            return;
        }
        let next = self.split(offset);
        let anchor = match next {
            Some(n) => self.runs.get(n).prev,
            None => self.tail,
        };

        let mut prev = anchor;
        let mut rest = text;
        let mut first_new: Option<RunId> = None;
        let mut added = 0usize;

        while !rest.is_empty() {
            let sid = match self.spares.pop() {
                Some(s) => s,
                None => break,
            };
            let spare = *self.runs.get(sid);
            let n = rest.len().min(spare.len);
            if let Err(e) = self.overwrite_spare(&spare, &rest[..n]) {
                warn!("insert: spare run unusable, dropping it: {:#}", e);
                self.runs.release(sid);
                self.dead_length -= spare.len;
                continue;
            }
            if spare.len > n {
                let leftover = Run::new(spare.rider, spare.offset + n as u64, spare.len - n);
                let lid = self.runs.alloc(leftover);
                self.spares.push(lid);
            }
            self.runs.get_mut(sid).len = n;
            self.dead_length -= n;
            self.link(prev, sid, next);
            record_run_recycled();

            prev = Some(sid);
            first_new.get_or_insert(sid);
            added += 1;
            rest = &rest[n..];
        }

        if !rest.is_empty() {
            let run = match self.append_to_scratch(rest) {
                Ok(run) => run,
                Err(e) => {
                    warn!(
                        "insert: scratch write of {} chars failed, keeping them in memory: {:#}",
                        rest.len(),
                        e
                    );
                    record_insert_fallback();
                    self.append_to_fallback(rest)
                }
            };
            let id = self.runs.alloc(run);
            self.link(prev, id, next);
            first_new.get_or_insert(id);
            added += 1;
        }

        self.length += text.len();

        let (scan, scan_start) = match anchor {
            Some(a) => (a, offset - self.runs.get(a).len),
            None => (
                first_new.expect("non-empty insert produced no run"),
                0,
            ),
        };
        self.merge_from(scan, added + self.cfg.merge_scan_limit);
        self.cache = Some((scan, scan_start));
    }

    fn overwrite_spare(&mut self, spare: &Run, chars: &[char]) -> Result<()> {
        let rider = self
            .riders
            .get_mut(spare.rider)
            .ok_or_else(|| anyhow!("spare references missing rider {:?}", spare.rider))?;
        if rider.is_readonly() || rider.limit() < spare.offset + chars.len() as u64 {
            return Err(anyhow!("spare rider {:?} has no write capacity", spare.rider));
        }
        rider.seek(spare.offset);
        rider.write_chars(chars)
    }

    fn link(&mut self, prev: Option<RunId>, id: RunId, next: Option<RunId>) {
        {
            let r = self.runs.get_mut(id);
            r.prev = prev;
            r.next = next;
        }
        match prev {
            Some(p) => self.runs.get_mut(p).next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(n) => self.runs.get_mut(n).prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Coalesce mergeable neighbours starting at `start`, inspecting at most `budget` links.
    /// `start` itself is never freed.
    pub(crate) fn merge_from(&mut self, start: RunId, budget: usize) {
        let mut cur = start;
        for _ in 0..budget {
            let run = *self.runs.get(cur);
            let n = match run.next {
                Some(n) => n,
                None => break,
            };
            let next = *self.runs.get(n);
            if run.is_mergeable_with(&next) {
                {
                    let r = self.runs.get_mut(cur);
                    r.len += next.len;
                    r.next = next.next;
                }
                match next.next {
                    Some(nn) => self.runs.get_mut(nn).prev = Some(cur),
                    None => self.tail = Some(cur),
                }
                self.runs.release(n);
                record_run_merged();
            } else {
                cur = n;
            }
        }
    }

    fn append_to_scratch(&mut self, text: &[char]) -> Result<Run> {
        let rid = self.scratch_target()?;
        let rider = self
            .riders
            .get_mut(rid)
            .ok_or_else(|| anyhow!("scratch rider {:?} vanished", rid))?;
        let at = rider.len();
        rider.seek(at);
        rider.write_chars(text)?;
        Ok(Run::new(rid, at, text.len()))
    }

    /// Least loaded pool file; a new one is opened once that file passes the
    /// threshold and the pool is not full.
    fn scratch_target(&mut self) -> Result<RiderId> {
        let least = self
            .scratch
            .iter()
            .copied()
            .filter_map(|id| self.riders.get(id).map(|r| (id, r.len())))
            .min_by_key(|(_, len)| *len);

        if let Some((id, len)) = least {
            if len < self.cfg.scratch_file_threshold || self.scratch.len() >= self.cfg.max_scratch_files {
                return Ok(id);
            }
        }

        let file = ScratchFile::create(
            &self.cfg.scratch_dir(),
            self.cfg.page_pool,
            self.cfg.page_chars,
        )?;
        let id = self.riders.insert(Rider::File(FileRider::new(file)));
        self.scratch.push(id);
        Ok(id)
    }

    fn append_to_fallback(&mut self, text: &[char]) -> Run {
        let existing = self
            .fallback
            .filter(|id| self.riders.get(*id).is_some());
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self
                    .riders
                    .insert(Rider::Memory(MemoryRider::buffer(Vec::new())));
                self.fallback = Some(id);
                id
            }
        };
        let rider = rider_mut(&mut self.riders, id);
        let at = rider.len();
        rider.seek(at);
        if let Err(e) = rider.write_chars(text) {
            error!("insert: in-memory fallback write failed: {:#}", e);
        }
        Run::new(id, at, text.len())
    }

    pub(crate) fn needs_reconcile(&self) -> bool {
        if self.dead_length == 0 {
            return false;
        }
        self.length == 0
            || self.dead_length as f64 > self.cfg.reconcile_ratio * self.length as f64
    }
}
