//! store/reconcile: rewrite the whole chain to drop fragmentation.
//!
//! Steps:
//! 1) Stream the document through the chain, page by page, into freshly created
//!    scratch files. The old layout stays live and untouched meanwhile; the pool
//!    threshold applies to every piece written, so the new files fill evenly.
//! 2) A short read or a failed write aborts: the new files are dropped (and removed),
//!    the old layout is kept.
//! 3) Cancel a pending swap; it would repoint runs that are about to disappear.
//! 4) Install the new files as the pool, link one run per contiguous stretch and
//!    dispose every old rider (pool files, snapshot, swapped file, fallback buffer).
//!
//! Content is unchanged; run count, spares and dead_length are reset.

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::metrics::record_reconciliation;
use crate::rider::{FileRider, Rider};
use crate::run::Run;
use crate::scratch::ScratchFile;

use super::core::TextStore;

/// Layout before/after a reconcile pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub length: usize,
    pub runs_before: usize,
    pub runs_after: usize,
    pub dead_length_before: usize,
    /// Scratch files holding the document after the pass.
    pub scratch_files_after: usize,
    /// False when the pass was skipped because the content could not be read back
    /// or the new scratch files could not be written.
    pub rewritten: bool,
}

/// New scratch files being filled while the old layout is still in place.
struct Rebuild {
    dir: PathBuf,
    pages: usize,
    page_chars: usize,
    threshold: u64,
    max_files: usize,
    files: Vec<ScratchFile>,
    /// (file index, offset, len) in document order, contiguous pieces coalesced.
    spans: Vec<(usize, u64, usize)>,
    error: Option<anyhow::Error>,
}

impl Rebuild {
    fn push(&mut self, mut chunk: &[char]) {
        while !chunk.is_empty() && self.error.is_none() {
            match self.write_piece(chunk) {
                Ok(n) => chunk = &chunk[n..],
                Err(e) => self.error = Some(e),
            }
        }
    }

    /// Same policy as inserts: least loaded file, a new one once it passes the threshold.
    fn target(&mut self) -> Result<usize> {
        let least = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (i, f.len()))
            .min_by_key(|(_, len)| *len);
        if let Some((i, len)) = least {
            if len < self.threshold || self.files.len() >= self.max_files {
                return Ok(i);
            }
        }
        self.files
            .push(ScratchFile::create(&self.dir, self.pages, self.page_chars)?);
        Ok(self.files.len() - 1)
    }

    fn write_piece(&mut self, chunk: &[char]) -> Result<usize> {
        let i = self.target()?;
        let len = self.files[i].len();
        // Never more than one threshold's worth per piece, so a full pool keeps rotating.
        let room = if len < self.threshold {
            self.threshold - len
        } else {
            self.threshold
        };
        let n = (chunk.len() as u64).min(room.max(1)) as usize;
        let at = self.files[i].append(&chunk[..n])?;

        match self.spans.last_mut() {
            Some((fi, off, l)) if *fi == i && *off + *l as u64 == at => *l += n,
            _ => self.spans.push((i, at, n)),
        }
        Ok(n)
    }
}

impl TextStore {
    /// Rewrite the document into a fresh layout.
    pub fn reconcile(&mut self) -> ReconcileSummary {
        let len = self.length;
        let runs_before = self.run_count();
        let dead_before = self.dead_length;
        info!(
            "reconcile: {} chars, {} runs, dead_length={}",
            len, runs_before, dead_before
        );

        let mut rebuild = Rebuild {
            dir: self.cfg.scratch_dir(),
            pages: self.cfg.page_pool,
            page_chars: self.cfg.page_chars,
            threshold: self.cfg.scratch_file_threshold,
            max_files: self.cfg.max_scratch_files,
            files: Vec::new(),
            spans: Vec::new(),
            error: None,
        };
        let mut copied = 0usize;
        let complete = self.read_span(0, len, |chunk| {
            copied += chunk.len();
            rebuild.push(chunk);
        });

        let skipped = |store: &TextStore| ReconcileSummary {
            length: len,
            runs_before,
            runs_after: runs_before,
            dead_length_before: dead_before,
            scratch_files_after: store.scratch_file_count(),
            rewritten: false,
        };
        if !complete {
            warn!(
                "reconcile: read back {} of {} chars, keeping the current layout",
                copied, len
            );
            return skipped(self);
        }
        if let Some(e) = rebuild.error.take() {
            warn!("reconcile: rewrite failed, keeping the current layout: {:#}", e);
            return skipped(self);
        }

        self.cancel_swap();
        self.install(rebuild);
        record_reconciliation();

        let runs_after = self.run_count();
        info!(
            "reconcile: done, {} runs in {} scratch file(s)",
            runs_after,
            self.scratch.len()
        );
        ReconcileSummary {
            length: self.length,
            runs_before,
            runs_after,
            dead_length_before: dead_before,
            scratch_files_after: self.scratch.len(),
            rewritten: true,
        }
    }

    /// Drop the old layout and every old rider, then adopt the rebuilt files.
    fn install(&mut self, rebuild: Rebuild) {
        let len = self.length;
        self.reset_chain();
        self.scratch.clear();
        self.riders.clear();

        let ids: Vec<_> = rebuild
            .files
            .into_iter()
            .map(|f| self.riders.insert(Rider::File(FileRider::new(f))))
            .collect();
        self.scratch.extend(ids.iter().copied());

        let mut prev = None;
        for (fi, off, n) in rebuild.spans {
            let mut run = Run::new(ids[fi], off, n);
            run.prev = prev;
            let id = self.runs.alloc(run);
            match prev {
                Some(p) => self.runs.get_mut(p).next = Some(id),
                None => self.head = Some(id),
            }
            prev = Some(id);
        }
        self.tail = prev;
        self.length = len;
        self.cache = self.head.map(|h| (h, 0));
    }
}
