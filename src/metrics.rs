//! Lightweight global metrics for SpoolText.
//!
//! Thread-safe atomic counters per subsystem:
//! - Scratch files (lifecycle, page cache)
//! - Run chain (split / merge / recycle / discard)
//! - Degradations (insert fallbacks, truncated reads)
//! - Reconciliation
//! - Swap jobs

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Scratch files -----
static SCRATCH_FILES_CREATED: AtomicU64 = AtomicU64::new(0);
static SCRATCH_FILES_DISPOSED: AtomicU64 = AtomicU64::new(0);

// ----- Page cache -----
static PAGE_HITS: AtomicU64 = AtomicU64::new(0);
static PAGE_MISSES: AtomicU64 = AtomicU64::new(0);
static PAGE_EVICTIONS: AtomicU64 = AtomicU64::new(0);
static PAGE_FLUSHES: AtomicU64 = AtomicU64::new(0);

// ----- Run chain -----
static RUNS_SPLIT: AtomicU64 = AtomicU64::new(0);
static RUNS_MERGED: AtomicU64 = AtomicU64::new(0);
static RUNS_RECYCLED: AtomicU64 = AtomicU64::new(0);
static RUNS_DISCARDED: AtomicU64 = AtomicU64::new(0);

// ----- Degradations -----
static INSERT_FALLBACKS: AtomicU64 = AtomicU64::new(0);
static TRUNCATED_READS: AtomicU64 = AtomicU64::new(0);

// ----- Reconcile -----
static RECONCILIATIONS: AtomicU64 = AtomicU64::new(0);

// ----- Swap -----
static SWAPS_SCHEDULED: AtomicU64 = AtomicU64::new(0);
static SWAPS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static SWAPS_CANCELLED: AtomicU64 = AtomicU64::new(0);
static SWAPS_FAILED: AtomicU64 = AtomicU64::new(0);
static SWAP_CHARS_COPIED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Scratch files
    pub scratch_files_created: u64,
    pub scratch_files_disposed: u64,

    // Page cache
    pub page_hits: u64,
    pub page_misses: u64,
    pub page_evictions: u64,
    pub page_flushes: u64,

    // Run chain
    pub runs_split: u64,
    pub runs_merged: u64,
    pub runs_recycled: u64,
    pub runs_discarded: u64,

    // Degradations
    pub insert_fallbacks: u64,
    pub truncated_reads: u64,

    // Reconcile
    pub reconciliations: u64,

    // Swap
    pub swaps_scheduled: u64,
    pub swaps_completed: u64,
    pub swaps_cancelled: u64,
    pub swaps_failed: u64,
    pub swap_chars_copied: u64,
}

impl MetricsSnapshot {
    pub fn page_hit_ratio(&self) -> f64 {
        let total = self.page_hits + self.page_misses;
        if total == 0 {
            0.0
        } else {
            self.page_hits as f64 / total as f64
        }
    }
}

// ----- Recorders (Scratch files) -----
pub fn record_scratch_created() {
    SCRATCH_FILES_CREATED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_scratch_disposed() {
    SCRATCH_FILES_DISPOSED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Page cache) -----
pub fn record_page_hit() {
    PAGE_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_page_miss() {
    PAGE_MISSES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_page_eviction() {
    PAGE_EVICTIONS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_page_flush() {
    PAGE_FLUSHES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Run chain) -----
pub fn record_run_split() {
    RUNS_SPLIT.fetch_add(1, Ordering::Relaxed);
}
pub fn record_run_merged() {
    RUNS_MERGED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_run_recycled() {
    RUNS_RECYCLED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_run_discarded() {
    RUNS_DISCARDED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Degradations) -----
pub fn record_insert_fallback() {
    INSERT_FALLBACKS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_truncated_read() {
    TRUNCATED_READS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Reconcile) -----
pub fn record_reconciliation() {
    RECONCILIATIONS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Swap) -----
pub fn record_swap_scheduled() {
    SWAPS_SCHEDULED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_swap_completed() {
    SWAPS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_swap_cancelled() {
    SWAPS_CANCELLED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_swap_failed() {
    SWAPS_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_swap_chars(n: usize) {
    SWAP_CHARS_COPIED.fetch_add(n as u64, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        scratch_files_created: SCRATCH_FILES_CREATED.load(Ordering::Relaxed),
        scratch_files_disposed: SCRATCH_FILES_DISPOSED.load(Ordering::Relaxed),

        page_hits: PAGE_HITS.load(Ordering::Relaxed),
        page_misses: PAGE_MISSES.load(Ordering::Relaxed),
        page_evictions: PAGE_EVICTIONS.load(Ordering::Relaxed),
        page_flushes: PAGE_FLUSHES.load(Ordering::Relaxed),

        runs_split: RUNS_SPLIT.load(Ordering::Relaxed),
        runs_merged: RUNS_MERGED.load(Ordering::Relaxed),
        runs_recycled: RUNS_RECYCLED.load(Ordering::Relaxed),
        runs_discarded: RUNS_DISCARDED.load(Ordering::Relaxed),

        insert_fallbacks: INSERT_FALLBACKS.load(Ordering::Relaxed),
        truncated_reads: TRUNCATED_READS.load(Ordering::Relaxed),

        reconciliations: RECONCILIATIONS.load(Ordering::Relaxed),

        swaps_scheduled: SWAPS_SCHEDULED.load(Ordering::Relaxed),
        swaps_completed: SWAPS_COMPLETED.load(Ordering::Relaxed),
        swaps_cancelled: SWAPS_CANCELLED.load(Ordering::Relaxed),
        swaps_failed: SWAPS_FAILED.load(Ordering::Relaxed),
        swap_chars_copied: SWAP_CHARS_COPIED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SCRATCH_FILES_CREATED.store(0, Ordering::Relaxed);
    SCRATCH_FILES_DISPOSED.store(0, Ordering::Relaxed);

    PAGE_HITS.store(0, Ordering::Relaxed);
    PAGE_MISSES.store(0, Ordering::Relaxed);
    PAGE_EVICTIONS.store(0, Ordering::Relaxed);
    PAGE_FLUSHES.store(0, Ordering::Relaxed);

    RUNS_SPLIT.store(0, Ordering::Relaxed);
    RUNS_MERGED.store(0, Ordering::Relaxed);
    RUNS_RECYCLED.store(0, Ordering::Relaxed);
    RUNS_DISCARDED.store(0, Ordering::Relaxed);

    INSERT_FALLBACKS.store(0, Ordering::Relaxed);
    TRUNCATED_READS.store(0, Ordering::Relaxed);

    RECONCILIATIONS.store(0, Ordering::Relaxed);

    SWAPS_SCHEDULED.store(0, Ordering::Relaxed);
    SWAPS_COMPLETED.store(0, Ordering::Relaxed);
    SWAPS_CANCELLED.store(0, Ordering::Relaxed);
    SWAPS_FAILED.store(0, Ordering::Relaxed);
    SWAP_CHARS_COPIED.store(0, Ordering::Relaxed);
}
