//! Default tuning constants (overridable through `StoreConfig`) and scratch naming.

// -------- Scratch file pages --------
/// Characters held by one cached scratch page.
pub const DEFAULT_PAGE_CHARS: usize = 2048;
/// Cached pages per scratch file.
pub const DEFAULT_PAGE_POOL: usize = 4;
/// On-disk width of one character (u32 LE scalar value).
pub const CHAR_BYTES: u64 = 4;

// -------- Store --------
/// Documents longer than this (chars) are migrated to disk by the swap job.
pub const DEFAULT_MEMORY_CEILING: usize = 32 * 1024;
/// Once the least loaded scratch file holds this many chars, open another one.
pub const DEFAULT_SCRATCH_FILE_THRESHOLD: u64 = 1024 * 1024;
pub const DEFAULT_MAX_SCRATCH_FILES: usize = 4;
/// dead_length / length above which the store is rewritten.
pub const DEFAULT_RECONCILE_RATIO: f64 = 0.10;
/// How many runs past an insertion point are inspected for coalescing.
pub const DEFAULT_MERGE_SCAN_LIMIT: usize = 4;

// -------- Swap --------
pub const DEFAULT_SWAP_CHUNK_CHARS: usize = 4096;
pub const DEFAULT_SWAP_DELAY_MS: u64 = 100;
/// Granularity of the cancel poll while the swap worker waits out its delay.
pub const SWAP_DELAY_POLL_MS: u64 = 10;
pub const SWAP_THREAD_NAME: &str = "spooltext-swap";

// -------- Scratch file naming --------
pub const SCRATCH_PREFIX: &str = "spool-";
pub const SCRATCH_EXT: &str = "scratch";
