//! Centralized configuration and builder for SpoolText.
//!
//! Goals:
//! - Single place to collect the tuning constants instead of scattering literals.
//! - StoreConfig::from_env() reads SPOOL_* overrides on top of the defaults.
//! - StoreBuilder returns a StoreConfig, which TextStore consumes.
//!
//! Defaults:
//! - page_chars = 2048, page_pool = 4 (scratch page cache)
//! - memory_ceiling = 32K chars (larger `set` content is swapped to disk)
//! - scratch_file_threshold = 1Mi chars, max_scratch_files = 4
//! - reconcile_ratio = 0.10 (dead_length / length)
//! - swap_chunk_chars = 4096, swap_delay_ms = 100
//!   All of the above can be overridden via ENV or builder.

use std::fmt;
use std::path::PathBuf;

use crate::consts::{
    DEFAULT_MAX_SCRATCH_FILES, DEFAULT_MEMORY_CEILING, DEFAULT_MERGE_SCAN_LIMIT,
    DEFAULT_PAGE_CHARS, DEFAULT_PAGE_POOL, DEFAULT_RECONCILE_RATIO,
    DEFAULT_SCRATCH_FILE_THRESHOLD, DEFAULT_SWAP_CHUNK_CHARS, DEFAULT_SWAP_DELAY_MS,
};
use crate::store::TextStore;

/// Top-level configuration for a TextStore.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Characters per cached scratch page.
    /// Env: SPOOL_PAGE_CHARS (default 2048)
    pub page_chars: usize,

    /// Number of cached pages per scratch file.
    /// Env: SPOOL_PAGE_POOL (default 4)
    pub page_pool: usize,

    /// `set` content longer than this is migrated to disk in the background.
    /// Env: SPOOL_MEMORY_CEILING (default 32768)
    pub memory_ceiling: usize,

    /// A new scratch file is opened once the least loaded one holds this many chars.
    /// Env: SPOOL_SCRATCH_FILE_THRESHOLD (default 1048576)
    pub scratch_file_threshold: u64,

    /// Upper bound of the scratch file pool.
    /// Env: SPOOL_MAX_SCRATCH_FILES (default 4)
    pub max_scratch_files: usize,

    /// Reconcile once dead_length / length exceeds this ratio.
    /// Env: SPOOL_RECONCILE_RATIO (default 0.10)
    pub reconcile_ratio: f64,

    /// Chunk size of the swap copy loop; cancellation is polled between chunks.
    /// Env: SPOOL_SWAP_CHUNK_CHARS (default 4096)
    pub swap_chunk_chars: usize,

    /// Delay before the swap worker starts copying.
    /// Env: SPOOL_SWAP_DELAY_MS (default 100)
    pub swap_delay_ms: u64,

    /// Whether large `set` content schedules a swap at all.
    /// Env: SPOOL_SWAP = 0|1|true|false (default true)
    pub swap_enabled: bool,

    /// Runs inspected for coalescing after an insertion.
    /// Env: SPOOL_MERGE_SCAN_LIMIT (default 4)
    pub merge_scan_limit: usize,

    /// Directory for scratch files. None means std::env::temp_dir().
    /// Env: SPOOL_SCRATCH_DIR
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_chars: DEFAULT_PAGE_CHARS,
            page_pool: DEFAULT_PAGE_POOL,
            memory_ceiling: DEFAULT_MEMORY_CEILING,
            scratch_file_threshold: DEFAULT_SCRATCH_FILE_THRESHOLD,
            max_scratch_files: DEFAULT_MAX_SCRATCH_FILES,
            reconcile_ratio: DEFAULT_RECONCILE_RATIO,
            swap_chunk_chars: DEFAULT_SWAP_CHUNK_CHARS,
            swap_delay_ms: DEFAULT_SWAP_DELAY_MS,
            swap_enabled: true,
            merge_scan_limit: DEFAULT_MERGE_SCAN_LIMIT,
            scratch_dir: None,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl StoreConfig {
    /// Load configuration from SPOOL_* environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>("SPOOL_PAGE_CHARS") {
            cfg.page_chars = n;
        }
        if let Some(n) = env_parse::<usize>("SPOOL_PAGE_POOL") {
            cfg.page_pool = n;
        }
        if let Some(n) = env_parse::<usize>("SPOOL_MEMORY_CEILING") {
            cfg.memory_ceiling = n;
        }
        if let Some(n) = env_parse::<u64>("SPOOL_SCRATCH_FILE_THRESHOLD") {
            cfg.scratch_file_threshold = n;
        }
        if let Some(n) = env_parse::<usize>("SPOOL_MAX_SCRATCH_FILES") {
            cfg.max_scratch_files = n;
        }
        if let Some(r) = env_parse::<f64>("SPOOL_RECONCILE_RATIO") {
            cfg.reconcile_ratio = r;
        }
        if let Some(n) = env_parse::<usize>("SPOOL_SWAP_CHUNK_CHARS") {
            cfg.swap_chunk_chars = n;
        }
        if let Some(n) = env_parse::<u64>("SPOOL_SWAP_DELAY_MS") {
            cfg.swap_delay_ms = n;
        }
        if let Ok(v) = std::env::var("SPOOL_SWAP") {
            cfg.swap_enabled = env_flag(&v);
        }
        if let Some(n) = env_parse::<usize>("SPOOL_MERGE_SCAN_LIMIT") {
            cfg.merge_scan_limit = n;
        }
        if let Ok(v) = std::env::var("SPOOL_SCRATCH_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.scratch_dir = Some(PathBuf::from(s));
            }
        }

        cfg.normalized()
    }

    /// Clamp values that would make the store unusable.
    pub fn normalized(mut self) -> Self {
        self.page_chars = self.page_chars.max(1);
        self.page_pool = self.page_pool.max(1);
        self.max_scratch_files = self.max_scratch_files.max(1);
        self.swap_chunk_chars = self.swap_chunk_chars.max(1);
        if !(self.reconcile_ratio > 0.0) {
            self.reconcile_ratio = DEFAULT_RECONCILE_RATIO;
        }
        self
    }

    /// Directory scratch files are created in.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn with_page_chars(mut self, n: usize) -> Self {
        self.page_chars = n;
        self
    }

    pub fn with_page_pool(mut self, n: usize) -> Self {
        self.page_pool = n;
        self
    }

    pub fn with_memory_ceiling(mut self, n: usize) -> Self {
        self.memory_ceiling = n;
        self
    }

    pub fn with_scratch_file_threshold(mut self, n: u64) -> Self {
        self.scratch_file_threshold = n;
        self
    }

    pub fn with_max_scratch_files(mut self, n: usize) -> Self {
        self.max_scratch_files = n;
        self
    }

    pub fn with_reconcile_ratio(mut self, r: f64) -> Self {
        self.reconcile_ratio = r;
        self
    }

    pub fn with_swap_chunk_chars(mut self, n: usize) -> Self {
        self.swap_chunk_chars = n;
        self
    }

    pub fn with_swap_delay_ms(mut self, ms: u64) -> Self {
        self.swap_delay_ms = ms;
        self
    }

    pub fn with_swap_enabled(mut self, on: bool) -> Self {
        self.swap_enabled = on;
        self
    }

    pub fn with_merge_scan_limit(mut self, n: usize) -> Self {
        self.merge_scan_limit = n;
        self
    }

    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.scratch_dir = dir.map(Into::into);
        self
    }
}

impl fmt::Display for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreConfig {{ \
             page_chars: {}, \
             page_pool: {}, \
             memory_ceiling: {}, \
             scratch_file_threshold: {}, \
             max_scratch_files: {}, \
             reconcile_ratio: {}, \
             swap_chunk_chars: {}, \
             swap_delay_ms: {}, \
             swap_enabled: {}, \
             merge_scan_limit: {}, \
             scratch_dir: {} \
             }}",
            self.page_chars,
            self.page_pool,
            self.memory_ceiling,
            self.scratch_file_threshold,
            self.max_scratch_files,
            self.reconcile_ratio,
            self.swap_chunk_chars,
            self.swap_delay_ms,
            self.swap_enabled,
            self.merge_scan_limit,
            self.scratch_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default(temp_dir)".to_string()),
        )
    }
}

/// Lightweight builder that produces a StoreConfig (or directly a TextStore).
#[derive(Clone, Debug)]
pub struct StoreBuilder {
    cfg: StoreConfig,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: StoreConfig::from_env(),
        }
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: StoreConfig::default(),
        }
    }

    pub fn page_chars(mut self, n: usize) -> Self {
        self.cfg.page_chars = n;
        self
    }

    pub fn page_pool(mut self, n: usize) -> Self {
        self.cfg.page_pool = n;
        self
    }

    pub fn memory_ceiling(mut self, n: usize) -> Self {
        self.cfg.memory_ceiling = n;
        self
    }

    pub fn scratch_file_threshold(mut self, n: u64) -> Self {
        self.cfg.scratch_file_threshold = n;
        self
    }

    pub fn max_scratch_files(mut self, n: usize) -> Self {
        self.cfg.max_scratch_files = n;
        self
    }

    pub fn reconcile_ratio(mut self, r: f64) -> Self {
        self.cfg.reconcile_ratio = r;
        self
    }

    pub fn swap_chunk_chars(mut self, n: usize) -> Self {
        self.cfg.swap_chunk_chars = n;
        self
    }

    pub fn swap_delay_ms(mut self, ms: u64) -> Self {
        self.cfg.swap_delay_ms = ms;
        self
    }

    pub fn swap_enabled(mut self, on: bool) -> Self {
        self.cfg.swap_enabled = on;
        self
    }

    pub fn merge_scan_limit(mut self, n: usize) -> Self {
        self.cfg.merge_scan_limit = n;
        self
    }

    pub fn scratch_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.cfg.scratch_dir = dir.map(Into::into);
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> StoreConfig {
        self.cfg.normalized()
    }

    /// Finish the builder and open an empty store with the configuration.
    pub fn open(self) -> TextStore {
        TextStore::with_config(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_consts() {
        let c = StoreConfig::default();
        assert_eq!(c.page_chars, 2048);
        assert_eq!(c.page_pool, 4);
        assert_eq!(c.memory_ceiling, 32 * 1024);
        assert_eq!(c.scratch_file_threshold, 1024 * 1024);
        assert_eq!(c.max_scratch_files, 4);
        assert!((c.reconcile_ratio - 0.10).abs() < f64::EPSILON);
        assert_eq!(c.swap_chunk_chars, 4096);
        assert!(c.swap_enabled);
    }

    #[test]
    fn normalized_clamps_degenerate_values() {
        let c = StoreConfig::default()
            .with_page_chars(0)
            .with_page_pool(0)
            .with_max_scratch_files(0)
            .with_swap_chunk_chars(0)
            .with_reconcile_ratio(-1.0)
            .normalized();
        assert_eq!(c.page_chars, 1);
        assert_eq!(c.page_pool, 1);
        assert_eq!(c.max_scratch_files, 1);
        assert_eq!(c.swap_chunk_chars, 1);
        assert!((c.reconcile_ratio - DEFAULT_RECONCILE_RATIO).abs() < f64::EPSILON);
    }

    #[test]
    fn display_mentions_default_dir() {
        let s = StoreConfig::default().to_string();
        assert!(s.contains("default(temp_dir)"), "{}", s);
    }
}
