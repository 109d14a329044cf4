use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use SpoolText::config::StoreConfig;
use SpoolText::consts::{DEFAULT_MEMORY_CEILING, DEFAULT_PAGE_CHARS};
use SpoolText::StoreBuilder;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("spooltest-builder-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn builder_overrides_reach_the_store() -> Result<()> {
    let root = unique_root("overrides");
    let cfg = StoreBuilder::from_default()
        .page_chars(64)
        .page_pool(3)
        .memory_ceiling(500)
        .max_scratch_files(2)
        .merge_scan_limit(8)
        .scratch_dir(Some(root.clone()))
        .build();
    assert_eq!(cfg.page_chars, 64);
    assert_eq!(cfg.page_pool, 3);
    assert_eq!(cfg.memory_ceiling, 500);
    assert_eq!(cfg.max_scratch_files, 2);
    assert_eq!(cfg.merge_scan_limit, 8);
    assert_eq!(cfg.scratch_dir(), root);

    let mut s = SpoolText::TextStore::with_config(cfg);
    assert_eq!(s.config().page_chars, 64);
    s.set("abc");
    s.replace(3, 0, "def");
    assert_eq!(s.text(), "abcdef");
    // The pool file lands in the configured directory.
    assert_eq!(std::fs::read_dir(&root)?.count(), 1);
    Ok(())
}

#[test]
fn zero_values_are_normalized() {
    let cfg = StoreConfig::default()
        .with_page_chars(0)
        .with_page_pool(0)
        .with_max_scratch_files(0)
        .with_swap_chunk_chars(0)
        .with_reconcile_ratio(-1.0)
        .normalized();
    assert!(cfg.page_chars >= 1);
    assert!(cfg.page_pool >= 1);
    assert!(cfg.max_scratch_files >= 1);
    assert!(cfg.swap_chunk_chars >= 1);
    assert!(cfg.reconcile_ratio > 0.0);
}

#[test]
fn env_overrides_and_builder_wins() {
    std::env::set_var("SPOOL_PAGE_CHARS", "128");
    std::env::set_var("SPOOL_SWAP", "off");

    let env_cfg = StoreConfig::from_env();
    assert_eq!(env_cfg.page_chars, 128);
    assert!(!env_cfg.swap_enabled);

    let built = StoreBuilder::new().page_chars(256).build();
    assert_eq!(built.page_chars, 256);
    assert!(!built.swap_enabled);

    let plain = StoreBuilder::from_default().build();
    assert_eq!(plain.page_chars, DEFAULT_PAGE_CHARS);
    assert!(plain.swap_enabled);
    assert_eq!(plain.memory_ceiling, DEFAULT_MEMORY_CEILING);

    std::env::remove_var("SPOOL_PAGE_CHARS");
    std::env::remove_var("SPOOL_SWAP");
}
