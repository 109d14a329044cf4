use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use SpoolText::{metrics, StoreBuilder, SwapState};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("spooltest-{prefix}-{pid}-{t}-{id}"))
}

fn pattern(n: usize) -> String {
    (0..n)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect()
}

#[test]
fn large_document_moves_to_disk() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-large")))
        .swap_delay_ms(0)
        .open();
    let text = pattern(100_000);
    s.set(&text);
    assert!(matches!(
        s.swap_state(),
        Some(SwapState::Created) | Some(SwapState::Running)
    ));

    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));
    assert_eq!(s.swap_state(), Some(SwapState::Completed));
    assert_eq!(s.scratch_file_count(), 1);
    assert_eq!(s.stats().memory_chars, 0, "snapshot must be released");
    assert_eq!(s.text(), text);
    s.check_invariants()?;

    s.replace(0, 0, "X");
    assert_eq!(s.get(0), Some('X'));
    assert_eq!(s.get(1), Some('a'));
    assert_eq!(s.len(), 100_001);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn small_document_is_never_swapped() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-small")))
        .memory_ceiling(1000)
        .open();
    s.set(&pattern(1000));
    assert_eq!(s.swap_state(), None);
    assert_eq!(s.wait_for_swap(), None);
    assert_eq!(s.scratch_file_count(), 0);
    Ok(())
}

#[test]
fn disabled_swap_keeps_document_in_memory() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-off")))
        .memory_ceiling(10)
        .swap_enabled(false)
        .open();
    s.set(&pattern(5000));
    assert_eq!(s.swap_state(), None);
    assert_eq!(s.stats().memory_chars, 5000);
    Ok(())
}

#[test]
fn edits_before_completion_survive_substitution() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-edits")))
        .memory_ceiling(100)
        .swap_delay_ms(50)
        .swap_chunk_chars(64)
        .open();
    let text = pattern(10_000);
    s.set(&text);

    let mut model: Vec<char> = text.chars().collect();
    for (off, del, ins) in [(0usize, 3usize, "HEAD"), (5000, 10, ""), (9000, 0, "mid"), (100, 50, "~")] {
        s.replace(off, del, ins);
        model.splice(off..off + del, ins.chars());
    }

    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));
    s.check_invariants()?;
    let want: String = model.iter().collect();
    assert_eq!(s.text(), want);
    assert_eq!(s.stats().memory_chars, 0);
    Ok(())
}

#[test]
fn set_cancels_pending_swap() -> Result<()> {
    let root = unique_root("swap-cancel");
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(root.clone()))
        .memory_ceiling(100)
        .swap_delay_ms(10_000)
        .open();
    s.set(&pattern(1000));
    assert!(matches!(
        s.swap_state(),
        Some(SwapState::Created) | Some(SwapState::Running)
    ));

    s.set("short");
    // The new document never had a swap of its own.
    assert_eq!(s.swap_state(), None);
    assert_eq!(s.wait_for_swap(), None);
    assert_eq!(s.text(), "short");
    assert_eq!(s.scratch_file_count(), 0);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn explicit_cancel_leaves_document_in_memory() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-explicit-cancel")))
        .memory_ceiling(100)
        .swap_delay_ms(10_000)
        .open();
    let text = pattern(2000);
    s.set(&text);
    s.cancel_swap();
    assert_eq!(s.swap_state(), Some(SwapState::Cancelled));
    assert_eq!(s.text(), text);
    assert_eq!(s.stats().memory_chars, 2000);
    Ok(())
}

#[test]
fn reconcile_cancels_pending_swap() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-reconcile")))
        .memory_ceiling(100)
        .swap_delay_ms(10_000)
        .open();
    let text = pattern(500);
    s.set(&text);
    let summary = s.reconcile();
    assert!(summary.rewritten);
    assert_eq!(s.swap_state(), Some(SwapState::Cancelled));
    assert_eq!(s.text(), text);
    assert_eq!(s.stats().memory_chars, 0, "content now lives in the scratch pool");
    s.check_invariants()?;
    Ok(())
}

#[test]
fn swap_counts_copied_chars() -> Result<()> {
    let before = metrics::snapshot();
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-metrics")))
        .memory_ceiling(100)
        .swap_delay_ms(0)
        .open();
    s.set(&pattern(3000));
    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));

    let after = metrics::snapshot();
    assert!(after.swaps_scheduled > before.swaps_scheduled);
    assert!(after.swaps_completed > before.swaps_completed);
    assert!(after.swap_chars_copied >= before.swap_chars_copied + 3000);
    Ok(())
}

#[test]
fn set_after_completed_swap_forgets_it() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("swap-forget")))
        .memory_ceiling(100)
        .swap_delay_ms(0)
        .open();
    s.set(&pattern(1000));
    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));

    s.set("small again");
    assert_eq!(s.swap_state(), None);
    assert_eq!(s.stats().swap_state, None);

    // A large document afterwards gets a fresh job.
    s.set(&pattern(500));
    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));
    assert_eq!(s.text(), pattern(500));
    Ok(())
}
