use anyhow::Result;
use std::fs::OpenOptions;
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

#[test]
fn typing_at_the_end_stays_one_run() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("typing-end")))
        .open();
    s.set("");
    for c in "the quick brown fox jumps over the lazy dog".chars() {
        let at = s.len();
        s.replace(at, 0, &c.to_string());
    }
    assert_eq!(s.text(), "the quick brown fox jumps over the lazy dog");
    assert_eq!(s.run_count(), 1, "contiguous appends must coalesce");
    s.check_invariants()?;
    Ok(())
}

#[test]
fn typing_in_the_middle_adds_one_run_plus_split() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("typing-mid")))
        .open();
    s.set("abcdef");
    for (i, c) in "XYZW".chars().enumerate() {
        s.replace(3 + i, 0, &c.to_string());
    }
    assert_eq!(s.text(), "abcXYZWdef");
    // "abc" (memory) + "XYZW" (scratch) + "def" (memory)
    assert_eq!(s.run_count(), 3);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn deleted_scratch_text_is_recycled() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("recycle")))
        .reconcile_ratio(1.0e9)
        .open();
    s.set("");
    s.replace(0, 0, "abcdefghij");
    assert_eq!(s.spare_count(), 0);

    s.replace(0, 5, "");
    assert_eq!(s.text(), "fghij");
    assert_eq!(s.spare_count(), 1);
    assert_eq!(s.dead_length(), 5);
    s.check_invariants()?;

    let before = metrics::snapshot().runs_recycled;
    s.replace(0, 0, "XYZ");
    assert_eq!(s.text(), "XYZfghij");
    // 3 of the 5 spare chars reused, the remainder stays spare.
    assert_eq!(s.dead_length(), 2);
    assert_eq!(s.spare_count(), 1);
    assert!(metrics::snapshot().runs_recycled > before);
    s.check_invariants()?;

    s.replace(8, 0, "!!!!");
    assert_eq!(s.text(), "XYZfghij!!!!");
    assert_eq!(s.dead_length(), 0);
    assert_eq!(s.spare_count(), 0);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn deleting_snapshot_text_leaves_no_spares() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("snapshot-delete")))
        .open();
    s.set("0123456789");
    s.replace(2, 5, "");
    assert_eq!(s.text(), "01789");
    assert_eq!(s.spare_count(), 0, "read-only storage is never recycled");
    assert_eq!(s.dead_length(), 0);
    assert_eq!(s.run_count(), 2);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn dead_capacity_over_ratio_triggers_reconcile() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("auto-reconcile")))
        .reconcile_ratio(0.10)
        .open();
    s.set("");
    let text: String = "0123456789".repeat(10);
    s.replace(0, 0, &text);
    s.replace(50, 0, "-");
    assert_eq!(s.dead_length(), 0);

    let before = metrics::snapshot().reconciliations;
    // 50 dead chars against 51 live ones: far over 10 %.
    s.replace(0, 50, "");
    assert_eq!(s.dead_length(), 0, "reconcile must clear dead capacity");
    assert_eq!(s.spare_count(), 0);
    assert!(metrics::snapshot().reconciliations > before);
    assert_eq!(s.text(), format!("-{}", "0123456789".repeat(5)));
    s.check_invariants()?;
    Ok(())
}

#[test]
fn delete_everything_then_start_fresh() -> Result<()> {
    let root = unique_root("delete-all");
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(root.clone()))
        .open();
    s.set("");
    s.replace(0, 0, "some text typed in");
    s.replace(4, 0, " more");
    let len = s.len();

    s.replace(0, len, "");
    assert!(s.is_empty());
    assert_eq!(s.dead_length(), 0);
    assert_eq!(s.spare_count(), 0);
    assert_eq!(s.run_count(), 0);
    s.check_invariants()?;

    s.set("fresh");
    assert_eq!(s.text(), "fresh");
    s.replace(5, 0, " start");
    assert_eq!(s.text(), "fresh start");
    // Pool files are reused after a reset, not multiplied.
    assert!(s.scratch_file_count() <= 1);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn reconcile_keeps_content_and_drops_fragments() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("reconcile")))
        .reconcile_ratio(1.0e9)
        .open();
    s.set("The cat sat on the mat.");
    s.replace(4, 3, "dog");
    s.replace(15, 3, "a");
    s.replace(0, 0, ">> ");
    s.replace(3, 4, "");
    let want = s.text();
    let runs_before = s.run_count();
    assert!(runs_before > 1);

    let summary = s.reconcile();
    assert!(summary.rewritten);
    assert_eq!(summary.runs_before, runs_before);
    assert_eq!(summary.runs_after, 1);
    assert_eq!(s.text(), want);
    assert_eq!(s.dead_length(), 0);
    s.check_invariants()?;

    // Later edits on the rewritten layout still work.
    s.replace(0, 3, "");
    assert_eq!(s.text(), want[3..].to_string());
    Ok(())
}

#[test]
fn pool_opens_new_files_past_threshold() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("pool")))
        .scratch_file_threshold(32)
        .max_scratch_files(3)
        .open();
    s.set("");
    for i in 0..10 {
        // Insert at the front so appends never coalesce.
        s.replace(0, 0, &format!("{:020}", i));
    }
    assert_eq!(s.len(), 200);
    assert_eq!(s.scratch_file_count(), 3);
    let stats = s.stats();
    assert_eq!(stats.scratch_files.iter().sum::<u64>(), 200);
    s.check_invariants()?;
    Ok(())
}

#[test]
fn unwritable_scratch_dir_falls_back_to_memory() -> Result<()> {
    // A regular file where the scratch directory should be.
    let blocker = unique_root("blocked");
    std::fs::write(&blocker, b"not a directory")?;

    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(blocker.join("sub")))
        .open();
    s.set("Hello, World!");

    let before = metrics::snapshot().insert_fallbacks;
    s.replace(7, 5, "Earth");
    assert_eq!(s.text(), "Hello, Earth!");
    assert!(metrics::snapshot().insert_fallbacks > before);
    assert_eq!(s.scratch_file_count(), 0);

    s.replace(0, 0, ">");
    s.replace(1, 5, "");
    assert_eq!(s.text(), ">, Earth!");
    s.check_invariants()?;

    std::fs::remove_file(&blocker)?;
    Ok(())
}

#[test]
fn reconcile_spreads_content_over_the_pool() -> Result<()> {
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(unique_root("reconcile-spread")))
        .scratch_file_threshold(64)
        .max_scratch_files(4)
        .reconcile_ratio(1.0e9)
        .open();
    s.set("");
    for i in 0..30 {
        s.replace(0, 0, &format!("{:020}", i));
    }
    let want = s.text();
    assert_eq!(s.scratch_file_count(), 4);

    let summary = s.reconcile();
    assert!(summary.rewritten);
    assert_eq!(summary.scratch_files_after, 4);

    let files = s.stats().scratch_files;
    assert_eq!(files.len(), 4);
    assert_eq!(files.iter().sum::<u64>(), 600);
    // Threshold-sized pieces rotate over the pool instead of landing in one file.
    assert!(files.iter().all(|&n| (64..=256).contains(&n)), "{:?}", files);

    assert_eq!(s.text(), want);
    assert_eq!(s.dead_length(), 0);
    s.check_invariants()?;

    s.replace(300, 0, "tail");
    assert_eq!(s.get_range(300, 4), "tail");
    s.check_invariants()?;
    Ok(())
}

#[test]
fn truncated_scratch_file_reads_short() -> Result<()> {
    let root = unique_root("truncated");
    let mut s = StoreBuilder::from_default()
        .scratch_dir(Some(root.clone()))
        .page_chars(16)
        .page_pool(1)
        .memory_ceiling(100)
        .swap_delay_ms(0)
        .open();
    let text: String = (0..40_000)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();
    s.set(&text);
    assert_eq!(s.wait_for_swap(), Some(SwapState::Completed));
    assert_eq!(s.len(), 40_000);

    // Cut the swapped document's file behind the store's back.
    let entries: Vec<PathBuf> = std::fs::read_dir(&root)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(entries.len(), 1);
    OpenOptions::new().write(true).open(&entries[0])?.set_len(0)?;

    let before = metrics::snapshot().truncated_reads;
    let got = s.get_range(0, 100);
    assert!(got.chars().count() < 100, "stale text returned: {:?}", got);
    assert!(text.starts_with(&got));
    assert_eq!(s.get(0), None);
    assert!(metrics::snapshot().truncated_reads > before);

    let mut out: Vec<u8> = Vec::new();
    assert!(s.write_to(&mut out).is_err());

    let summary = s.reconcile();
    assert!(!summary.rewritten);
    assert_eq!(summary.runs_after, summary.runs_before);
    assert_eq!(s.len(), 40_000);
    // Only the damaged file is left; the aborted rewrite removed its own files.
    assert_eq!(std::fs::read_dir(&root)?.count(), 1);
    Ok(())
}
