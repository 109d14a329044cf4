use anyhow::Result;
use std::path::PathBuf;

use SpoolText::metrics;

use super::util::{fmt_swap, load_store};

pub fn exec(input: PathBuf, json: bool) -> Result<()> {
    let mut store = load_store(&input)?;
    store.wait_for_swap();
    store.check_invariants()?;
    let stats = store.stats();

    if json {
        let obj = serde_json::json!({
            "input": input.display().to_string(),
            "config": {
                "page_chars": store.config().page_chars,
                "page_pool": store.config().page_pool,
                "memory_ceiling": store.config().memory_ceiling,
                "scratch_dir": store.config().scratch_dir().display().to_string(),
            },
            "stats": stats,
            "metrics": metrics::snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("Store: {}", input.display());
    println!("  config        = {}", store.config());
    println!("  length        = {} chars", stats.length);
    println!("  runs          = {}", stats.runs);
    println!("  spares        = {} (dead {} chars)", stats.spares, stats.dead_length);
    println!("  scratch files = {} {:?}", stats.scratch_files.len(), stats.scratch_files);
    println!("  memory chars  = {}", stats.memory_chars);
    println!("  swap          = {}", fmt_swap(stats.swap_state));

    let m = metrics::snapshot();
    println!(
        "  page cache    = hits {} / misses {} ({:.1}%), evictions {}",
        m.page_hits,
        m.page_misses,
        m.page_hit_ratio() * 100.0,
        m.page_evictions
    );
    Ok(())
}
