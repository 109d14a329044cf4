use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

use SpoolText::{metrics, StoreBuilder};

use super::util::fmt_swap;

const ALPHABET: &[char] = &['a', 'b', 'c', 'd', 'e', ' ', '\n', 'é', 'ж', '→'];

fn random_text(rng: &mut StdRng, n: usize) -> String {
    (0..n).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())]).collect()
}

pub fn exec(chars: usize, edits: usize, seed: u64, json: bool) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    metrics::reset();

    let initial = random_text(&mut rng, chars);
    let mut model: Vec<char> = initial.chars().collect();
    let mut store = StoreBuilder::new().open();

    let t0 = Instant::now();
    store.set(&initial);
    let swap = store.wait_for_swap();
    let load_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let t1 = Instant::now();
    for _ in 0..edits {
        let len = model.len();
        let offset = rng.gen_range(0..=len);
        let delete = if len > offset && rng.gen_bool(0.5) {
            rng.gen_range(0..=(len - offset).min(16))
        } else {
            0
        };
        let ins_len = rng.gen_range(0..=16);
        let insert = random_text(&mut rng, ins_len);

        store.replace(offset, delete, &insert);
        model.splice(offset..offset + delete, insert.chars());
    }
    let edit_ms = t1.elapsed().as_secs_f64() * 1000.0;

    let t2 = Instant::now();
    let got = store.text();
    let read_ms = t2.elapsed().as_secs_f64() * 1000.0;

    let want: String = model.iter().collect();
    if got != want {
        return Err(anyhow!(
            "content mismatch after {} edits (store {} chars, model {} chars)",
            edits,
            got.chars().count(),
            model.len()
        ));
    }
    store.check_invariants()?;

    let stats = store.stats();
    let m = metrics::snapshot();
    if json {
        let obj = serde_json::json!({
            "chars": chars,
            "edits": edits,
            "seed": seed,
            "load_ms": load_ms,
            "edit_ms": edit_ms,
            "read_ms": read_ms,
            "swap": swap,
            "stats": stats,
            "metrics": m,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("Bench: OK (seed={})", seed);
    println!("  load   {:>8} chars   {:>10.2} ms   swap={}", chars, load_ms, fmt_swap(swap));
    println!(
        "  edit   {:>8} ops     {:>10.2} ms   ({:.2} us/op)",
        edits,
        edit_ms,
        if edits > 0 { edit_ms * 1000.0 / edits as f64 } else { 0.0 }
    );
    println!("  read   {:>8} chars   {:>10.2} ms", stats.length, read_ms);
    println!(
        "  layout runs={} spares={} dead={} scratch_files={}",
        stats.runs,
        stats.spares,
        stats.dead_length,
        stats.scratch_files.len()
    );
    println!(
        "  runs: split={} merged={} recycled={} discarded={}; reconciliations={}",
        m.runs_split, m.runs_merged, m.runs_recycled, m.runs_discarded, m.reconciliations
    );
    println!(
        "  pages: hit ratio {:.1}% (evictions {}, flushes {})",
        m.page_hit_ratio() * 100.0,
        m.page_evictions,
        m.page_flushes
    );
    Ok(())
}
