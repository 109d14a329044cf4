use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use SpoolText::metrics;

use super::util::{fmt_swap, load_store};

#[derive(Debug, Deserialize)]
struct RawOp {
    offset: usize,
    #[serde(default)]
    delete: usize,
    #[serde(default)]
    insert: String,
}

pub fn exec(input: PathBuf, ops: PathBuf, out: Option<PathBuf>, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&ops)
        .with_context(|| format!("read ops file {}", ops.display()))?;
    let ops: Vec<RawOp> =
        serde_json::from_str(&raw).context("parse ops json (array of {offset, delete, insert})")?;

    let mut store = load_store(&input)?;
    let loaded = store.len();
    // Дожидаемся выгрузки, чтобы правки шли уже по файлу
    store.wait_for_swap();

    let t0 = Instant::now();
    for (i, op) in ops.iter().enumerate() {
        let len = store.len();
        if op.offset > len || op.delete > len - op.offset {
            return Err(anyhow!(
                "op #{}: offset {} + delete {} out of range (len={})",
                i,
                op.offset,
                op.delete,
                len
            ));
        }
        store.replace(op.offset, op.delete, &op.insert);
    }
    let elapsed = t0.elapsed();

    store
        .check_invariants()
        .context("store layout check after edits")?;

    match &out {
        Some(p) => {
            let f = File::create(p).with_context(|| format!("create {}", p.display()))?;
            let mut w = BufWriter::new(f);
            store.write_to(&mut w)?;
            w.flush().with_context(|| format!("flush {}", p.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            store.write_to(&mut w)?;
            w.flush()?;
        }
    }

    let stats = store.stats();
    if json {
        let obj = serde_json::json!({
            "input_chars": loaded,
            "ops": ops.len(),
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
            "stats": stats,
            "metrics": metrics::snapshot(),
        });
        // Документ мог уйти в stdout, поэтому сводка идёт в stderr
        if out.is_some() {
            println!("{}", serde_json::to_string_pretty(&obj)?);
        } else {
            eprintln!("{}", serde_json::to_string_pretty(&obj)?);
        }
        return Ok(());
    }

    let summary = format!(
        "Edit: OK\n  input chars = {}\n  ops         = {}\n  result      = {} chars\n  runs        = {}\n  spares      = {} (dead {} chars)\n  swap        = {}\n  elapsed     = {:.2} ms",
        loaded,
        ops.len(),
        stats.length,
        stats.runs,
        stats.spares,
        stats.dead_length,
        fmt_swap(stats.swap_state),
        elapsed.as_secs_f64() * 1000.0,
    );
    if out.is_some() {
        println!("{}", summary);
    } else {
        eprintln!("{}", summary);
    }
    Ok(())
}
