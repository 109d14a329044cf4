use anyhow::{Context, Result};
use std::path::Path;

use SpoolText::{StoreBuilder, TextStore};

/// Open a store from env config and load `path` into it.
pub fn load_store(path: &Path) -> Result<TextStore> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read input {}", path.display()))?;
    let mut store = StoreBuilder::new().open();
    store.set(&text);
    Ok(store)
}

pub fn fmt_swap(state: Option<SpoolText::SwapState>) -> String {
    match state {
        Some(s) => format!("{:?}", s),
        None => "none".to_string(),
    }
}
