use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use feedshelf_core::Item;

/// Read the feed items from a JSON array file.
pub fn load_items(path: &Path) -> Result<Vec<Item>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read items from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse items in {}", path.display()))
}

/// Serialize `value` for stdout.
pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("failed to serialize output")
}
