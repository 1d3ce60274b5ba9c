//! Classifier: raw items → ordered category buckets and the category queue.

use std::collections::HashMap;

use feedshelf_core::{CategoryMapping, Item};

/// Category name → items in input order. Only non-empty buckets are present.
pub type Buckets = HashMap<String, Vec<Item>>;

/// Bucket items by their code. Unknown codes go to the fallback bucket.
pub fn classify(items: &[Item], mapping: &CategoryMapping) -> Buckets {
    let mut buckets: Buckets = HashMap::new();
    for item in items {
        let name = mapping.category_of(&item.code).unwrap_or(mapping.fallback());
        buckets.entry(name.to_string()).or_default().push(item.clone());
    }
    buckets
}

/// Configured categories by ordering key (ties by name), then the fallback
/// category iff its bucket is non-empty.
pub fn build_queue(buckets: &Buckets, mapping: &CategoryMapping) -> Vec<String> {
    let mut queue = mapping.ordered_names();
    if buckets.get(mapping.fallback()).is_some_and(|items| !items.is_empty()) {
        queue.push(mapping.fallback().to_string());
    }
    queue
}

/// Content identity of an input set: sorted `id:code` pairs joined by `|`.
///
/// Two inputs with the same key belong to the same generation regardless
/// of item order or allocation.
pub fn generation_key(items: &[Item]) -> String {
    let mut parts: Vec<String> = items.iter().map(Item::identity).collect();
    parts.sort();
    parts.join("|")
}
