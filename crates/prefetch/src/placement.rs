//! Placement seam: the order in which a category's items are resolved and shown.

use feedshelf_core::{Item, SizeClass};

/// Pure reorder supplied by the layout component.
pub trait Placement: Send + Sync {
    fn order(&self, items: Vec<Item>) -> Vec<Item>;
}

/// Keeps the input order. Used when no layout component is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPlacement;

impl Placement for IdentityPlacement {
    fn order(&self, items: Vec<Item>) -> Vec<Item> {
        items
    }
}

/// Interleaves minor tiles around the larger ones.
///
/// Each major tile is preceded (unless it opens the grid) and followed by
/// up to two minors, each important tile is followed by one minor, and
/// leftover minors go last.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeInterleavePlacement;

impl Placement for SizeInterleavePlacement {
    fn order(&self, items: Vec<Item>) -> Vec<Item> {
        let (minors, others): (Vec<Item>, Vec<Item>) =
            items.into_iter().partition(|item| item.size == SizeClass::Minor);
        let mut minors = minors.into_iter();
        let mut result = Vec::with_capacity(others.len() + minors.len());

        for item in others {
            match item.size {
                SizeClass::Major => {
                    if !result.is_empty() {
                        result.extend(minors.by_ref().take(2));
                    }
                    result.push(item);
                    result.extend(minors.by_ref().take(2));
                }
                SizeClass::Important => {
                    result.push(item);
                    result.extend(minors.by_ref().take(1));
                }
                _ => result.push(item),
            }
        }

        result.extend(minors);
        result
    }
}
