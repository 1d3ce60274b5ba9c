//! Category runner: resolves every item of one category into an outcome.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use feedshelf_core::{FinalizedItem, Item};

use crate::placement::{IdentityPlacement, Placement};
use crate::resolve::ItemResolver;

/// Result of a completed category run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CategoryOutcome {
    /// At least one item survived resolution.
    Ready(Vec<FinalizedItem>),
    Empty,
}

impl CategoryOutcome {
    pub fn from_items(items: Vec<FinalizedItem>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Ready(items)
        }
    }

    pub fn valid_count(&self) -> usize {
        match self {
            Self::Ready(items) => items.len(),
            Self::Empty => 0,
        }
    }
}

/// Drives the [`ItemResolver`] over one category.
#[derive(Clone)]
pub struct CategoryRunner {
    resolver: ItemResolver,
    placement: Arc<dyn Placement>,
    concurrency: usize,
}

impl CategoryRunner {
    /// Sequential runner with identity placement.
    pub fn new(resolver: ItemResolver) -> Self {
        Self {
            resolver,
            placement: Arc::new(IdentityPlacement),
            concurrency: 1,
        }
    }

    pub fn with_placement(mut self, placement: Arc<dyn Placement>) -> Self {
        self.placement = placement;
        self
    }

    /// Allow up to `concurrency` item fetches at once. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve a category's items in placement order, then place the
    /// survivors again so the layout reflects what was discarded.
    ///
    /// Returns `None` when `cancel` fired during the run: the result belongs
    /// to a superseded generation and must not be reported.
    pub async fn run(&self, name: &str, items: Vec<Item>, cancel: &CancellationToken) -> Option<CategoryOutcome> {
        let ordered = self.placement.order(items);
        debug!(category = %name, items = ordered.len(), concurrency = self.concurrency, "category run started");

        let resolved = if self.concurrency == 1 {
            let mut resolved = Vec::with_capacity(ordered.len());
            for item in &ordered {
                if cancel.is_cancelled() {
                    break;
                }
                resolved.push(self.resolver.resolve(item, cancel).await);
            }
            resolved
        } else {
            futures::stream::iter(ordered.into_iter().map(|item| {
                let resolver = self.resolver.clone();
                let cancel = cancel.clone();
                async move { resolver.resolve(&item, &cancel).await }
            }))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
        };

        if cancel.is_cancelled() {
            debug!(category = %name, "category run superseded");
            return None;
        }

        let survivors = self.place_survivors(resolved.into_iter().flatten().collect());
        let outcome = CategoryOutcome::from_items(survivors);
        debug!(category = %name, valid = outcome.valid_count(), "category run finished");
        Some(outcome)
    }

    fn place_survivors(&self, survivors: Vec<FinalizedItem>) -> Vec<FinalizedItem> {
        let items: Vec<Item> = survivors.iter().map(|finalized| finalized.item.clone()).collect();
        let mut by_id: HashMap<String, VecDeque<FinalizedItem>> = HashMap::new();
        for finalized in survivors {
            by_id.entry(finalized.id().to_string()).or_default().push_back(finalized);
        }

        self.placement
            .order(items)
            .into_iter()
            .filter_map(|item| by_id.get_mut(&item.id).and_then(VecDeque::pop_front))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use feedshelf_core::{DataSource, DataSourceOptions};

    use crate::error::TransportError;
    use crate::transport::Transport;

    /// Replies with the URL's last path segment; `/empty` yields an invalid payload.
    /// Earlier items sleep longer so concurrent completion order is reversed.
    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn fetch(&self, source: &DataSource, cancel: &CancellationToken) -> Result<Value, TransportError> {
            let tail = source.url.rsplit('/').next().unwrap_or_default().to_string();
            let delay: u64 = tail.trim_start_matches('d').parse().unwrap_or(0);
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
            if tail == "empty" {
                Ok(json!({}))
            } else {
                Ok(json!({ "tail": tail }))
            }
        }
    }

    fn fetching(id: &str, path: &str) -> Item {
        Item::new(id, "code").with_data_source(DataSource {
            url: format!("/api/{path}"),
            method: None,
            options: DataSourceOptions::default(),
        })
    }

    fn runner() -> CategoryRunner {
        CategoryRunner::new(ItemResolver::new(Arc::new(EchoTransport)))
    }

    fn ids(outcome: &CategoryOutcome) -> Vec<String> {
        match outcome {
            CategoryOutcome::Ready(items) => items.iter().map(|i| i.id().to_string()).collect(),
            CategoryOutcome::Empty => Vec::new(),
        }
    }

    struct Descending;

    impl Placement for Descending {
        fn order(&self, mut items: Vec<Item>) -> Vec<Item> {
            items.sort_by(|a, b| b.id.cmp(&a.id));
            items
        }
    }

    #[tokio::test]
    async fn ready_when_items_survive() {
        let items = vec![fetching("a", "d0"), Item::new("b", "code"), fetching("c", "empty")];
        let outcome = runner().run("X", items, &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&outcome), vec!["a", "b"]);
        assert_eq!(outcome.valid_count(), 2);
    }

    #[tokio::test]
    async fn empty_when_everything_is_discarded() {
        let items = vec![fetching("a", "empty")];
        let outcome = runner().run("X", items, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, CategoryOutcome::Empty);
    }

    #[tokio::test]
    async fn output_follows_placement_order() {
        let items = vec![Item::new("a", "code"), Item::new("b", "code"), Item::new("c", "code")];
        let outcome = runner()
            .with_placement(Arc::new(Descending))
            .run("X", items, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn discarded_major_changes_the_interleave() {
        use feedshelf_core::SizeClass;

        let items = vec![
            fetching("M1", "empty").with_size(SizeClass::Major),
            Item::new("M2", "code").with_size(SizeClass::Major),
            Item::new("a", "code").with_size(SizeClass::Minor),
            Item::new("b", "code").with_size(SizeClass::Minor),
            Item::new("c", "code").with_size(SizeClass::Minor),
            Item::new("d", "code").with_size(SizeClass::Minor),
        ];
        let outcome = runner()
            .with_placement(Arc::new(crate::placement::SizeInterleavePlacement))
            .run("X", items, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["M2", "a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn concurrent_run_places_survivors() {
        let items = vec![fetching("a", "d10"), fetching("b", "empty"), fetching("c", "d0")];
        let outcome = runner()
            .with_concurrency(2)
            .with_placement(Arc::new(Descending))
            .run("X", items, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn concurrent_run_preserves_order() {
        let items = vec![fetching("slow", "d40"), fetching("mid", "d20"), fetching("fast", "d0")];
        let outcome = runner()
            .with_concurrency(3)
            .run("X", items, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["slow", "mid", "fast"]);
    }

    #[tokio::test]
    async fn cancelled_run_reports_nothing() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let items = vec![fetching("a", "d5000"), fetching("b", "d0")];
        let outcome = tokio::time::timeout(Duration::from_secs(2), runner().run("X", items, &cancel))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
