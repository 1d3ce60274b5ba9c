//! Per-item resolution: derive a data source, fetch it, validate the payload.
//!
//! Failures never escape this layer. A failed or cancelled fetch degrades
//! the item to an unfetched render; an invalid payload drops the item.

mod source;
mod validate;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use feedshelf_core::{FinalizedItem, Item};

use crate::error::TransportError;
use crate::metrics::{new_shared_metrics, ItemOutcome, SharedMetrics};
use crate::transport::Transport;

pub use self::source::{derive_data_source, migrate_legacy_trigger, DerivedSource};
pub use self::validate::is_business_data_valid;

/// Resolves single items against a [`Transport`].
#[derive(Clone)]
pub struct ItemResolver {
    transport: Arc<dyn Transport>,
    metrics: SharedMetrics,
}

impl ItemResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            metrics: new_shared_metrics(),
        }
    }

    /// Record outcomes into an existing metrics handle.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Resolve one item. `None` means the item is dropped from its category.
    pub async fn resolve(&self, item: &Item, cancel: &CancellationToken) -> Option<FinalizedItem> {
        if item.kind.is_self_contained() {
            self.record(ItemOutcome::Passthrough);
            return Some(FinalizedItem::unfetched(item));
        }

        let Some(derived) = derive_data_source(item) else {
            self.record(ItemOutcome::Passthrough);
            return Some(FinalizedItem::unfetched(item));
        };

        if cancel.is_cancelled() {
            debug!(item_id = %item.id, "cancelled before fetch, finalizing without data");
            self.record(ItemOutcome::Degraded);
            return Some(FinalizedItem::unfetched(item));
        }

        match self.transport.fetch(&derived.source, cancel).await {
            Ok(data) if is_business_data_valid(&data) => {
                self.record(ItemOutcome::Prefetched);
                Some(FinalizedItem::prefetched(item, derived.body, data))
            }
            Ok(_) => {
                debug!(item_id = %item.id, code = %item.code, "payload failed validation, dropping item");
                self.record(ItemOutcome::Discarded);
                None
            }
            Err(TransportError::Cancelled) => {
                debug!(item_id = %item.id, "fetch cancelled, finalizing without data");
                self.record(ItemOutcome::Degraded);
                Some(FinalizedItem::unfetched(item))
            }
            Err(e) => {
                warn!(item_id = %item.id, code = %item.code, error = %e, "prefetch failed, rendering unfetched");
                self.record(ItemOutcome::Degraded);
                Some(FinalizedItem::unfetched(item))
            }
        }
    }

    fn record(&self, outcome: ItemOutcome) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_item(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use feedshelf_core::{DataSource, DataSourceOptions, ItemKind};

    /// Transport answering every fetch with a fixed result.
    struct FixedTransport {
        reply: Mutex<Option<Result<Value, TransportError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FixedTransport {
        fn ok(value: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(value))),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Err(TransportError::Status(500)))),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn fetch(&self, source: &DataSource, _cancel: &CancellationToken) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(source.url.clone());
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(TransportError::Decode("exhausted".into())))
        }
    }

    fn fetching_item() -> Item {
        Item::new("w1", "absences:vacations").with_data_source(DataSource {
            url: "/api/vacations".into(),
            method: None,
            options: DataSourceOptions::default(),
        })
    }

    #[tokio::test]
    async fn self_contained_items_skip_fetch() {
        let transport = FixedTransport::ok(json!({"x": 1}));
        let resolver = ItemResolver::new(transport.clone());
        let item = fetching_item().with_kind(ItemKind::Imported);

        let resolved = resolver.resolve(&item, &CancellationToken::new()).await.unwrap();
        assert!(!resolved.is_prefetched());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn items_without_source_pass_through() {
        let transport = FixedTransport::ok(json!({"x": 1}));
        let resolver = ItemResolver::new(transport.clone());

        let resolved = resolver.resolve(&Item::new("w2", "x"), &CancellationToken::new()).await.unwrap();
        assert!(resolved.data.is_none());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn valid_payload_is_attached() {
        let metrics = new_shared_metrics();
        let resolver = ItemResolver::new(FixedTransport::ok(json!({"days": 12}))).with_metrics(metrics.clone());

        let resolved = resolver.resolve(&fetching_item(), &CancellationToken::new()).await.unwrap();
        assert_eq!(resolved.data, Some(json!({"days": 12})));
        assert!(resolved.item.data_source.is_none());
        assert_eq!(metrics.read().unwrap().items_prefetched, 1);
    }

    #[tokio::test]
    async fn invalid_payload_discards_item() {
        let metrics = new_shared_metrics();
        let resolver = ItemResolver::new(FixedTransport::ok(json!([]))).with_metrics(metrics.clone());

        assert!(resolver.resolve(&fetching_item(), &CancellationToken::new()).await.is_none());
        assert_eq!(metrics.read().unwrap().items_discarded, 1);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_unfetched() {
        let resolver = ItemResolver::new(FixedTransport::failing());

        let resolved = resolver.resolve(&fetching_item(), &CancellationToken::new()).await.unwrap();
        assert!(resolved.data.is_none());
        // the source stays so the renderer can fetch on its own
        assert!(resolved.item.data_source.is_some());
    }

    #[tokio::test]
    async fn cancelled_token_skips_fetch() {
        let transport = FixedTransport::ok(json!({"x": 1}));
        let resolver = ItemResolver::new(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let resolved = resolver.resolve(&fetching_item(), &cancel).await.unwrap();
        assert!(resolved.data.is_none());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn legacy_trigger_is_fetched_and_stripped() {
        let transport = FixedTransport::ok(json!("hello"));
        let resolver = ItemResolver::new(transport.clone());
        let item = Item::new("w3", "x").with_body(json!({
            "triggers": {"onMount": {"action": [{"type": "http.get", "url": "/legacy"}]}}
        }));

        let resolved = resolver.resolve(&item, &CancellationToken::new()).await.unwrap();
        assert_eq!(resolved.data, Some(json!("hello")));
        assert!(resolved.item.body.get("triggers").is_none());
        assert_eq!(transport.calls.lock().unwrap().as_slice(), ["/legacy".to_string()]);
    }
}
