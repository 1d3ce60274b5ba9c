use std::mem;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use feedshelf_core::{CategoryMapping, FinalizedItem, Item, PrefetchConfig};

use crate::classify::{build_queue, classify, generation_key};
use crate::error::PrefetchError;
use crate::metrics::{new_shared_metrics, PrefetchMetrics, SharedMetrics};
use crate::placement::{IdentityPlacement, Placement};
use crate::resolve::ItemResolver;
use crate::runner::CategoryRunner;
use crate::scheduler::drivers::{next_action, Advance, EdgeDetector};
use crate::scheduler::state::{reduce, SchedulerEvent, SchedulerState};
use crate::transport::{HttpTransport, Transport};

/// One-shot signal raised the first time any category becomes ready with items.
pub trait RevealNotifier: Send + Sync {
    fn first_reveal(&self, category: &str);
}

impl<F> RevealNotifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn first_reveal(&self, category: &str) {
        self(category)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl RevealNotifier for NoopNotifier {
    fn first_reveal(&self, _category: &str) {}
}

/// A ready, non-empty category inside the prepared prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedCategory {
    pub name: String,
    pub items: Vec<FinalizedItem>,
}

/// What the surrounding UI renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedView {
    pub categories: Vec<PreparedCategory>,
    pub has_more: bool,
}

impl FeedView {
    pub fn from_state(state: &SchedulerState) -> Self {
        Self {
            categories: state
                .prepared_categories()
                .into_iter()
                .map(|(name, items)| PreparedCategory {
                    name: name.to_string(),
                    items: items.to_vec(),
                })
                .collect(),
            has_more: state.has_more(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}

/// Diagnostic snapshot. `head_*` describe the first non-terminal category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerDebug {
    pub generation: u64,
    pub in_flight: bool,
    pub requested_count: usize,
    pub prepared_count: usize,
    pub queue_len: usize,
    pub last_proximity: bool,
    pub head_category: Option<String>,
    pub head_status: Option<&'static str>,
    pub head_candidates: usize,
}

/// Per-generation bookkeeping, guarded by one mutex.
///
/// Lock order: scope first, then the state channel.
pub(super) struct GenerationScope {
    pub(super) generation: u64,
    pub(super) key: Option<String>,
    pub(super) cancel: CancellationToken,
    pub(super) pacing: EdgeDetector,
    pub(super) disposed: bool,
}

pub(super) struct Inner {
    pub(super) mapping: CategoryMapping,
    pub(super) config: PrefetchConfig,
    pub(super) runner: CategoryRunner,
    pub(super) notifier: Arc<dyn RevealNotifier>,
    pub(super) metrics: SharedMetrics,
    pub(super) state: watch::Sender<SchedulerState>,
    pub(super) scope: Mutex<GenerationScope>,
    pub(super) revealed: AtomicBool,
    /// Parent of every generation token; cancelled on dispose.
    pub(super) shutdown: CancellationToken,
}

impl Inner {
    pub(super) fn lock_scope(&self) -> MutexGuard<'_, GenerationScope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reduce one event into the published state. The caller holds the scope lock.
    pub(super) fn apply(&self, scope: &mut GenerationScope, event: SchedulerEvent) {
        debug!(generation = scope.generation, event = event.kind(), "scheduler event");
        let progressed = matches!(event, SchedulerEvent::CategoryResolved { .. });
        self.state.send_modify(|state| {
            let current = mem::take(state);
            *state = reduce(current, event);
        });

        if progressed {
            let target = scope.pacing.on_progress(&self.state.borrow());
            if let Some(requested_count) = target {
                debug!(generation = scope.generation, requested_count, "pacing re-armed by progress");
                self.apply(scope, SchedulerEvent::RequestMore { requested_count });
            }
        }
    }

    pub(super) fn record(&self, update: impl FnOnce(&mut PrefetchMetrics)) {
        if let Ok(mut metrics) = self.metrics.write() {
            update(&mut metrics);
        }
    }

    pub(super) fn set_items(self: &Arc<Self>, items: &[Item]) -> bool {
        let key = generation_key(items);
        let generation = {
            let mut scope = self.lock_scope();
            if scope.disposed || scope.key.as_deref() == Some(key.as_str()) {
                return false;
            }

            scope.cancel.cancel();
            scope.cancel = self.shutdown.child_token();
            scope.generation += 1;
            scope.key = Some(key);
            scope.pacing.reset();

            let candidates = classify(items, &self.mapping);
            let queue = build_queue(&candidates, &self.mapping);
            let statuses = SchedulerState::initial_statuses(&queue, &candidates);
            info!(
                generation = scope.generation,
                items = items.len(),
                categories = queue.len(),
                "input changed, starting new generation"
            );
            self.record(PrefetchMetrics::record_generation);

            let generation = scope.generation;
            self.apply(
                &mut scope,
                SchedulerEvent::Reset {
                    queue,
                    statuses,
                    candidates,
                    requested_count: self.config.initial_categories,
                },
            );
            generation
        };

        self.advance(generation);
        true
    }

    pub(super) fn debug_snapshot(&self) -> SchedulerDebug {
        let scope = self.lock_scope();
        let state = self.state.borrow();
        let head = state
            .queue
            .iter()
            .find(|name| state.status(name).is_some_and(|status| !status.is_terminal()));
        SchedulerDebug {
            generation: scope.generation,
            in_flight: state.in_flight,
            requested_count: state.requested_count,
            prepared_count: state.prepared_count,
            queue_len: state.queue.len(),
            last_proximity: scope.pacing.last(),
            head_category: head.cloned(),
            head_status: head.and_then(|name| state.status(name)).map(|status| status.label()),
            head_candidates: head.and_then(|name| state.candidates.get(name)).map_or(0, Vec::len),
        }
    }

    pub(super) fn dispose(&self) {
        let mut scope = self.lock_scope();
        if scope.disposed {
            return;
        }
        scope.disposed = true;
        scope.cancel.cancel();
        self.shutdown.cancel();
        debug!(generation = scope.generation, "scheduler disposed");
    }
}

/// Progressive category prefetch scheduler.
///
/// Must be used from within a Tokio runtime: category runs and sensor
/// listeners are spawned as tasks. Dropping the handle disposes it.
pub struct PrefetchScheduler {
    pub(super) inner: Arc<Inner>,
}

impl PrefetchScheduler {
    pub fn builder(
        mapping: CategoryMapping,
        config: PrefetchConfig,
        transport: Arc<dyn Transport>,
    ) -> SchedulerBuilder {
        SchedulerBuilder::new(mapping, config, transport)
    }

    /// Replace the input items. Returns `false` when the content is unchanged
    /// (same ids and codes) or the scheduler is disposed.
    pub fn set_items(&self, items: &[Item]) -> bool {
        self.inner.set_items(items)
    }

    pub fn view(&self) -> FeedView {
        FeedView::from_state(&self.inner.state.borrow())
    }

    /// Current state snapshot.
    pub fn state(&self) -> SchedulerState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    pub fn debug(&self) -> SchedulerDebug {
        self.inner.debug_snapshot()
    }

    pub fn metrics(&self) -> PrefetchMetrics {
        self.inner.metrics.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock_scope().generation
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.inner.config
    }

    /// Wait until nothing is in flight and the advancement driver has nothing to do.
    ///
    /// A category stuck in `loading` after a failed run counts as settled.
    pub async fn settled(&self) -> FeedView {
        let mut rx = self.subscribe();
        let view = match rx.wait_for(|state| !state.in_flight && next_action(state) == Advance::Idle).await {
            Ok(state) => FeedView::from_state(&state),
            Err(_) => self.view(),
        };
        view
    }

    /// Cancel in-flight work and stop reacting to input and proximity.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

/// Assembles a [`PrefetchScheduler`] from its collaborators.
pub struct SchedulerBuilder {
    mapping: CategoryMapping,
    config: PrefetchConfig,
    transport: Arc<dyn Transport>,
    placement: Arc<dyn Placement>,
    notifier: Arc<dyn RevealNotifier>,
    metrics: SharedMetrics,
}

impl SchedulerBuilder {
    pub fn new(mapping: CategoryMapping, config: PrefetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            mapping,
            config,
            transport,
            placement: Arc::new(IdentityPlacement),
            notifier: Arc::new(NoopNotifier),
            metrics: new_shared_metrics(),
        }
    }

    /// Builder backed by an [`HttpTransport`] configured from `config`.
    pub fn http(mapping: CategoryMapping, config: PrefetchConfig) -> Result<Self, PrefetchError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(mapping, config, Arc::new(transport)))
    }

    /// Like [`http`](Self::http), loading the category mapping from a TOML file.
    pub fn http_from_file(mapping_path: impl AsRef<Path>, config: PrefetchConfig) -> Result<Self, PrefetchError> {
        let mapping = CategoryMapping::from_file(mapping_path)?;
        Self::http(mapping, config)
    }

    pub fn placement(mut self, placement: Arc<dyn Placement>) -> Self {
        self.placement = placement;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn RevealNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> PrefetchScheduler {
        let resolver = ItemResolver::new(self.transport).with_metrics(self.metrics.clone());
        let runner = CategoryRunner::new(resolver)
            .with_placement(self.placement)
            .with_concurrency(self.config.fetch_concurrency);
        let shutdown = CancellationToken::new();
        let (state, _) = watch::channel(SchedulerState::default());

        let scope = GenerationScope {
            generation: 0,
            key: None,
            cancel: shutdown.child_token(),
            pacing: EdgeDetector::new(self.config.rearm_on_progress),
            disposed: false,
        };

        PrefetchScheduler {
            inner: Arc::new(Inner {
                mapping: self.mapping,
                config: self.config,
                runner,
                notifier: self.notifier,
                metrics: self.metrics,
                state,
                scope: Mutex::new(scope),
                revealed: AtomicBool::new(false),
                shutdown,
            }),
        }
    }
}
