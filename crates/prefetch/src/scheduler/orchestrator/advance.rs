use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use feedshelf_core::{FailedCategoryPolicy, Item};

use crate::error::PrefetchError;
use crate::metrics::PrefetchMetrics;
use crate::runner::CategoryOutcome;
use crate::scheduler::drivers::{next_action, Advance};
use crate::scheduler::state::{CategoryStatus, SchedulerEvent};

use super::core::{GenerationScope, Inner};

/// A category claimed under the single-flight lock, ready to run.
struct Claim {
    generation: u64,
    name: String,
    items: Vec<Item>,
    cancel: CancellationToken,
}

impl Inner {
    /// Run the advancement driver once for `generation`.
    ///
    /// Safe to call redundantly: the claim is checked and taken atomically,
    /// so at most one category is ever loading.
    pub(super) fn advance(self: &Arc<Self>, generation: u64) {
        if let Some(claim) = self.claim(generation) {
            self.spawn_run(claim);
        }
    }

    fn claim(&self, generation: u64) -> Option<Claim> {
        let mut scope = self.lock_scope();
        loop {
            if !self.is_current(&scope, generation) {
                return None;
            }

            let action = next_action(&self.state.borrow());
            match action {
                Advance::Idle => return None,
                Advance::Settle {
                    name,
                    status,
                    prepared_count,
                } => {
                    debug!(generation, category = %name, prepared_count, "settling prepared prefix");
                    self.apply(
                        &mut scope,
                        SchedulerEvent::CategoryResolved {
                            name,
                            status,
                            prepared_count,
                        },
                    );
                }
                Advance::Load(name) => {
                    let items = self.state.borrow().candidates.get(&name).cloned().unwrap_or_default();
                    let cancel = scope.cancel.clone();
                    self.apply(&mut scope, SchedulerEvent::CategoryLoading { name: name.clone() });
                    return Some(Claim {
                        generation,
                        name,
                        items,
                        cancel,
                    });
                }
            }
        }
    }

    fn spawn_run(self: &Arc<Self>, claim: Claim) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let Claim {
                generation,
                name,
                items,
                cancel,
            } = claim;
            debug!(generation, category = %name, items = items.len(), "category loading");

            // Run in its own task so a panic surfaces as a JoinError instead of
            // leaving the lock held.
            let runner = inner.runner.clone();
            let run_name = name.clone();
            let handle = tokio::spawn(async move { runner.run(&run_name, items, &cancel).await });

            match handle.await {
                Ok(Some(outcome)) => inner.complete(generation, &name, outcome),
                Ok(None) => inner.drop_stale(generation, &name),
                Err(e) => inner.fail(generation, &name, PrefetchError::Runner(e.to_string())),
            }
            inner.advance(generation);
        });
    }

    fn complete(&self, generation: u64, name: &str, outcome: CategoryOutcome) {
        let valid_count = outcome.valid_count();
        let reveal = {
            let mut scope = self.lock_scope();
            if !self.is_current(&scope, generation) {
                self.drop_stale(generation, name);
                return;
            }

            let status = CategoryStatus::from(outcome);
            let prepared_count = self.state.borrow().terminal_prefix_with(name, &status);
            self.record(|m| m.record_category(valid_count));
            debug!(generation, category = %name, valid_count, prepared_count, "category resolved");
            self.apply(
                &mut scope,
                SchedulerEvent::CategoryResolved {
                    name: name.to_string(),
                    status,
                    prepared_count,
                },
            );
            valid_count > 0 && !self.revealed.swap(true, Ordering::AcqRel)
        };

        if reveal {
            info!(generation, category = %name, "first category revealed");
            self.notifier.first_reveal(name);
        }
    }

    fn fail(&self, generation: u64, name: &str, error: PrefetchError) {
        let mut scope = self.lock_scope();
        if !self.is_current(&scope, generation) {
            self.drop_stale(generation, name);
            return;
        }

        self.record(PrefetchMetrics::record_failure);
        match self.config.failed_category_policy {
            FailedCategoryPolicy::Stuck => {
                warn!(generation, category = %name, error = %error, "category run failed, leaving it loading");
                self.apply(&mut scope, SchedulerEvent::CategoryFailed);
            }
            FailedCategoryPolicy::Skip => {
                warn!(generation, category = %name, error = %error, "category run failed, skipping it as empty");
                let status = CategoryStatus::Empty;
                let prepared_count = self.state.borrow().terminal_prefix_with(name, &status);
                self.apply(
                    &mut scope,
                    SchedulerEvent::CategoryResolved {
                        name: name.to_string(),
                        status,
                        prepared_count,
                    },
                );
            }
        }
    }

    fn drop_stale(&self, generation: u64, name: &str) {
        debug!(generation, category = %name, "dropping result of superseded generation");
        self.record(PrefetchMetrics::record_stale);
    }

    fn is_current(&self, scope: &GenerationScope, generation: u64) -> bool {
        !scope.disposed && scope.generation == generation
    }
}
