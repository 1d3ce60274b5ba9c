use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::scheduler::state::SchedulerEvent;

use super::core::{Inner, PrefetchScheduler};

/// Handle given to a proximity sensor watching the trailing "load more" marker.
#[derive(Debug, Clone)]
pub struct SensorAttachment {
    /// Distance from the marker at which the sensor should report `true`.
    pub margin_px: u32,
    signal: mpsc::UnboundedSender<bool>,
}

impl SensorAttachment {
    /// Report the sensor's current value. Returns `false` once the scheduler is gone.
    pub fn report(&self, near: bool) -> bool {
        self.signal.send(near).is_ok()
    }
}

impl Inner {
    pub(super) fn report_proximity(self: &Arc<Self>, near: bool) {
        let generation = {
            let mut scope = self.lock_scope();
            if scope.disposed {
                return;
            }

            let target = scope.pacing.observe(near, &self.state.borrow());
            if let Some(requested_count) = target {
                debug!(generation = scope.generation, requested_count, "proximity rising edge, requesting more");
                self.apply(&mut scope, SchedulerEvent::RequestMore { requested_count });
            } else if near && self.state.borrow().in_flight {
                drop(scope);
                debug!(snapshot = ?self.debug_snapshot(), "proximity while feed is locked");
                return;
            }
            scope.generation
        };

        self.advance(generation);
    }
}

impl PrefetchScheduler {
    /// Feed one sample of the proximity signal.
    pub fn report_proximity(&self, near: bool) {
        self.inner.report_proximity(near);
    }

    /// Attach a proximity sensor. Samples sent through the returned handle are
    /// fed to the pacing driver by a background task until disposal.
    pub fn attach_sensor(&self) -> SensorAttachment {
        let (signal, mut samples) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);
        let shutdown = inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    sample = samples.recv() => match sample {
                        Some(near) => inner.report_proximity(near),
                        None => break,
                    },
                }
            }
            debug!("proximity sensor detached");
        });

        SensorAttachment {
            margin_px: self.inner.config.proximity_margin_px,
            signal,
        }
    }
}
