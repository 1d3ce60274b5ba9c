//! Scheduler: pure state machine, driver decisions, and the effect loop.

pub mod drivers;
pub mod orchestrator;
pub mod state;

pub use drivers::{next_action, Advance, EdgeDetector};
pub use orchestrator::{
    FeedView, NoopNotifier, PrefetchScheduler, PreparedCategory, RevealNotifier, SchedulerBuilder, SchedulerDebug,
    SensorAttachment,
};
pub use state::{reduce, CategoryStatus, SchedulerEvent, SchedulerState};
