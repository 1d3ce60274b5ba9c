//! Effect loop around the pure reducer.
//!
//! Split into focused submodules:
//! - `core`: scheduler handle, builder, generation scope, consumer views
//! - `advance`: advancement driver (claim, run, report back)
//! - `pacing`: proximity edges and sensor attachment

mod advance;
mod core;
mod pacing;

pub use self::core::{
    FeedView, NoopNotifier, PrefetchScheduler, PreparedCategory, RevealNotifier, SchedulerBuilder, SchedulerDebug,
};
pub use self::pacing::SensorAttachment;
