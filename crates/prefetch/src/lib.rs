pub mod classify;
pub mod error;
pub mod metrics;
pub mod placement;
pub mod resolve;
pub mod runner;
pub mod scheduler;
pub mod transport;

pub use classify::{build_queue, classify, generation_key, Buckets};
pub use error::{PrefetchError, TransportError};
pub use metrics::{new_shared_metrics, ItemOutcome, PrefetchMetrics, SharedMetrics};
pub use placement::{IdentityPlacement, Placement, SizeInterleavePlacement};
pub use resolve::{is_business_data_valid, ItemResolver};
pub use runner::{CategoryOutcome, CategoryRunner};
pub use scheduler::{
    reduce, CategoryStatus, FeedView, NoopNotifier, PrefetchScheduler, PreparedCategory, RevealNotifier,
    SchedulerBuilder, SchedulerDebug, SchedulerEvent, SchedulerState, SensorAttachment,
};
pub use transport::{HttpTransport, Transport};
