mod snapshot;
mod status;
mod synchronizer;

pub use snapshot::SyncSnapshot;
pub use status::{StatusClass, StatusTable};
pub use synchronizer::{DEFAULT_POLL_INTERVAL, JobSynchronizer, Subscription, SyncPhase};
