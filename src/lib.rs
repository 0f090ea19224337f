//! Terminal client for a spreadsheet-to-test-automation pipeline.
//!
//! - [`api`]: HTTP client for the pipeline backend.
//! - [`sync`]: the job synchronizer that keeps a local job list current.
//! - [`dispatch`]: uploads and generate/execute triggers with busy tracking.
//! - [`session`]: the last created job, passed around explicitly.

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod sync;
pub mod ui;

pub use api::{ApiClient, ApiError, JobsApi};
pub use dispatch::{Action, ActionDispatcher, ActionKind, ActionOutcome};
pub use error::ActionError;
pub use session::SessionStore;
pub use sync::{JobSynchronizer, StatusTable, SyncSnapshot};
