pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, ApiRequest, DEFAULT_BASE_URL, JobsApi, Payload, RequestBody};
pub use error::ApiError;
pub use types::{ActionReply, Artifact, Job, Listing, UploadReceipt};
