use thiserror::Error;

use crate::api::ApiError;
use crate::dispatch::ActionKind;

/// Why a dispatched action did not run to a successful reply.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The same kind of action is still pending.
    #[error("{0} already in progress")]
    Busy(ActionKind),

    /// A client-side precondition failed; nothing was sent.
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Passed through unchanged so the view can show the server's text.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ActionError {
    pub fn is_busy(&self) -> bool {
        matches!(self, ActionError::Busy(_))
    }
}
