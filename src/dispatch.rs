use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::api::JobsApi;
use crate::error::ActionError;
use crate::session::SessionStore;

/// File extensions the backend accepts for a new job.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".xlsx", ".csv"];

/// The one-shot, state-changing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Upload,
    Generate,
    Execute,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Upload => write!(f, "upload"),
            ActionKind::Generate => write!(f, "generate"),
            ActionKind::Execute => write!(f, "execute"),
        }
    }
}

/// A request to dispatch, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a job from a local `.xlsx` / `.csv` file.
    Upload { path: PathBuf },
    Generate { job_id: String },
    Execute { job_id: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Upload { .. } => ActionKind::Upload,
            Action::Generate { .. } => ActionKind::Generate,
            Action::Execute { .. } => ActionKind::Execute,
        }
    }
}

/// Per-kind view state: the busy flag and what the last attempt reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    pub busy: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Successful result of [`ActionDispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub message: String,
    /// The job the action created or targeted.
    pub job_id: Option<String>,
}

/// Runs uploads and pipeline triggers with duplicate-submission protection.
///
/// Each [`ActionKind`] has its own busy flag: a second dispatch of the same
/// kind while the first is pending fails with [`ActionError::Busy`] and makes
/// no call, while other kinds are unaffected. The flag is cleared on every
/// exit path, including cancellation and the dispatch future being dropped.
pub struct ActionDispatcher<C> {
    client: Arc<C>,
    session: Arc<SessionStore>,
    states: Mutex<HashMap<ActionKind, ActionState>>,
}

impl<C: JobsApi> ActionDispatcher<C> {
    pub fn new(client: Arc<C>, session: Arc<SessionStore>) -> Self {
        Self {
            client,
            session,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn state(&self, kind: ActionKind) -> ActionState {
        self.lock().get(&kind).cloned().unwrap_or_default()
    }

    pub fn is_busy(&self, kind: ActionKind) -> bool {
        self.state(kind).busy
    }

    /// Runs `action` unless one of the same kind is already pending.
    ///
    /// Server errors come back unchanged inside [`ActionError::Api`]. A
    /// successful upload also records the new job in the session store.
    pub async fn dispatch(
        &self,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        let kind = action.kind();
        let _guard = self.begin(kind)?;

        let result = self.run(action, cancel).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(%kind, message = %outcome.message, "action succeeded");
            }
            Err(err) => tracing::warn!(%kind, error = %err, "action failed"),
        }
        self.record(kind, &result);
        result
    }

    async fn run(
        &self,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        match action {
            Action::Upload { path } => {
                let file_name = upload_file_name(&path)?;
                let contents = tokio::fs::read(&path).await?;
                let receipt = self.client.upload_job(&file_name, contents, cancel).await?;
                self.session.remember_job(&receipt.job_id);
                let message = receipt.text().map(str::to_string).unwrap_or_else(|| {
                    format!("Upload successful. Job ID: {}", receipt.job_id)
                });
                Ok(ActionOutcome {
                    kind: ActionKind::Upload,
                    message,
                    job_id: Some(receipt.job_id),
                })
            }
            Action::Generate { job_id } => {
                let job_id = require_job(job_id)?;
                let reply = self.client.trigger_generate(&job_id, cancel).await?;
                Ok(ActionOutcome {
                    kind: ActionKind::Generate,
                    message: reply
                        .text()
                        .unwrap_or("Generation triggered successfully.")
                        .to_string(),
                    job_id: Some(job_id),
                })
            }
            Action::Execute { job_id } => {
                let job_id = require_job(job_id)?;
                let reply = self.client.trigger_execute(&job_id, cancel).await?;
                Ok(ActionOutcome {
                    kind: ActionKind::Execute,
                    message: reply
                        .text()
                        .unwrap_or("Execution triggered successfully.")
                        .to_string(),
                    job_id: Some(job_id),
                })
            }
        }
    }

    fn begin(&self, kind: ActionKind) -> Result<BusyGuard<'_>, ActionError> {
        let mut states = self.lock();
        let state = states.entry(kind).or_default();
        if state.busy {
            tracing::debug!(%kind, "rejecting duplicate submission");
            return Err(ActionError::Busy(kind));
        }
        state.busy = true;
        state.message = None;
        state.error = None;
        Ok(BusyGuard {
            states: &self.states,
            kind,
        })
    }

    fn record(&self, kind: ActionKind, result: &Result<ActionOutcome, ActionError>) {
        let mut states = self.lock();
        let state = states.entry(kind).or_default();
        match result {
            Ok(outcome) => state.message = Some(outcome.message.clone()),
            Err(err) => state.error = Some(err.to_string()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ActionKind, ActionState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the busy flag when dropped, whatever the exit path.
struct BusyGuard<'a> {
    states: &'a Mutex<HashMap<ActionKind, ActionState>>,
    kind: ActionKind,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(&self.kind) {
            state.busy = false;
        }
    }
}

/// Checks that `name` ends in one of [`ACCEPTED_EXTENSIONS`], ignoring case.
pub fn validate_upload_name(name: &str) -> Result<(), ActionError> {
    let lower = name.to_lowercase();
    if ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(ActionError::Validation(
            "Unsupported file type. Please upload a .xlsx or .csv file.".to_string(),
        ))
    }
}

fn upload_file_name(path: &Path) -> Result<String, ActionError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ActionError::Validation("Please choose a .xlsx or .csv file.".into()))?;
    validate_upload_name(name)?;
    Ok(name.to_string())
}

fn require_job(job_id: String) -> Result<String, ActionError> {
    let trimmed = job_id.trim();
    if trimmed.is_empty() {
        return Err(ActionError::Validation("Select a job first.".into()));
    }
    Ok(trimmed.to_string())
}
