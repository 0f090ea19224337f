//! The selected job, carried between commands.
//!
//! [`SessionStore`] is an explicit value: `main` builds one and hands it to
//! the [`ActionDispatcher`](crate::dispatch::ActionDispatcher), which records
//! the job id of every successful upload. The `select` command records an
//! existing job the same way. When backed by a state file the value survives
//! across invocations, so `generate` with no `--job` picks up the job that
//! `upload` just created.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::{Job, JobsApi};

/// Persisted session contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_job_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    session: Mutex<Session>,
}

impl SessionStore {
    /// A store that forgets everything when the process exits.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the state file at `path`. A missing file is an empty session.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let session = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Session::default()
        };
        Ok(Self {
            path: Some(path),
            session: Mutex::new(session),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn last_job_id(&self) -> Option<String> {
        self.lock().last_job_id.clone()
    }

    /// Records `job_id` as the default selection.
    ///
    /// Writing the state file is best effort: a failure is logged and the
    /// in-memory value is still updated.
    pub fn remember_job(&self, job_id: &str) {
        let snapshot = {
            let mut session = self.lock();
            session.last_job_id = Some(job_id.to_string());
            session.clone()
        };
        if let Some(path) = &self.path {
            if let Err(e) = write_session(path, &snapshot) {
                tracing::warn!(path = %path.display(), error = %e, "could not persist session");
            }
        }
    }

    /// Default selection among `jobs`: the remembered job while the server
    /// still lists it, otherwise the last listed job.
    pub fn default_job(&self, jobs: &[Job]) -> Option<String> {
        let last = self.last_job_id();
        match last {
            Some(id) if jobs.iter().any(|job| job.id == id) => Some(id),
            _ => jobs.last().map(|job| job.id.clone()),
        }
    }

    /// Picks the job a command acts on.
    ///
    /// A non-blank `explicit` id is used as is, without asking the server.
    /// Otherwise the job list is fetched and [`default_job`](Self::default_job)
    /// decides. When the list cannot be fetched the remembered job is used.
    pub async fn select_job<C: JobsApi>(
        &self,
        explicit: Option<&str>,
        client: &C,
        cancel: &CancellationToken,
    ) -> Option<String> {
        if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        match client.list_jobs(cancel).await {
            Ok(jobs) => self.default_job(&jobs),
            Err(err) => {
                tracing::warn!(error = %err, "could not list jobs, using remembered job");
                self.last_job_id()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json)?;
    Ok(())
}
