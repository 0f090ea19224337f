use crate::api::{ApiError, Job};

/// The synchronizer's best-known view of the job list.
///
/// Either the result of the most recent successful poll, or that result with
/// an error attached. A failed poll never clears known jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub jobs: Vec<Job>,
    pub error: Option<String>,
}

impl SyncSnapshot {
    /// Folds one poll outcome into the snapshot.
    pub fn apply(&mut self, outcome: Result<Vec<Job>, ApiError>) {
        match outcome {
            Ok(jobs) => {
                self.jobs = jobs;
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
