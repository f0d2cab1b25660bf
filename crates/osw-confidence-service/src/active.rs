//! Job ids with a task in flight

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry of jobs currently being processed
///
/// Requests for one job id share a workspace directory, so at most one of
/// them may run at a time.
#[derive(Debug, Clone, Default)]
pub struct ActiveJobs {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `job_id`; returns `None` while another claim holds it
    pub fn claim(&self, job_id: &str) -> Option<JobClaim> {
        if !self.lock().insert(job_id.to_string()) {
            return None;
        }
        Some(JobClaim { jobs: self.clone(), job_id: job_id.to_string() })
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.lock().contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on a job id, released on drop
#[derive(Debug)]
pub struct JobClaim {
    jobs: ActiveJobs,
    job_id: String,
}

impl JobClaim {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.jobs.lock().remove(&self.job_id);
    }
}
