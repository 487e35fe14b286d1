//! JobHistory: the archival record a terminal Job is reduced to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::id::JobId;
use crate::job::{Job, JobMetrics, JobStatus};

/// Append-only archival record derived from a terminal [`Job`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistory {
    pub id: JobId,
    pub config: BuildConfig,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub total_duration: Option<Duration>,
    pub metrics: JobMetrics,
    pub error: Option<String>,
}

impl From<&Job> for JobHistory {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            config: job.config.clone(),
            status: job.status,
            created_at: job.created_at,
            total_duration: job.metrics.total_duration(),
            metrics: job.metrics.clone(),
            error: job.error.clone(),
        }
    }
}

/// A page of [`JobHistory`] records, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryPage {
    pub jobs: Vec<JobHistory>,
    pub total: u64,
}
