//! The Job entity and its lifecycle types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::id::{JobId, WorkloadId};

/// Overall status of a Job. Ordered roughly by lifecycle progression, though
/// [`Phase`] is the authority on phase ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Building,
    Testing,
    Publishing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Terminal statuses are the only ones where the lock has been released
    /// and `finished_at` is guaranteed set (invariant 2, SPEC_FULL §3).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Active statuses hold the per-image-branch lock (invariant 1).
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// The three sequential build phases, plus the "not yet started" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    None,
    Build,
    Test,
    Publish,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::None => "",
            Phase::Build => "build",
            Phase::Test => "test",
            Phase::Publish => "publish",
        }
    }

    /// The phase that follows this one in the fixed `build -> test -> publish`
    /// order, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::None => Some(Phase::Build),
            Phase::Build => Some(Phase::Test),
            Phase::Test => Some(Phase::Publish),
            Phase::Publish => None,
        }
    }
}

/// Start/end instants and derived durations for the Job as a whole and for
/// each phase. Durations are only ever set once an end timestamp lands
/// (invariant 4: idempotent under repeated polling).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub job_start: Option<DateTime<Utc>>,
    pub job_end: Option<DateTime<Utc>>,
    pub build_start: Option<DateTime<Utc>>,
    pub build_end: Option<DateTime<Utc>>,
    pub test_start: Option<DateTime<Utc>>,
    pub test_end: Option<DateTime<Utc>>,
    pub publish_start: Option<DateTime<Utc>>,
    pub publish_end: Option<DateTime<Utc>>,
}

impl JobMetrics {
    pub fn total_duration(&self) -> Option<Duration> {
        Some(self.job_end? - self.job_start?)
    }

    pub fn build_duration(&self) -> Option<Duration> {
        Some(self.build_end? - self.build_start?)
    }

    pub fn test_duration(&self) -> Option<Duration> {
        Some(self.test_end? - self.test_start?)
    }

    pub fn publish_duration(&self) -> Option<Duration> {
        Some(self.publish_end? - self.publish_start?)
    }
}

/// A single captured log line, already prefixed per SPEC_FULL §4.3.4
/// (`[task/stream]` for build/publish, `=== Test Workload N (id) ===` headers
/// for test).
pub type LogLine = String;

/// Captured logs, one ordered sequence per phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobLogs {
    pub build: Vec<LogLine>,
    pub test: Vec<LogLine>,
    pub publish: Vec<LogLine>,
}

impl JobLogs {
    pub fn for_phase(&self, phase: Phase) -> &[LogLine] {
        match phase {
            Phase::Build => &self.build,
            Phase::Test => &self.test,
            Phase::Publish => &self.publish,
            Phase::None => &[],
        }
    }

    pub fn for_phase_mut(&mut self, phase: Phase) -> Option<&mut Vec<LogLine>> {
        match phase {
            Phase::Build => Some(&mut self.build),
            Phase::Test => Some(&mut self.test),
            Phase::Publish => Some(&mut self.publish),
            Phase::None => None,
        }
    }
}

/// The central entity: a single build/test/publish run.
///
/// See SPEC_FULL.md §3 for the full invariant list. Mutation is exclusively
/// the province of `buildforge-driver`, always under the per-Job mutex that
/// `buildforge-monitor` owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub config: BuildConfig,
    pub status: JobStatus,
    pub current_phase: Phase,

    pub build_workload_id: Option<WorkloadId>,
    pub test_workload_ids: Vec<WorkloadId>,
    pub publish_workload_id: Option<WorkloadId>,

    pub lock_key: String,
    pub lock_session_id: String,

    pub logs: JobLogs,
    pub metrics: JobMetrics,

    pub error: Option<String>,
    pub failed_phase: Option<Phase>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Construct a brand-new Job in `PENDING` state. Does not acquire a lock
    /// or submit any workload — that is `Driver::create_job`'s job.
    pub fn new(id: JobId, config: BuildConfig, lock_key: String, lock_session_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            config,
            status: JobStatus::Pending,
            current_phase: Phase::None,
            build_workload_id: None,
            test_workload_ids: Vec::new(),
            publish_workload_id: None,
            lock_key,
            lock_session_id,
            logs: JobLogs::default(),
            metrics: JobMetrics::default(),
            error: None,
            failed_phase: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether this Job was submitted without a test block, in which case
    /// the build phase pushes final tags directly (the fast path).
    pub fn has_tests(&self) -> bool {
        self.config
            .tests
            .as_ref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Derived temp-image ref per SPEC_FULL §3/§6. Only meaningful when
    /// `has_tests()` is true.
    pub fn temp_image_ref(&self, temp_prefix: &str) -> String {
        crate::naming::temp_image_ref(
            &self.config.registry_url,
            temp_prefix,
            &self.config.image_name,
            &self.config.branch,
            self.id,
        )
    }
}
