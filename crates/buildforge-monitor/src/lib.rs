//! The Monitor (C4): a single background task that drives progress for every
//! active Job, on a fixed 5 s tick, serialized per Job by the mutex registry
//! in [`registry`].

pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use buildforge_core::history::JobHistory;
use buildforge_core::{Error, Job, JobId, JobStatus};
use buildforge_driver::Driver;
use buildforge_storage::Storage;
use buildforge_webhook::{events_for_transition, Snapshot, WebhookDispatcher};

pub use registry::JobMutexRegistry;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct Monitor {
    driver: Arc<Driver>,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<WebhookDispatcher>,
    registry: Arc<JobMutexRegistry>,
    poll_interval: Duration,
}

impl Monitor {
    pub fn new(driver: Arc<Driver>, storage: Arc<dyn Storage>, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self::with_interval(driver, storage, dispatcher, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        driver: Arc<Driver>,
        storage: Arc<dyn Storage>,
        dispatcher: Arc<WebhookDispatcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            driver,
            storage,
            dispatcher,
            registry: Arc::new(JobMutexRegistry::new()),
            poll_interval,
        }
    }

    /// The mutex registry this Monitor uses, so that other mutating paths
    /// (API cancellation, cleanup, a log read that backfills the cache) can
    /// serialize against the same Job without racing a tick.
    pub fn registry(&self) -> Arc<JobMutexRegistry> {
        self.registry.clone()
    }

    /// Runs forever, one tick per `poll_interval`. Intended to be spawned as
    /// its own task at process startup.
    pub async fn run(&self) {
        loop {
            self.tick().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One polling pass: every active Job is advanced concurrently, each
    /// under its own per-Job mutex.
    pub async fn tick(&self) {
        let jobs = match self.storage.list_jobs().await {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(error = %err, "monitor failed to list active jobs");
                return;
            }
        };

        let mut handles = Vec::new();
        for job in jobs.into_iter().filter(|j| j.status.is_active()) {
            let driver = self.driver.clone();
            let storage = self.storage.clone();
            let dispatcher = self.dispatcher.clone();
            let registry = self.registry.clone();
            handles.push(tokio::spawn(async move {
                process_job(driver, storage, dispatcher, registry, job.id).await;
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "monitor job task panicked");
            }
        }
    }
}

async fn process_job(
    driver: Arc<Driver>,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<WebhookDispatcher>,
    registry: Arc<JobMutexRegistry>,
    job_id: JobId,
) {
    let mutex = registry.mutex_for(job_id);
    let _guard = mutex.lock().await;

    let job = match storage.get_job(job_id).await {
        Ok(job) => job,
        Err(err) => {
            warn!(job_id = %job_id, error = %err, "monitor could not re-read job under lock, skipping tick");
            return;
        }
    };
    if job.status.is_terminal() {
        return;
    }

    let before = job.clone();
    let old_snapshot = Snapshot {
        status: job.status,
        current_phase: job.current_phase,
    };

    match driver.update_job_status(job).await {
        Ok(updated) => {
            let new_snapshot = Snapshot {
                status: updated.status,
                current_phase: updated.current_phase,
            };

            if let Err(err) = storage.update_job(&updated).await {
                error!(job_id = %job_id, error = %err, "monitor failed to persist advanced job");
            }

            if old_snapshot != new_snapshot {
                for event in events_for_transition(old_snapshot, new_snapshot, updated.failed_phase) {
                    dispatcher.dispatch(&updated, &event);
                }
            }
        }
        Err(Error::WorkloadNotFound(detail)) => {
            warn!(job_id = %job_id, detail = %detail, "workload purged from orchestrator, archiving job");
            archive(storage.as_ref(), &before).await;
        }
        Err(err) => {
            error!(job_id = %job_id, error = %err, "monitor failed to advance job");
        }
    }
}

async fn archive(storage: &dyn Storage, job: &Job) {
    let history = JobHistory::from(job);
    if let Err(err) = storage.store_job_history(&history).await {
        error!(job_id = %job.id, error = %err, "failed to archive purged job to history");
    }
    if let Err(err) = storage.delete_job(job.id).await {
        error!(job_id = %job.id, error = %err, "failed to delete archived job from active storage");
    }
}

/// Whether `status` should still be picked up by a subsequent tick. Exposed
/// so [`buildforge_api`](../buildforge_api) can decide when to stop polling
/// a Job for its own status endpoint instead of duplicating this check.
pub fn is_active(status: JobStatus) -> bool {
    status.is_active()
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_core::config::{BuildConfig, PhaseResources};
    use buildforge_driver::DriverConfig;
    use buildforge_orchestrator::{FakeWorkloadClient, RawWorkloadStatus};
    use buildforge_secrets::InMemorySecretProvider;
    use buildforge_storage::InMemoryStorage;
    use std::time::Duration as StdDuration;

    fn build_config() -> BuildConfig {
        BuildConfig {
            repo_url: "https://github.com/acme/widget.git".to_string(),
            git_ref: "main".to_string(),
            branch: "main".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            image_name: "acme/widget".to_string(),
            image_tags: vec!["latest".to_string()],
            registry_url: "registry.example.com".to_string(),
            git_credential_path: None,
            registry_credential_path: None,
            tests: None,
            resources: PhaseResources::default(),
            webhook: None,
            clear_cache: false,
        }
    }

    fn harness() -> (Arc<Driver>, Arc<InMemoryStorage>, Arc<FakeWorkloadClient>) {
        let client = Arc::new(FakeWorkloadClient::new());
        let storage = Arc::new(InMemoryStorage::new());
        let secrets = Arc::new(InMemorySecretProvider::new());
        let mut config = DriverConfig::default();
        config.build_to_test_delay = StdDuration::from_millis(1);
        config.lock_acquire_timeout = chrono::Duration::milliseconds(100);
        let driver = Arc::new(Driver::new(client.clone(), storage.clone(), secrets, config));
        (driver, storage, client)
    }

    #[tokio::test]
    async fn tick_advances_a_completed_build_to_success() {
        let (driver, storage, client) = harness();
        let job = driver.create_job(build_config()).await.unwrap();
        storage.store_job(&job).await.unwrap();

        let build_id = job.build_workload_id.clone().unwrap();
        client.set_status(build_id.as_str(), RawWorkloadStatus::Complete);

        let dispatcher = Arc::new(WebhookDispatcher::new());
        let monitor = Monitor::with_interval(driver, storage.clone(), dispatcher, StdDuration::from_secs(5));
        monitor.tick().await;

        let persisted = storage.get_job(job.id).await.unwrap();
        assert_eq!(persisted.status, JobStatus::Succeeded);
        assert!(persisted.lock_session_id.is_empty());
    }

    #[tokio::test]
    async fn purged_workload_archives_job_and_deletes_active_record() {
        let (driver, storage, client) = harness();
        let job = driver.create_job(build_config()).await.unwrap();
        storage.store_job(&job).await.unwrap();

        let build_id = job.build_workload_id.clone().unwrap();
        client.remove(build_id.as_str());

        let dispatcher = Arc::new(WebhookDispatcher::new());
        let monitor = Monitor::with_interval(driver, storage.clone(), dispatcher, StdDuration::from_secs(5));
        monitor.tick().await;

        assert!(storage.get_job(job.id).await.is_err());
        let history = storage.get_job_history(10, 0).await.unwrap();
        assert_eq!(history.jobs.len(), 1);
        assert_eq!(history.jobs[0].id, job.id);
    }

    #[tokio::test]
    async fn terminal_jobs_are_skipped() {
        let (driver, storage, _client) = harness();
        let mut job = driver.create_job(build_config()).await.unwrap();
        job.status = JobStatus::Failed;
        job.failed_phase = Some(buildforge_core::Phase::Build);
        storage.store_job(&job).await.unwrap();

        let dispatcher = Arc::new(WebhookDispatcher::new());
        let monitor = Monitor::with_interval(driver, storage.clone(), dispatcher, StdDuration::from_secs(5));
        monitor.tick().await;

        let persisted = storage.get_job(job.id).await.unwrap();
        assert_eq!(persisted.status, JobStatus::Failed);
    }
}
