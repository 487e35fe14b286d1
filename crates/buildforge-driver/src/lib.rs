//! The Driver (C3): the heart of the system. Drives a Job through
//! `PENDING -> BUILDING -> [TESTING] -> PUBLISHING -> {SUCCEEDED, FAILED}`.
//!
//! `update_job_status` is the phase-transition engine described in
//! SPEC_FULL §4.3.2: idempotent under repeated invocation, tolerant of
//! partial prior updates, and the sole place phase-end timestamps are
//! written (at most once each).

pub mod config;
pub mod logs;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use buildforge_core::config::BuildConfig;
use buildforge_core::job::Phase;
use buildforge_core::{Error, Job, JobId, JobStatus, Result, WorkloadId};
use buildforge_lock::LockCoordinator;
use buildforge_orchestrator::{WorkloadClient, WorkloadStatus};
use buildforge_secrets::SecretProvider;
use buildforge_storage::Storage;

pub use config::DriverConfig;

pub struct Driver {
    client: Arc<dyn WorkloadClient>,
    storage: Arc<dyn Storage>,
    secrets: Arc<dyn SecretProvider>,
    lock: LockCoordinator,
    config: DriverConfig,
}

impl Driver {
    pub fn new(
        client: Arc<dyn WorkloadClient>,
        storage: Arc<dyn Storage>,
        secrets: Arc<dyn SecretProvider>,
        config: DriverConfig,
    ) -> Self {
        let lock = LockCoordinator::new(storage.clone());
        Self {
            client,
            storage,
            secrets,
            lock,
            config,
        }
    }

    /// SPEC_FULL §4.3.1. Every error path between lock acquisition and the
    /// returned Job releases the lock before propagating.
    pub async fn create_job(&self, build_config: BuildConfig) -> Result<Job> {
        let lock_key = self.lock.key_for(
            &build_config.registry_url,
            &build_config.image_name,
            &build_config.branch,
        );
        let session_id = self
            .lock
            .acquire(&lock_key, self.config.lock_acquire_timeout)
            .await?;

        let job_id = JobId::new();
        let mut job = Job::new(job_id, build_config, lock_key.clone(), session_id.clone());
        job.metrics.job_start = Some(Utc::now());

        let build_spec = buildforge_jobspec::build_spec(&job);

        if let Err(err) = self.secrets.validate_templates(&build_spec.secret_templates).await {
            error!(job_id = %job_id, error = %err, "secret template validation failed, aborting create_job");
            self.lock.release(&lock_key, &session_id).await;
            return Err(err);
        }

        let (workload_id, _eval_id) = match self.client.submit(build_spec).await {
            Ok(submitted) => submitted,
            Err(err) => {
                error!(job_id = %job_id, error = %err, "build submission failed, aborting create_job");
                self.lock.release(&lock_key, &session_id).await;
                return Err(err.into());
            }
        };

        let now = Utc::now();
        job.status = JobStatus::Building;
        job.current_phase = Phase::Build;
        job.build_workload_id = Some(WorkloadId::new(workload_id));
        job.metrics.build_start = Some(now);
        job.started_at = Some(now);
        job.touch();

        info!(job_id = %job_id, phase = "build", status = "BUILDING", "job created");
        Ok(job)
    }

    /// SPEC_FULL §4.3.2. Idempotent: calling this twice with no intervening
    /// orchestrator change must produce byte-equal Jobs.
    pub async fn update_job_status(&self, mut job: Job) -> Result<Job> {
        match job.current_phase {
            Phase::Build => self.advance_build(&mut job).await?,
            Phase::Test => self.advance_test(&mut job).await?,
            Phase::Publish => self.advance_publish(&mut job).await?,
            Phase::None => {}
        }
        Ok(job)
    }

    async fn advance_build(&self, job: &mut Job) -> Result<()> {
        let workload_id = job
            .build_workload_id
            .clone()
            .ok_or_else(|| Error::Internal("building job has no build_workload_id".to_string()))?;
        let status = self.client.status(workload_id.as_str()).await?;

        match status {
            WorkloadStatus::Pending | WorkloadStatus::Running | WorkloadStatus::Unknown => {
                job.status = JobStatus::Building;
                Ok(())
            }
            WorkloadStatus::Complete => {
                self.capture_single_phase_logs(job, Phase::Build, workload_id.as_str())
                    .await;
                let now = Utc::now();
                if job.metrics.build_end.is_none() {
                    job.metrics.build_end = Some(now);
                }

                if !job.has_tests() {
                    self.finish_success(job).await;
                    info!(job_id = %job.id, phase = "build", status = "SUCCEEDED", "fast path build completed");
                    return Ok(());
                }

                tokio::time::sleep(self.config.build_to_test_delay).await;
                self.start_test_phase(job).await
            }
            WorkloadStatus::Failed => {
                self.capture_single_phase_logs(job, Phase::Build, workload_id.as_str())
                    .await;
                let detail = self.failure_detail(workload_id.as_str()).await;
                self.fail_job(job, Phase::Build, detail).await;
                Ok(())
            }
        }
    }

    async fn advance_test(&self, job: &mut Job) -> Result<()> {
        let ids: Vec<String> = if job.test_workload_ids.is_empty() {
            logs::discover_test_workload_ids(self.client.as_ref(), &job.id.to_string()).await
        } else {
            job.test_workload_ids.iter().map(|id| id.as_str().to_string()).collect()
        };

        let mut statuses = Vec::with_capacity(ids.len());
        for id in &ids {
            statuses.push((id.clone(), self.client.status(id).await?));
        }

        if statuses.iter().any(|(_, s)| *s == WorkloadStatus::Running) {
            job.status = JobStatus::Testing;
            return Ok(());
        }

        if let Some((failing_id, _)) = statuses.iter().find(|(_, s)| *s == WorkloadStatus::Failed) {
            let lines = logs::capture_test_logs(self.client.as_ref(), &ids).await;
            if let Some(existing) = job.logs.for_phase_mut(Phase::Test) {
                if existing.is_empty() {
                    *existing = lines;
                }
            }
            let detail = format!(
                "test workload {failing_id} failed: {}",
                self.failure_detail(failing_id).await
            );
            self.fail_job(job, Phase::Test, detail).await;
            return Ok(());
        }

        if !statuses.is_empty() && statuses.iter().all(|(_, s)| *s == WorkloadStatus::Complete) {
            let lines = logs::capture_test_logs(self.client.as_ref(), &ids).await;
            if let Some(existing) = job.logs.for_phase_mut(Phase::Test) {
                if existing.is_empty() {
                    *existing = lines;
                }
            }
            if job.metrics.test_end.is_none() {
                job.metrics.test_end = Some(Utc::now());
            }
            return self.start_publish_phase(job).await;
        }

        job.status = JobStatus::Testing;
        Ok(())
    }

    async fn advance_publish(&self, job: &mut Job) -> Result<()> {
        let workload_id = job
            .publish_workload_id
            .clone()
            .ok_or_else(|| Error::Internal("publishing job has no publish_workload_id".to_string()))?;
        let status = self.client.status(workload_id.as_str()).await?;

        match status {
            WorkloadStatus::Pending | WorkloadStatus::Running | WorkloadStatus::Unknown => {
                job.status = JobStatus::Publishing;
                Ok(())
            }
            WorkloadStatus::Complete => {
                self.capture_single_phase_logs(job, Phase::Publish, workload_id.as_str())
                    .await;
                self.finish_success(job).await;
                Ok(())
            }
            WorkloadStatus::Failed => {
                self.capture_single_phase_logs(job, Phase::Publish, workload_id.as_str())
                    .await;
                let detail = self.failure_detail(workload_id.as_str()).await;
                self.fail_job(job, Phase::Publish, detail).await;
                Ok(())
            }
        }
    }

    /// SPEC_FULL §4.3.3. Resolves the build node to apply a `node !=
    /// build_node` affinity; falls back to no affinity if unresolvable
    /// rather than failing. Persists the recorded ids to Storage immediately
    /// as a belt-and-suspenders measure alongside the discovery fallback.
    async fn start_test_phase(&self, job: &mut Job) -> Result<()> {
        let build_workload_id = job
            .build_workload_id
            .clone()
            .expect("build phase must have submitted before starting tests");
        let build_node = self
            .client
            .allocations(build_workload_id.as_str())
            .await
            .ok()
            .and_then(|allocs| allocs.into_iter().next())
            .map(|alloc| alloc.node_id);

        let specs = buildforge_jobspec::test_specs(job, build_node.as_deref());
        let mut submitted = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.client.submit(spec).await {
                Ok((workload_id, _eval_id)) => submitted.push(WorkloadId::new(workload_id)),
                Err(err) => {
                    error!(job_id = %job.id, error = %err, "test phase submission failed, aborting without partial ids");
                    return Err(Error::TestPhaseSubmitFailed(err.to_string()));
                }
            }
        }

        job.test_workload_ids = submitted;
        job.status = JobStatus::Testing;
        job.current_phase = Phase::Test;
        job.metrics.test_start = Some(Utc::now());
        job.touch();
        if let Err(err) = self.storage.update_job(job).await {
            warn!(job_id = %job.id, error = %err, "failed to persist test_workload_ids immediately; discovery fallback will be relied on");
        }
        info!(job_id = %job.id, phase = "test", status = "TESTING", "test phase started");
        Ok(())
    }

    async fn start_publish_phase(&self, job: &mut Job) -> Result<()> {
        let spec = buildforge_jobspec::publish_spec(job);
        let (workload_id, _eval_id) = self.client.submit(spec).await.map_err(|err| {
            error!(job_id = %job.id, error = %err, "publish phase submission failed");
            Error::from(err)
        })?;

        job.publish_workload_id = Some(WorkloadId::new(workload_id));
        job.status = JobStatus::Publishing;
        job.current_phase = Phase::Publish;
        job.metrics.publish_start = Some(Utc::now());
        job.touch();
        info!(job_id = %job.id, phase = "publish", status = "PUBLISHING", "publish phase started");
        Ok(())
    }

    async fn finish_success(&self, job: &mut Job) {
        let now = Utc::now();
        job.status = JobStatus::Succeeded;
        if job.current_phase == Phase::Publish && job.metrics.publish_end.is_none() {
            job.metrics.publish_end = Some(now);
        }
        job.finished_at = Some(now);
        if job.metrics.job_end.is_none() {
            job.metrics.job_end = Some(now);
        }
        job.touch();
        self.lock.release(&job.lock_key, &job.lock_session_id).await;
        job.lock_session_id = String::new();
        info!(job_id = %job.id, status = "SUCCEEDED", "job finished");
    }

    async fn fail_job(&self, job: &mut Job, failed_phase: Phase, detail: String) {
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.failed_phase = Some(failed_phase);
        job.error = Some(detail);
        job.finished_at = Some(now);
        if job.metrics.job_end.is_none() {
            job.metrics.job_end = Some(now);
        }
        job.touch();
        self.lock.release(&job.lock_key, &job.lock_session_id).await;
        job.lock_session_id = String::new();
        error!(job_id = %job.id, phase = failed_phase.as_str(), status = "FAILED", "job failed");
    }

    async fn failure_detail(&self, workload_id: &str) -> String {
        self.client
            .failure_detail(workload_id)
            .await
            .unwrap_or_else(|err| format!("failed to fetch failure detail: {err}"))
    }

    async fn capture_single_phase_logs(&self, job: &mut Job, phase: Phase, workload_id: &str) {
        let lines = logs::capture_workload_logs(self.client.as_ref(), workload_id).await;
        if let Some(existing) = job.logs.for_phase_mut(phase) {
            if existing.is_empty() {
                *existing = lines;
            }
        }
    }

    /// SPEC_FULL §4.3.5. Best-effort: returns after issuing deregistration,
    /// not after the workloads have actually died. Does not release the
    /// lock — the Monitor's next observation of the resulting failure does.
    pub async fn kill_job(&self, job: &Job) -> Result<()> {
        let mut errors = Vec::new();
        let handles: Vec<&WorkloadId> = job
            .build_workload_id
            .iter()
            .chain(job.test_workload_ids.iter())
            .chain(job.publish_workload_id.iter())
            .collect();

        for handle in handles {
            let status = self.client.status(handle.as_str()).await;
            if !matches!(status, Ok(WorkloadStatus::Running) | Ok(WorkloadStatus::Pending)) {
                continue;
            }
            if let Err(err) = self.client.deregister(handle.as_str(), false).await {
                warn!(job_id = %job.id, workload_id = %handle, error = %err, "graceful deregister failed, retrying with purge");
                if let Err(err) = self.client.deregister(handle.as_str(), true).await {
                    errors.push(format!("{handle}: {err}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "kill_job encountered errors: {}",
                errors.join("; ")
            )))
        }
    }

    /// SPEC_FULL §4.3.5. Kill, then best-effort submit the cleanup spec for
    /// the temp image. Cleanup failures are logged, never surfaced.
    pub async fn cleanup_job(&self, job: &Job) -> Result<()> {
        self.kill_job(job).await?;
        if job.has_tests() {
            let spec = buildforge_jobspec::cleanup_spec(job);
            if let Err(err) = self.client.submit(spec).await {
                warn!(job_id = %job.id, error = %err, "best-effort temp image cleanup failed");
            }
        }
        Ok(())
    }

    /// SPEC_FULL §4.3.5. Purges any workload in a terminal-failed state from
    /// the orchestrator's record, after logs have already been captured by
    /// the normal transition path.
    pub async fn cleanup_failed_jobs(&self, jobs: &[Job]) {
        for job in jobs.iter().filter(|j| j.status == JobStatus::Failed) {
            let handles: Vec<&WorkloadId> = job
                .build_workload_id
                .iter()
                .chain(job.test_workload_ids.iter())
                .chain(job.publish_workload_id.iter())
                .collect();
            for handle in handles {
                if let Ok(WorkloadStatus::Failed) = self.client.status(handle.as_str()).await {
                    if let Err(err) = self.client.deregister(handle.as_str(), true).await {
                        warn!(job_id = %job.id, workload_id = %handle, error = %err, "failed-job purge failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_core::config::{PhaseResources, TestConfig};
    use buildforge_orchestrator::{FakeWorkloadClient, RawWorkloadStatus};
    use buildforge_secrets::InMemorySecretProvider;
    use buildforge_storage::InMemoryStorage;
    use std::time::Duration as StdDuration;

    fn build_config(tests: Option<TestConfig>) -> BuildConfig {
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
            tests,
            resources: PhaseResources::default(),
            webhook: None,
            clear_cache: false,
        }
    }

    fn driver() -> (Driver, Arc<FakeWorkloadClient>, Arc<InMemoryStorage>) {
        let client = Arc::new(FakeWorkloadClient::new());
        let storage = Arc::new(InMemoryStorage::new());
        let secrets = Arc::new(InMemorySecretProvider::new());
        let mut config = DriverConfig::default();
        config.build_to_test_delay = StdDuration::from_millis(1);
        config.lock_acquire_timeout = chrono::Duration::milliseconds(100);
        let driver: Driver = Driver::new(client.clone(), storage.clone(), secrets, config);
        (driver, client, storage)
    }

    #[tokio::test]
    async fn fast_path_build_to_success() {
        let (driver, client, _storage) = driver();
        let job = driver.create_job(build_config(None)).await.unwrap();
        assert_eq!(job.status, JobStatus::Building);

        let build_id = job.build_workload_id.clone().unwrap();
        client.set_status(build_id.as_str(), RawWorkloadStatus::Complete);

        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.lock_session_id.is_empty());
        assert!(job.finished_at.is_some());
        assert!(job.publish_workload_id.is_none());
    }

    #[tokio::test]
    async fn full_path_with_tests_reaches_publish_and_succeeds() {
        let (driver, client, _storage) = driver();
        let tests = TestConfig {
            commands: vec!["echo hi".to_string()],
            entrypoint: true,
        };
        let job = driver.create_job(build_config(Some(tests))).await.unwrap();

        let build_id = job.build_workload_id.clone().unwrap();
        client.set_status(build_id.as_str(), RawWorkloadStatus::Complete);
        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Testing);
        assert_eq!(job.test_workload_ids.len(), 2);

        for id in &job.test_workload_ids {
            client.set_status(id.as_str(), RawWorkloadStatus::Complete);
        }
        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Publishing);
        let publish_id = job.publish_workload_id.clone().unwrap();

        client.set_status(publish_id.as_str(), RawWorkloadStatus::Complete);
        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.lock_session_id.is_empty());
    }

    #[tokio::test]
    async fn test_failure_marks_job_failed_with_failed_phase() {
        let (driver, client, _storage) = driver();
        let tests = TestConfig {
            commands: vec!["exit 1".to_string()],
            entrypoint: false,
        };
        let job = driver.create_job(build_config(Some(tests))).await.unwrap();

        let build_id = job.build_workload_id.clone().unwrap();
        client.set_status(build_id.as_str(), RawWorkloadStatus::Complete);
        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Testing);

        let test_id = job.test_workload_ids[0].clone();
        client.set_status(test_id.as_str(), RawWorkloadStatus::Failed);
        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failed_phase, Some(Phase::Test));
        assert!(job.error.as_ref().unwrap().contains(test_id.as_str()));
        assert!(job.publish_workload_id.is_none());
    }

    #[tokio::test]
    async fn advance_test_with_no_workloads_anywhere_stays_testing() {
        let (driver, _client, _storage) = driver();
        let tests = TestConfig {
            commands: vec!["echo hi".to_string()],
            entrypoint: false,
        };
        let mut job = Job::new(
            JobId::new(),
            build_config(Some(tests)),
            "lock-key".to_string(),
            "session-1".to_string(),
        );
        job.status = JobStatus::Testing;
        job.current_phase = Phase::Test;

        let job = driver.update_job_status(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Testing);
        assert_eq!(job.current_phase, Phase::Test);
        assert!(job.publish_workload_id.is_none());
    }

    #[tokio::test]
    async fn concurrent_create_job_for_same_image_branch_serializes() {
        let (driver, client, _storage) = driver();
        let first = driver.create_job(build_config(None)).await.unwrap();
        let second = driver.create_job(build_config(None)).await;
        assert!(second.is_err());

        let build_id = first.build_workload_id.clone().unwrap();
        client.set_status(build_id.as_str(), RawWorkloadStatus::Complete);
        let first = driver.update_job_status(first).await.unwrap();
        assert_eq!(first.status, JobStatus::Succeeded);

        let retried = driver.create_job(build_config(None)).await;
        assert!(retried.is_ok());
    }
}
