//! A process-local reference [`Storage`] implementation. Sufficient for
//! tests and single-process deployments; a production deployment would swap
//! this for a shared backend without the rest of the service noticing.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use buildforge_core::history::{JobHistory, JobHistoryPage};
use buildforge_core::{Job, JobId};

use crate::error::{Result, StorageError};
use crate::Storage;

struct LockEntry {
    session_id: String,
}

#[derive(Default)]
pub struct InMemoryStorage {
    jobs: Mutex<HashMap<JobId, Job>>,
    history: Mutex<Vec<JobHistory>>,
    locks: Mutex<HashMap<String, LockEntry>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

const LOCK_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

#[async_trait]
impl Storage for InMemoryStorage {
    async fn store_job(&self, job: &Job) -> Result<()> {
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Job> {
        self.jobs
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if !jobs.contains_key(&job.id) {
            return Err(StorageError::NotFound(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<()> {
        self.jobs.lock().await.remove(&id);
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.jobs.lock().await.values().cloned().collect())
    }

    async fn store_job_history(&self, history: &JobHistory) -> Result<()> {
        self.history.lock().await.push(history.clone());
        Ok(())
    }

    async fn get_job_history(&self, limit: u64, offset: u64) -> Result<JobHistoryPage> {
        let history = self.history.lock().await;
        let total = history.len() as u64;
        let mut sorted: Vec<JobHistory> = history.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let jobs = sorted
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(JobHistoryPage { jobs, total })
    }

    async fn cleanup_old_history(&self, max_age: Duration) -> Result<u64> {
        let cutoff = Utc::now() - max_age;
        let mut history = self.history.lock().await;
        let before = history.len();
        history.retain(|h| h.created_at >= cutoff);
        Ok((before - history.len()) as u64)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<String> {
        let deadline = Instant::now()
            + ttl
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(0));
        loop {
            {
                let mut locks = self.locks.lock().await;
                if !locks.contains_key(key) {
                    let session_id = Uuid::new_v4().to_string();
                    locks.insert(
                        key.to_string(),
                        LockEntry {
                            session_id: session_id.clone(),
                        },
                    );
                    return Ok(session_id);
                }
            }
            if Instant::now() >= deadline {
                return Err(StorageError::LockAlreadyHeld(key.to_string()));
            }
            sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release_lock(&self, key: &str, session_id: &str) -> Result<()> {
        let mut locks = self.locks.lock().await;
        match locks.get(key) {
            Some(entry) if entry.session_id == session_id => {
                locks.remove(key);
            }
            Some(_) => {
                warn!(key, "release_lock called with mismatched session id");
            }
            None => {}
        }
        Ok(())
    }

    fn generate_image_lock_key(&self, registry: &str, image: &str, branch: &str) -> String {
        format!(
            "{}/{}/{}",
            registry.trim_end_matches('/'),
            image.trim_matches('/'),
            branch
        )
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_core::config::{BuildConfig, PhaseResources};

    fn config() -> BuildConfig {
        BuildConfig {
            repo_url: "https://example.com/repo.git".into(),
            git_ref: "main".into(),
            branch: "main".into(),
            dockerfile_path: "Dockerfile".into(),
            image_name: "myorg/myimage".into(),
            image_tags: vec!["latest".into()],
            registry_url: "registry.example.com".into(),
            git_credential_path: None,
            registry_credential_path: None,
            tests: None,
            resources: PhaseResources::default(),
            webhook: None,
            clear_cache: false,
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let storage = InMemoryStorage::new();
        let job = Job::new(JobId::new(), config(), "k".into(), "s".into());
        storage.store_job(&job).await.unwrap();
        let fetched = storage.get_job(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let storage = InMemoryStorage::new();
        assert!(matches!(
            storage.get_job(JobId::new()).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn second_lock_acquire_times_out() {
        let storage = InMemoryStorage::new();
        let session = storage
            .acquire_lock("k", Duration::milliseconds(200))
            .await
            .unwrap();
        let result = storage.acquire_lock("k", Duration::milliseconds(100)).await;
        assert!(result.is_err());
        storage.release_lock("k", &session).await.unwrap();
        assert!(storage
            .acquire_lock("k", Duration::milliseconds(200))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn release_with_wrong_session_is_not_an_error() {
        let storage = InMemoryStorage::new();
        let _session = storage
            .acquire_lock("k", Duration::milliseconds(200))
            .await
            .unwrap();
        assert!(storage.release_lock("k", "bogus").await.is_ok());
    }

    #[tokio::test]
    async fn image_lock_key_is_deterministic() {
        let storage = InMemoryStorage::new();
        let a = storage.generate_image_lock_key("registry.example.com", "acme/widget", "main");
        let b = storage.generate_image_lock_key("registry.example.com", "acme/widget", "main");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn history_page_orders_newest_first() {
        let storage = InMemoryStorage::new();
        let mut older = Job::new(JobId::new(), config(), "k1".into(), "s1".into());
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = Job::new(JobId::new(), config(), "k2".into(), "s2".into());
        storage
            .store_job_history(&JobHistory::from(&older))
            .await
            .unwrap();
        storage
            .store_job_history(&JobHistory::from(&newer))
            .await
            .unwrap();
        let page = storage.get_job_history(10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.jobs[0].id, newer.id);
    }
}
