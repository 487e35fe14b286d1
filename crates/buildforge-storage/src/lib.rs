//! Job persistence and session-lock storage (consumed by the Driver, Monitor,
//! and LockCoordinator). The only shared mutable state in the service — every
//! other component is stateless or holds only in-flight request state.

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::Duration;

use buildforge_core::history::{JobHistory, JobHistoryPage};
use buildforge_core::{Job, JobId};

pub use error::{Result, StorageError};
pub use memory::InMemoryStorage;

/// An active-job listing is cheap to materialize in full; there is no
/// pagination on the active set, only on history (§6).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn store_job(&self, job: &Job) -> Result<()>;
    async fn get_job(&self, id: JobId) -> Result<Job>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    async fn delete_job(&self, id: JobId) -> Result<()>;
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    async fn store_job_history(&self, history: &JobHistory) -> Result<()>;
    async fn get_job_history(&self, limit: u64, offset: u64) -> Result<JobHistoryPage>;
    async fn cleanup_old_history(&self, max_age: Duration) -> Result<u64>;

    /// Acquire the session lock identified by `key`, blocking up to `ttl`
    /// before failing with [`StorageError::LockAlreadyHeld`]. Returns the
    /// session id that must be presented to [`Storage::release_lock`].
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Idempotent: releasing with a stale or unknown session id is a no-op,
    /// not an error (SPEC_FULL §4.5).
    async fn release_lock(&self, key: &str, session_id: &str) -> Result<()>;

    fn generate_image_lock_key(&self, registry: &str, image: &str, branch: &str) -> String;

    async fn health(&self) -> Result<()>;
}
