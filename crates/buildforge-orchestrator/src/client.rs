use async_trait::async_trait;

use crate::error::Result;
use crate::spec::WorkloadSpec;
use crate::status::{Allocation, WorkloadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Typed adapter over the cluster workload orchestrator. Implementations
/// submit, poll, and tear down the batch workloads a [`Job`](buildforge_core::Job)
/// drives through its build/test/publish phases.
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Submit a workload, returning its id and the id of the evaluation that
    /// placed it.
    async fn submit(&self, spec: WorkloadSpec) -> Result<(String, String)>;

    /// Derived status for a workload (see [`crate::status::derive_status`]).
    async fn status(&self, workload_id: &str) -> Result<WorkloadStatus>;

    /// Raw allocations backing a workload, for status derivation and log
    /// routing.
    async fn allocations(&self, workload_id: &str) -> Result<Vec<Allocation>>;

    /// Tear down a workload. `purge` also removes it from orchestrator history.
    async fn deregister(&self, workload_id: &str, purge: bool) -> Result<()>;

    /// Fetch the full, ordered log lines for one task's stream within an
    /// allocation.
    async fn task_logs(
        &self,
        alloc_id: &str,
        task: &str,
        stream: LogStream,
    ) -> Result<Vec<String>>;

    /// List workload ids whose name starts with `prefix`. Used as the
    /// discovery fallback when a Job's persisted workload id is missing.
    async fn list_matching(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human-readable detail for a failed workload: evaluations first, then
    /// the first failed task's latest event (see
    /// [`crate::status::extract_failure_detail`]).
    async fn failure_detail(&self, workload_id: &str) -> Result<String>;

    /// Cheap connectivity/leadership check.
    async fn leader_health(&self) -> Result<()>;
}
