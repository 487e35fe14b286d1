//! In-memory [`WorkloadClient`] for driver/monitor unit tests. Exercises the
//! real status-derivation rules over a hand-rolled allocation table instead
//! of stubbing out status entirely.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{LogStream, WorkloadClient};
use crate::error::{ClientError, Result};
use crate::spec::WorkloadSpec;
use crate::status::{
    derive_status, extract_failure_detail, Allocation, Evaluation, RawWorkloadStatus,
    WorkloadStatus,
};

struct FakeWorkload {
    spec: WorkloadSpec,
    raw_status: RawWorkloadStatus,
    allocations: Vec<Allocation>,
    evaluations: Vec<Evaluation>,
    logs: HashMap<(String, String), Vec<String>>,
    deregistered: bool,
}

/// A fully in-process stand-in for the orchestrator. Tests drive it by
/// calling [`FakeWorkloadClient::set_status`] / [`FakeWorkloadClient::push_log`]
/// to simulate the orchestrator's view of the world evolving.
#[derive(Default)]
pub struct FakeWorkloadClient {
    workloads: Mutex<HashMap<String, FakeWorkload>>,
    submissions_refused: Mutex<Vec<String>>,
}

impl FakeWorkloadClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `submit` for a workload with this id fail.
    pub fn refuse_submission(&self, workload_id: impl Into<String>) {
        self.submissions_refused.lock().unwrap().push(workload_id.into());
    }

    pub fn set_status(&self, workload_id: &str, raw_status: RawWorkloadStatus) {
        let mut workloads = self.workloads.lock().unwrap();
        if let Some(workload) = workloads.get_mut(workload_id) {
            workload.raw_status = raw_status;
        }
    }

    pub fn set_allocations(&self, workload_id: &str, allocations: Vec<Allocation>) {
        let mut workloads = self.workloads.lock().unwrap();
        if let Some(workload) = workloads.get_mut(workload_id) {
            workload.allocations = allocations;
        }
    }

    pub fn set_evaluations(&self, workload_id: &str, evaluations: Vec<Evaluation>) {
        let mut workloads = self.workloads.lock().unwrap();
        if let Some(workload) = workloads.get_mut(workload_id) {
            workload.evaluations = evaluations;
        }
    }

    pub fn push_log(&self, alloc_id: &str, task: &str, line: impl Into<String>) {
        let mut workloads = self.workloads.lock().unwrap();
        for workload in workloads.values_mut() {
            workload
                .logs
                .entry((alloc_id.to_string(), task.to_string()))
                .or_default()
                .push(line.into());
        }
    }

    /// Simulate the orchestrator having purged a workload outright (e.g.
    /// garbage-collected history): subsequent calls see it as not found.
    pub fn remove(&self, workload_id: &str) {
        self.workloads.lock().unwrap().remove(workload_id);
    }

    pub fn was_deregistered(&self, workload_id: &str) -> bool {
        self.workloads
            .lock()
            .unwrap()
            .get(workload_id)
            .map(|w| w.deregistered)
            .unwrap_or(false)
    }

    pub fn submitted_specs(&self) -> Vec<WorkloadSpec> {
        self.workloads
            .lock()
            .unwrap()
            .values()
            .map(|w| w.spec.clone())
            .collect()
    }
}

#[async_trait]
impl WorkloadClient for FakeWorkloadClient {
    async fn submit(&self, spec: WorkloadSpec) -> Result<(String, String)> {
        let mut refused = self.submissions_refused.lock().unwrap();
        if let Some(pos) = refused.iter().position(|id| id == &spec.id) {
            refused.remove(pos);
            return Err(ClientError::SubmitRefused(format!(
                "refused submission of {}",
                spec.id
            )));
        }
        drop(refused);

        let workload_id = spec.id.clone();
        let eval_id = format!("eval-{workload_id}");
        self.workloads.lock().unwrap().insert(
            workload_id.clone(),
            FakeWorkload {
                spec,
                raw_status: RawWorkloadStatus::Pending,
                allocations: Vec::new(),
                evaluations: Vec::new(),
                logs: HashMap::new(),
                deregistered: false,
            },
        );
        Ok((workload_id, eval_id))
    }

    async fn status(&self, workload_id: &str) -> Result<WorkloadStatus> {
        let workloads = self.workloads.lock().unwrap();
        let workload = workloads
            .get(workload_id)
            .ok_or_else(|| ClientError::NotFound(workload_id.to_string()))?;
        Ok(derive_status(workload.raw_status, &workload.allocations))
    }

    async fn allocations(&self, workload_id: &str) -> Result<Vec<Allocation>> {
        let workloads = self.workloads.lock().unwrap();
        let workload = workloads
            .get(workload_id)
            .ok_or_else(|| ClientError::NotFound(workload_id.to_string()))?;
        Ok(workload.allocations.clone())
    }

    async fn deregister(&self, workload_id: &str, _purge: bool) -> Result<()> {
        let mut workloads = self.workloads.lock().unwrap();
        let workload = workloads
            .get_mut(workload_id)
            .ok_or_else(|| ClientError::NotFound(workload_id.to_string()))?;
        workload.deregistered = true;
        Ok(())
    }

    async fn task_logs(
        &self,
        alloc_id: &str,
        task: &str,
        _stream: LogStream,
    ) -> Result<Vec<String>> {
        let workloads = self.workloads.lock().unwrap();
        for workload in workloads.values() {
            if let Some(lines) = workload.logs.get(&(alloc_id.to_string(), task.to_string())) {
                return Ok(lines.clone());
            }
        }
        Ok(Vec::new())
    }

    async fn list_matching(&self, prefix: &str) -> Result<Vec<String>> {
        let workloads = self.workloads.lock().unwrap();
        Ok(workloads
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn failure_detail(&self, workload_id: &str) -> Result<String> {
        let workloads = self.workloads.lock().unwrap();
        let workload = workloads
            .get(workload_id)
            .ok_or_else(|| ClientError::NotFound(workload_id.to_string()))?;
        Ok(extract_failure_detail(&workload.evaluations, &workload.allocations))
    }

    async fn leader_health(&self) -> Result<()> {
        Ok(())
    }
}
