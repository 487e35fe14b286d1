//! Workload specifications submitted to the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A batch workload specification, as produced by `buildforge-jobspec` and
/// consumed by [`crate::WorkloadClient::submit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Deterministic id, e.g. `build-{job_id}`, `test-cmd-{job_id}-{index}`.
    pub id: String,
    /// Human-readable task group name, usually equal to `id`.
    pub name: String,
    /// Container image the workload's single task runs.
    pub image: String,
    /// Shell command to execute inside the container.
    pub command: Vec<String>,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Requested secret templates to render and mount (SecretProvider).
    pub secret_templates: Vec<SecretTemplateRequest>,
    /// Node affinity constraints. Empty by default (SPEC_FULL §4.2: explicit
    /// empty constraint list suppresses orchestrator auto-constraints).
    pub constraints: Vec<Constraint>,
    /// Always 0 — the Driver is the sole retry authority (SPEC_FULL §4.2).
    pub restart_attempts: u32,
    /// Always `batch` for this service's workloads.
    pub workload_type: WorkloadType,
    /// Requested CPU, in MHz. `None` lets the orchestrator apply its default.
    pub cpu_mhz: Option<u32>,
    /// Requested memory, in MB. `None` lets the orchestrator apply its default.
    pub memory_mb: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadType {
    Batch,
}

/// A request to materialize a secret-store path into the workload's
/// environment or filesystem before it starts (SecretProvider, out of scope
/// per SPEC_FULL §1; this is the shape the Driver/JobSpecBuilder pass to it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretTemplateRequest {
    pub secret_path: String,
    pub destination: String,
}

/// A single affinity/anti-affinity constraint, e.g. `node != build_node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub attribute: String,
    pub operator: ConstraintOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOperator {
    Equal,
    NotEqual,
}

impl Constraint {
    /// `node.id != build_node_id` — keeps tests off the node that ran the
    /// build, avoiding the layer-cache hazard described in SPEC_FULL §4.3.3.
    pub fn node_not_equal(node_id: impl Into<String>) -> Self {
        Self {
            attribute: "node.id".to_string(),
            operator: ConstraintOperator::NotEqual,
            value: node_id.into(),
        }
    }
}
