//! Workload status derivation (SPEC_FULL §4.1 — "the non-obvious part").

use serde::{Deserialize, Serialize};

/// The derived, caller-facing status of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Unknown,
}

/// Raw status as reported by the orchestrator for the workload as a whole,
/// before allocation-level refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawWorkloadStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Cancelled,
}

/// Per-allocation client status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

/// Per-task terminal state within an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_name: String,
    pub state: TaskState,
    pub failed: bool,
    pub latest_event: Option<TaskEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_type: String,
    pub display_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub alloc_id: String,
    pub node_id: String,
    pub client_status: ClientStatus,
    pub task_states: Vec<TaskStatus>,
}

/// An orchestrator evaluation — surfaced for error-detail extraction when a
/// workload fails to even get allocations placed (SPEC_FULL §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub status: EvaluationStatus,
    pub status_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Complete,
    Blocked,
    Failed,
    Cancelled,
}

/// Derive the caller-facing [`WorkloadStatus`] from the raw workload status
/// and its allocations, per the precedence rules in SPEC_FULL §4.1:
///
/// 1. No allocations and the workload is terminal -> failed (scheduling failure).
/// 2. Any allocation `client_status=failed` -> failed.
/// 3. Any task `state=dead && failed=true` -> failed.
/// 4. Any allocation running -> running.
/// 5. All allocations complete -> complete.
/// 6. Otherwise fall back to the raw status.
pub fn derive_status(raw: RawWorkloadStatus, allocations: &[Allocation]) -> WorkloadStatus {
    let raw_is_terminal = matches!(
        raw,
        RawWorkloadStatus::Complete | RawWorkloadStatus::Failed | RawWorkloadStatus::Cancelled
    );

    if allocations.is_empty() && raw_is_terminal {
        return WorkloadStatus::Failed;
    }

    if allocations
        .iter()
        .any(|a| a.client_status == ClientStatus::Failed)
    {
        return WorkloadStatus::Failed;
    }

    if allocations.iter().any(|a| {
        a.task_states
            .iter()
            .any(|t| t.state == TaskState::Dead && t.failed)
    }) {
        return WorkloadStatus::Failed;
    }

    if allocations
        .iter()
        .any(|a| a.client_status == ClientStatus::Running)
    {
        return WorkloadStatus::Running;
    }

    if !allocations.is_empty()
        && allocations
            .iter()
            .all(|a| a.client_status == ClientStatus::Complete)
    {
        return WorkloadStatus::Complete;
    }

    match raw {
        RawWorkloadStatus::Pending => WorkloadStatus::Pending,
        RawWorkloadStatus::Running => WorkloadStatus::Running,
        RawWorkloadStatus::Complete => WorkloadStatus::Complete,
        RawWorkloadStatus::Failed | RawWorkloadStatus::Cancelled => WorkloadStatus::Failed,
    }
}

/// Extract a human-readable failure detail for a failed workload: prefer a
/// blocked/failed evaluation's `status_description`, else the first failed
/// task's latest event (SPEC_FULL §4.1).
pub fn extract_failure_detail(evaluations: &[Evaluation], allocations: &[Allocation]) -> String {
    if let Some(eval) = evaluations
        .iter()
        .find(|e| matches!(e.status, EvaluationStatus::Blocked | EvaluationStatus::Failed))
    {
        return eval.status_description.clone();
    }

    for alloc in allocations {
        for task in &alloc.task_states {
            if task.state == TaskState::Dead && task.failed {
                if let Some(event) = &task.latest_event {
                    return format!("{}: {}", event.event_type, event.display_message);
                }
                return format!("task {} died", task.task_name);
            }
        }
    }

    "workload failed with no further detail available".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(client_status: ClientStatus, tasks: Vec<TaskStatus>) -> Allocation {
        Allocation {
            alloc_id: "alloc-1".into(),
            node_id: "node-1".into(),
            client_status,
            task_states: tasks,
        }
    }

    #[test]
    fn no_allocations_terminal_is_failed() {
        let status = derive_status(RawWorkloadStatus::Complete, &[]);
        assert_eq!(status, WorkloadStatus::Failed);
    }

    #[test]
    fn no_allocations_pending_is_pending() {
        let status = derive_status(RawWorkloadStatus::Pending, &[]);
        assert_eq!(status, WorkloadStatus::Pending);
    }

    #[test]
    fn any_failed_allocation_wins() {
        let allocs = vec![
            alloc(ClientStatus::Complete, vec![]),
            alloc(ClientStatus::Failed, vec![]),
        ];
        assert_eq!(
            derive_status(RawWorkloadStatus::Running, &allocs),
            WorkloadStatus::Failed
        );
    }

    #[test]
    fn dead_failed_task_overrides_running_allocation_status() {
        let allocs = vec![alloc(
            ClientStatus::Running,
            vec![TaskStatus {
                task_name: "main".into(),
                state: TaskState::Dead,
                failed: true,
                latest_event: None,
            }],
        )];
        assert_eq!(
            derive_status(RawWorkloadStatus::Running, &allocs),
            WorkloadStatus::Failed
        );
    }

    #[test]
    fn any_running_allocation_is_running() {
        let allocs = vec![
            alloc(ClientStatus::Complete, vec![]),
            alloc(ClientStatus::Running, vec![]),
        ];
        assert_eq!(
            derive_status(RawWorkloadStatus::Running, &allocs),
            WorkloadStatus::Running
        );
    }

    #[test]
    fn all_complete_is_complete() {
        let allocs = vec![
            alloc(ClientStatus::Complete, vec![]),
            alloc(ClientStatus::Complete, vec![]),
        ];
        assert_eq!(
            derive_status(RawWorkloadStatus::Complete, &allocs),
            WorkloadStatus::Complete
        );
    }

    #[test]
    fn falls_back_to_raw_when_mixed_pending() {
        let allocs = vec![alloc(ClientStatus::Pending, vec![])];
        assert_eq!(
            derive_status(RawWorkloadStatus::Pending, &allocs),
            WorkloadStatus::Pending
        );
    }

    #[test]
    fn extract_prefers_evaluation_over_task_event() {
        let evals = vec![Evaluation {
            id: "eval-1".into(),
            status: EvaluationStatus::Blocked,
            status_description: "no nodes meet constraints".into(),
        }];
        let detail = extract_failure_detail(&evals, &[]);
        assert_eq!(detail, "no nodes meet constraints");
    }

    #[test]
    fn extract_falls_back_to_task_event() {
        let allocs = vec![alloc(
            ClientStatus::Failed,
            vec![TaskStatus {
                task_name: "main".into(),
                state: TaskState::Dead,
                failed: true,
                latest_event: Some(TaskEvent {
                    event_type: "Terminated".into(),
                    display_message: "exit code 1".into(),
                }),
            }],
        )];
        let detail = extract_failure_detail(&[], &allocs);
        assert_eq!(detail, "Terminated: exit code 1");
    }
}
