use buildforge_orchestrator::{LogStream, WorkloadClient};
use tracing::warn;

/// Enumerates every allocation of `workload_id`, reads each task's stdout
/// and stderr, prefixes each line with `[task/stream]`, and drops blank
/// lines (SPEC_FULL §4.3.4).
pub async fn capture_workload_logs(client: &dyn WorkloadClient, workload_id: &str) -> Vec<String> {
    let allocations = match client.allocations(workload_id).await {
        Ok(allocations) => allocations,
        Err(err) => {
            warn!(workload_id, error = %err, "log capture: failed to list allocations");
            return Vec::new();
        }
    };

    let mut lines = Vec::new();
    for allocation in &allocations {
        for task in &allocation.task_states {
            for (stream, label) in [(LogStream::Stdout, "stdout"), (LogStream::Stderr, "stderr")] {
                match client
                    .task_logs(&allocation.alloc_id, &task.task_name, stream)
                    .await
                {
                    Ok(task_lines) => {
                        let prefix = format!("[{}/{label}]", task.task_name);
                        lines.extend(
                            task_lines
                                .into_iter()
                                .filter(|line| !line.trim().is_empty())
                                .map(|line| format!("{prefix} {line}")),
                        );
                    }
                    Err(err) => {
                        warn!(
                            workload_id,
                            task = task.task_name,
                            error = %err,
                            "log capture: failed to fetch task logs"
                        );
                    }
                }
            }
        }
    }
    lines
}

/// Captures each test workload's logs, concatenated with a header per
/// workload to preserve boundaries (SPEC_FULL §4.3.4).
pub async fn capture_test_logs(client: &dyn WorkloadClient, workload_ids: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for (index, workload_id) in workload_ids.iter().enumerate() {
        lines.push(format!("=== Test Workload {} ({workload_id}) ===", index + 1));
        lines.extend(capture_workload_logs(client, workload_id).await);
        lines.push(String::new());
    }
    lines
}

/// Discovery fallback: when a Job's `test_workload_ids` is empty at
/// log-capture time (e.g. a crash before persistence), query the
/// orchestrator for anything matching the deterministic test-id prefixes.
pub async fn discover_test_workload_ids(client: &dyn WorkloadClient, job_id: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for prefix in [format!("test-entry-{job_id}"), format!("test-cmd-{job_id}")] {
        match client.list_matching(&prefix).await {
            Ok(found) => ids.extend(found),
            Err(err) => {
                warn!(job_id, prefix, error = %err, "discovery fallback: list_matching failed");
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_orchestrator::{
        Allocation, ClientStatus, FakeWorkloadClient, RawWorkloadStatus, TaskState, TaskStatus,
        WorkloadSpec, WorkloadType,
    };
    use std::collections::HashMap;

    fn spec(id: &str) -> WorkloadSpec {
        WorkloadSpec {
            id: id.to_string(),
            name: id.to_string(),
            image: "alpine".to_string(),
            command: vec!["true".to_string()],
            env: HashMap::new(),
            secret_templates: Vec::new(),
            constraints: Vec::new(),
            restart_attempts: 0,
            workload_type: WorkloadType::Batch,
            cpu_mhz: None,
            memory_mb: None,
        }
    }

    #[tokio::test]
    async fn capture_prefixes_lines_and_drops_blanks() {
        let client = FakeWorkloadClient::new();
        let (workload_id, _) = client.submit(spec("build-1")).await.unwrap();
        client.set_status(&workload_id, RawWorkloadStatus::Complete);
        client.set_allocations(
            &workload_id,
            vec![Allocation {
                alloc_id: "alloc-1".to_string(),
                node_id: "node-1".to_string(),
                client_status: ClientStatus::Complete,
                task_states: vec![TaskStatus {
                    task_name: "main".to_string(),
                    state: TaskState::Dead,
                    failed: false,
                    latest_event: None,
                }],
            }],
        );
        client.push_log("alloc-1", "main", "hello");
        client.push_log("alloc-1", "main", "");

        let lines = capture_workload_logs(&client, &workload_id).await;
        assert!(lines.iter().any(|l| l == "[main/stdout] hello"));
        assert!(!lines.iter().any(|l| l.ends_with("stdout] ")));
    }

    #[tokio::test]
    async fn discovery_fallback_merges_both_prefixes() {
        let client = FakeWorkloadClient::new();
        client.submit(spec("test-cmd-job1-0")).await.unwrap();
        client.submit(spec("test-entry-job1")).await.unwrap();
        client.submit(spec("build-job1")).await.unwrap();

        let mut ids = discover_test_workload_ids(&client, "job1").await;
        ids.sort();
        assert_eq!(ids, vec!["test-cmd-job1-0".to_string(), "test-entry-job1".to_string()]);
    }
}
