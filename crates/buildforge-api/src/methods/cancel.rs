use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use buildforge_core::{JobId, JobStatus};

use crate::error::to_rpc_error;
use crate::rpc::RpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CancelParams {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub job_id: String,
    pub status: JobStatus,
    pub accepted: bool,
}

/// Best-effort: deregisters the Job's live workloads and returns
/// immediately. Does not itself mark the Job `FAILED` — the next Monitor
/// tick observes the resulting workload failure (or absence) and performs
/// the actual terminal transition, same as any other externally-caused
/// failure.
pub async fn handle(state: &AppState, params: Value) -> Result<Value, RpcError> {
    let params: CancelParams =
        serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))?;
    let job_id = JobId::from_str(&params.job_id)
        .map_err(|err| RpcError::invalid_params(format!("invalid job_id: {err}")))?;

    let mutex = state.registry.mutex_for(job_id);
    let _guard = mutex.lock().await;

    let job = state
        .storage
        .get_job(job_id)
        .await
        .map_err(|err| to_rpc_error(err.into()))?;

    if job.status.is_terminal() {
        return Ok(serde_json::to_value(CancelResult {
            job_id: job.id.to_string(),
            status: job.status,
            accepted: false,
        })
        .expect("CancelResult always serializes"));
    }

    if let Err(err) = state.driver.cleanup_job(&job).await {
        warn!(job_id = %job_id, error = %err, "cancel requested but cleanup was only partially successful");
    }

    Ok(serde_json::to_value(CancelResult {
        job_id: job.id.to_string(),
        status: job.status,
        accepted: true,
    })
    .expect("CancelResult always serializes"))
}
