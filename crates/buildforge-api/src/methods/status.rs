use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use buildforge_core::{JobId, JobStatus, Phase};

use crate::error::to_rpc_error;
use crate::rpc::RpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub job_id: String,
    pub status: JobStatus,
    pub current_phase: Phase,
    pub error: Option<String>,
    pub failed_phase: Option<Phase>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn handle(state: &AppState, params: Value) -> Result<Value, RpcError> {
    let params: StatusParams =
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

    let result = StatusResult {
        job_id: job.id.to_string(),
        status: job.status,
        current_phase: job.current_phase,
        error: job.error,
        failed_phase: job.failed_phase,
        created_at: job.created_at,
        started_at: job.started_at,
        finished_at: job.finished_at,
    };
    Ok(serde_json::to_value(result).expect("StatusResult always serializes"))
}
