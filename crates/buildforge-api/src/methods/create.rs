use serde::{Deserialize, Serialize};
use serde_json::Value;

use buildforge_core::config::BuildConfig;
use buildforge_core::{JobStatus, Phase};
use buildforge_webhook::{events_for_transition, Snapshot};

use crate::error::to_rpc_error;
use crate::rpc::RpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateParams {
    #[serde(flatten)]
    pub config: BuildConfig,
}

#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub job_id: String,
    pub status: JobStatus,
    pub current_phase: Phase,
}

pub async fn handle(state: &AppState, params: Value) -> Result<Value, RpcError> {
    let params: CreateParams =
        serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))?;

    let job = state
        .driver
        .create_job(params.config)
        .await
        .map_err(to_rpc_error)?;

    state
        .storage
        .store_job(&job)
        .await
        .map_err(|err| to_rpc_error(err.into()))?;

    let created = Snapshot {
        status: JobStatus::Pending,
        current_phase: Phase::None,
    };
    let current = Snapshot {
        status: job.status,
        current_phase: job.current_phase,
    };
    for event in events_for_transition(created, current, None) {
        state.dispatcher.dispatch(&job, &event);
    }

    let result = CreateResult {
        job_id: job.id.to_string(),
        status: job.status,
        current_phase: job.current_phase,
    };
    Ok(serde_json::to_value(result).expect("CreateResult always serializes"))
}
