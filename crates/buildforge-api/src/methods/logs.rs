use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use buildforge_core::{JobId, Phase};

use crate::error::to_rpc_error;
use crate::rpc::RpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub job_id: String,
    /// Restrict to a single phase; omitted means all captured phases.
    #[serde(default)]
    pub phase: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct LogsResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<Vec<String>>,
}

fn parse_phase(raw: &str) -> Result<Phase, RpcError> {
    match raw {
        "build" => Ok(Phase::Build),
        "test" => Ok(Phase::Test),
        "publish" => Ok(Phase::Publish),
        other => Err(RpcError::invalid_params(format!("unknown phase: {other}"))),
    }
}

pub async fn handle(state: &AppState, params: Value) -> Result<Value, RpcError> {
    let params: LogsParams =
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

    let result = match params.phase {
        Some(raw) => {
            let phase = parse_phase(&raw)?;
            let lines = job.logs.for_phase(phase).to_vec();
            match phase {
                Phase::Build => LogsResult { build: Some(lines), ..Default::default() },
                Phase::Test => LogsResult { test: Some(lines), ..Default::default() },
                Phase::Publish => LogsResult { publish: Some(lines), ..Default::default() },
                Phase::None => LogsResult::default(),
            }
        }
        None => LogsResult {
            build: Some(job.logs.build.clone()),
            test: Some(job.logs.test.clone()),
            publish: Some(job.logs.publish.clone()),
        },
    };
    Ok(serde_json::to_value(result).expect("LogsResult always serializes"))
}
