use serde::Deserialize;
use serde_json::Value;

use crate::error::to_rpc_error;
use crate::rpc::RpcError;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

pub async fn handle(state: &AppState, params: Value) -> Result<Value, RpcError> {
    let params: HistoryParams = if params.is_null() {
        HistoryParams { limit: None, offset: None }
    } else {
        serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))?
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let page = state
        .storage
        .get_job_history(limit, offset)
        .await
        .map_err(|err| to_rpc_error(err.into()))?;

    Ok(serde_json::to_value(page).expect("JobHistoryPage always serializes"))
}
