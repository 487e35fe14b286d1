pub mod cancel;
pub mod create;
pub mod history;
pub mod logs;
pub mod status;

use serde_json::Value;

use crate::rpc::RpcError;
use crate::state::AppState;

/// Dispatches an RPC method name to its handler: the five tool calls this
/// service exposes.
pub async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "build.create" => create::handle(state, params).await,
        "build.status" => status::handle(state, params).await,
        "build.logs" => logs::handle(state, params).await,
        "build.cancel" => cancel::handle(state, params).await,
        "build.history" => history::handle(state, params).await,
        other => Err(RpcError::method_not_found(other)),
    }
}
