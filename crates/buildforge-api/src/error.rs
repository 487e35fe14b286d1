//! Mapping from domain errors to JSON-RPC error objects.

use crate::rpc::RpcError;
use buildforge_core::Error;

/// Custom error codes, in the reserved-for-implementation-defined-errors
/// range (JSON-RPC reserves -32000 to -32099 for that).
mod code {
    pub const LOCK_ALREADY_HELD: i64 = -32000;
    pub const NOT_FOUND: i64 = -32001;
    pub const SUBMIT_REFUSED: i64 = -32002;
    pub const SECRET_TEMPLATE_INVALID: i64 = -32003;
    pub const INTERNAL: i64 = -32603;
}

pub fn to_rpc_error(err: Error) -> RpcError {
    match err {
        Error::LockAlreadyHeld(key) => RpcError {
            code: code::LOCK_ALREADY_HELD,
            message: format!("a build is already in progress for {key}"),
            data: None,
        },
        Error::NotFound(id) | Error::WorkloadNotFound(id) => RpcError {
            code: code::NOT_FOUND,
            message: format!("not found: {id}"),
            data: None,
        },
        Error::SubmitRefused(msg) => RpcError {
            code: code::SUBMIT_REFUSED,
            message: format!("orchestrator refused submission: {msg}"),
            data: None,
        },
        Error::SecretTemplateInvalid { path, message } => RpcError {
            code: code::SECRET_TEMPLATE_INVALID,
            message: format!("secret template invalid at {path}: {message}"),
            data: None,
        },
        other => RpcError {
            code: code::INTERNAL,
            message: other.to_string(),
            data: None,
        },
    }
}
