//! Error types shared across the BuildForge core crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("build already in progress for {0}")]
    LockAlreadyHeld(String),

    #[error("orchestrator transport error: {0}")]
    OrchestratorTransport(String),

    #[error("orchestrator refused submission: {0}")]
    SubmitRefused(String),

    #[error("secret template invalid at {path}: {message}")]
    SecretTemplateInvalid { path: String, message: String },

    #[error("workload not found: {0}")]
    WorkloadNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("test phase submission failed: {0}")]
    TestPhaseSubmitFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
