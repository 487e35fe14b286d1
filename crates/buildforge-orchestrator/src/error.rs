use thiserror::Error;

/// Errors surfaced by a [`crate::WorkloadClient`] implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("workload submission refused: {0}")]
    SubmitRefused(String),

    #[error("secret template invalid at {path}: {message}")]
    SecretTemplateInvalid { path: String, message: String },

    #[error("workload {0} not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport error (retriable): {0}")]
    RetriableTransport(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for buildforge_core::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::SubmitRefused(msg) => buildforge_core::Error::SubmitRefused(msg),
            ClientError::SecretTemplateInvalid { path, message } => {
                buildforge_core::Error::SecretTemplateInvalid { path, message }
            }
            ClientError::NotFound(id) => buildforge_core::Error::WorkloadNotFound(id),
            ClientError::Transport(msg) | ClientError::RetriableTransport(msg) => {
                buildforge_core::Error::OrchestratorTransport(msg)
            }
        }
    }
}
