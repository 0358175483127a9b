//! Error taxonomy shared by the retrieval and synthesis pipeline.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The embedding or chat backend is unconfigured, unreachable, or
    /// returned a failure. Retryable by the user.
    #[error("AI service error: {0}")]
    AiService(String),
    /// Malformed input, e.g. mismatched evaluation sequences.
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn ai_service(message: impl Into<String>) -> Self {
        Self::AiService(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_ai_service(&self) -> bool {
        matches!(self, Self::AiService(_))
    }
}
