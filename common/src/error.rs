use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Malformed job: {0}")]
    MalformedJob(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Artifact already exists: {0}")]
    ArtifactExists(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Stitch service returned {status}: {message}")]
    Stitch { status: u16, message: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Render processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Only network-level failures and explicit "service unavailable" responses qualify;
    /// content, validation and configuration errors are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Unavailable(_) => true,
            AppError::Reqwest(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|status| {
                        status.is_server_error() || status.as_u16() == 429
                    })
            }
            AppError::OpenAI(OpenAIError::Reqwest(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient() {
        assert!(AppError::Unavailable("503".into()).is_transient());
    }

    #[test]
    fn content_errors_are_terminal() {
        assert!(!AppError::Validation("bad".into()).is_transient());
        assert!(!AppError::LLMParsing("bad json".into()).is_transient());
        assert!(!AppError::Stitch {
            status: 500,
            message: "encoder crashed".into()
        }
        .is_transient());
        assert!(!AppError::MalformedJob("missing period".into()).is_transient());
    }

    #[test]
    fn stitch_error_keeps_remote_message_verbatim() {
        let err = AppError::Stitch {
            status: 422,
            message: "clip 3 has mismatched codec".into(),
        };
        assert_eq!(
            err.to_string(),
            "Stitch service returned 422: clip 3 has mismatched codec"
        );
    }
}
