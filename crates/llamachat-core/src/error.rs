use thiserror::Error;

/// Failures raised by a [`ChatBackend`](crate::services::ChatBackend).
///
/// Every variant owns plain strings so outcomes carrying an error can be
/// cloned into UI state and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Ollama not reachable at {host}: {message}")]
    Connection { host: String, message: String },

    #[error("Model '{0}' not found")]
    NotFound(String),

    #[error("Failed to download model '{model}': {message}")]
    Download { model: String, message: String },

    #[error("Stream interrupted after {fragments} fragment(s): {message}")]
    StreamInterrupted { fragments: usize, message: String },
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn download(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Classify a streaming failure by how much output was already delivered.
    ///
    /// Nothing delivered means the stream never really started, which is a
    /// connection problem; otherwise the response was cut off mid-way.
    pub fn stream_failure(host: &str, fragments: usize, message: impl Into<String>) -> Self {
        if fragments == 0 {
            Self::connection(host, message)
        } else {
            Self::StreamInterrupted {
                fragments,
                message: message.into(),
            }
        }
    }

    /// Returns a user-friendly message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Connection { host, message } => format!(
                "Could not connect to Ollama at {} ({}). Make sure it is running: ollama serve",
                host, message
            ),
            BackendError::NotFound(model) => format!(
                "Model '{}' is not installed. Pull it with: ollama pull {}",
                model, model
            ),
            BackendError::Download { model, message } => {
                format!("Loading model '{}' failed: {}", model, message)
            }
            BackendError::StreamInterrupted { message, .. } => {
                format!("The response was interrupted: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_failure_without_output_is_connection() {
        let err = BackendError::stream_failure("http://localhost:11434", 0, "refused");
        assert_eq!(
            err,
            BackendError::connection("http://localhost:11434", "refused")
        );
    }

    #[test]
    fn test_stream_failure_after_output_is_interrupted() {
        let err = BackendError::stream_failure("http://localhost:11434", 3, "reset");
        assert!(matches!(
            err,
            BackendError::StreamInterrupted { fragments: 3, .. }
        ));
    }

    #[test]
    fn test_user_message_mentions_pull_for_missing_model() {
        let msg = BackendError::NotFound("gpt-oss:20b".to_string()).user_message();
        assert!(msg.contains("ollama pull gpt-oss:20b"));
    }
}
