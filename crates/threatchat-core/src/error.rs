use thiserror::Error;

/// Shown when the backend rejects a request without saying why.
pub const GENERIC_FAILURE: &str = "Request failed.";

/// Everything that can go wrong between dispatching a question and rendering
/// its answer. None of these are fatal; each ends up as an error bubble.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never completed (connection refused, DNS, timeout, ...).
    #[error("Could not reach the server: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{}", .message.as_deref().unwrap_or(GENERIC_FAILURE))]
    Status { status: u16, message: Option<String> },

    /// A 2xx body that was not the expected JSON.
    #[error("Malformed response from server: {0}")]
    Decode(#[from] serde_json::Error),

    /// The task carrying the request died before it produced a result.
    #[error("Request was interrupted: {0}")]
    Interrupted(String),
}

impl ChatError {
    /// Text for the bot bubble that replaces a failed answer.
    pub fn bubble_text(&self) -> String {
        format!("❌ {}", self)
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_uses_backend_message() {
        let err = ChatError::Status {
            status: 500,
            message: Some("backend down".to_string()),
        };
        assert_eq!(err.bubble_text(), "❌ backend down");
    }

    #[test]
    fn test_status_falls_back_to_generic_message() {
        let err = ChatError::Status {
            status: 503,
            message: None,
        };
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn test_decode_error_is_prefixed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ChatError::from(json_err);
        assert!(err.bubble_text().starts_with("❌ Malformed response from server"));
    }
}
