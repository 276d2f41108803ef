use std::error::Error;
use std::fmt;

/// Errors surfaced by the request builder, the chat client and the stream
/// decoder.
///
/// Malformed SSE frames and catalog refresh failures are deliberately absent:
/// the former are skipped silently and the latter only ever keep the previous
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The credential is empty or lacks the `sk-or-v1-` prefix.
    InvalidCredential,
    /// The model identifier is empty.
    InvalidModel,
    /// There is nothing to send.
    EmptyMessages,
    /// The response carried no readable body.
    StreamUnavailable,
    /// DNS, connection or mid-body transport failure.
    NetworkFailure(String),
    /// Non-success status from the chat endpoint, or an error frame received
    /// mid-stream (in which case `status` is `None`).
    UpstreamError {
        status: Option<u16>,
        message: String,
    },
}

impl ChatError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        ChatError::UpstreamError {
            status,
            message: message.into(),
        }
    }

    /// Text shown to the user. Network failures get a more specific hint than
    /// server-side errors, since they usually mean a bad key or no
    /// connectivity.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::InvalidCredential => {
                "Invalid API key format. Set a valid OpenRouter API key (starting with sk-or-v1-)."
                    .to_string()
            }
            ChatError::InvalidModel => "No model selected. Pick a model before sending.".to_string(),
            ChatError::EmptyMessages => "Nothing to send.".to_string(),
            ChatError::StreamUnavailable => "The response body is not readable.".to_string(),
            ChatError::NetworkFailure(_) => {
                "Network error: the API key may be invalid or the network connection has a problem. Check your API key in the settings."
                    .to_string()
            }
            ChatError::UpstreamError { message, .. } => message.clone(),
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::InvalidCredential => write!(f, "invalid credential"),
            ChatError::InvalidModel => write!(f, "invalid model identifier"),
            ChatError::EmptyMessages => write!(f, "message list is empty"),
            ChatError::StreamUnavailable => write!(f, "response body is not readable"),
            ChatError::NetworkFailure(detail) => write!(f, "network failure: {detail}"),
            ChatError::UpstreamError {
                status: Some(code),
                message,
            } => write!(f, "upstream error ({code}): {message}"),
            ChatError::UpstreamError {
                status: None,
                message,
            } => write!(f, "upstream error: {message}"),
        }
    }
}

impl Error for ChatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_is_shown_verbatim() {
        let err = ChatError::upstream(Some(402), "Insufficient credits");
        assert_eq!(err.user_message(), "Insufficient credits");
        assert_eq!(err.to_string(), "upstream error (402): Insufficient credits");
    }

    #[test]
    fn network_failure_mentions_the_key() {
        let text = ChatError::NetworkFailure("connection refused".into()).user_message();
        assert!(text.contains("API key"));
    }
}
