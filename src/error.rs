use thiserror::Error;

/// Failures talking to the agro backend.
///
/// Every variant is recoverable: controllers turn them into a user-facing
/// message or notification and return to idle.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Connection to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend returned status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Backend reported failure")]
    Rejected { message: Option<String> },

    #[error("Malformed response: {detail}")]
    Malformed { detail: String },
}

impl ApiError {
    /// Message supplied by the server, when it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } | Self::Rejected { message } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
