use std::time::Duration;

/// Failure talking to a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read stream: {0}")]
    Read(String),

    #[error("malformed stream: {0}")]
    Malformed(String),
}

impl BackendError {
    pub(crate) fn connect(url: &str, err: reqwest::Error) -> Self {
        Self::Connect {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn read(err: reqwest::Error) -> Self {
        Self::Read(err.to_string())
    }

    /// Build a status error from a failed response, keeping a short body excerpt
    pub(crate) async fn from_status(response: reqwest::Response) -> Self {
        const MAX_BODY_CHARS: usize = 200;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body: String = body.trim().chars().take(MAX_BODY_CHARS).collect();
        Self::Status { status, body }
    }
}
