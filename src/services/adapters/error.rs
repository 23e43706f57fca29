use thiserror::Error;

/// Failure of an external collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection failure or a 5xx answer. Worth retrying.
    #[error("transport error: {0}")]
    Transport(String),

    /// The time budget ran out. Worth retrying.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The service understood the request and refused it, or answered
    /// with something unusable.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transport(_) | ServiceError::Timeout(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} returned {}: {}", service, status, truncate(body, 200));
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ServiceError::Transport(message)
        } else {
            ServiceError::Protocol(message)
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout(e.to_string())
        } else if e.is_decode() || e.is_builder() {
            ServiceError::Protocol(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::from_status("service", status, &e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Turn a non-success response into the matching error.
pub async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::from_status(service, status, &body))
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
