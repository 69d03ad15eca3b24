//! HTTP client for the aptly work daemon.

use crate::task::AptlyTask;

/// Errors from posting a task to the aptly daemon.
#[derive(Debug, thiserror::Error)]
pub enum AptlyClientError {
    #[error("Failed to reach aptly daemon: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Aptly daemon rejected task: HTTP {0}")]
    Rejected(u16),
}

/// Thin client posting work items to the aptly daemon's task endpoint.
#[derive(Clone)]
pub struct AptlyClient {
    http: reqwest::Client,
    daemon_url: String,
}

impl AptlyClient {
    /// Create a client targeting `daemon_url` (e.g. `http://localhost:8080`).
    pub fn new(daemon_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            daemon_url: daemon_url.into(),
        }
    }

    /// Post a single task to the daemon.
    pub async fn post_task(&self, task: &AptlyTask) -> Result<(), AptlyClientError> {
        let url = format!("{}/api/tasks", self.daemon_url);
        let response = self.http.post(&url).json(&task.wire_json()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AptlyClientError::Rejected(status.as_u16()));
        }

        tracing::debug!(operation = task.operation(), "Aptly task accepted");
        Ok(())
    }
}
