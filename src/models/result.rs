use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ImageRef;

/// Remote identifier of a queued job. Only lives as long as the request that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub endpoint: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "IN_QUEUE" => JobStatus::Pending,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" | "ERROR" => JobStatus::Failed,
            _ => JobStatus::Other(status.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Body of `GET .../requests/{id}/status`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub status: JobStatus,
    pub error: Option<String>,
    pub queue_position: Option<u64>,
}

impl QueueStatus {
    pub fn from_value(value: &Value) -> Self {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .map(JobStatus::parse)
            .unwrap_or_else(|| JobStatus::Other(String::new()));

        let error = match value.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self {
            status,
            error,
            queue_position: value.get("queue_position").and_then(Value::as_u64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub model: String,
    pub endpoint: String,
    pub request_id: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Rough USD estimate scaled by output resolution.
    pub cost_estimate: f64,
    pub poll_attempts: u32,
    pub elapsed: Duration,
    pub upstream_timings: Option<Value>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub generation_id: String,
    pub images: Vec<ImageRef>,
    pub seed: Option<i64>,
    pub has_nsfw_concepts: bool,
    /// Set when the service answered successfully but nothing image-like was found.
    pub diagnostic: Option<String>,
    pub metadata: ProviderMetadata,
}

impl GenerationResult {
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn first_url(&self) -> Option<&str> {
        self.images.iter().find_map(ImageRef::url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_status_parsing() {
        let status = QueueStatus::from_value(&json!({"status": "IN_QUEUE", "queue_position": 3}));
        assert_eq!(status.status, JobStatus::Pending);
        assert_eq!(status.queue_position, Some(3));

        let failed = QueueStatus::from_value(&json!({"status": "FAILED", "error": {"code": 7}}));
        assert!(failed.status.is_terminal());
        assert_eq!(failed.error.as_deref(), Some(r#"{"code":7}"#));

        let unknown = QueueStatus::from_value(&json!({}));
        assert!(!unknown.status.is_terminal());
    }
}
