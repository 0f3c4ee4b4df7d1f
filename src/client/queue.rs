use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::FalConfig;
use crate::error::{classify, Failure, Phase, Result};
use crate::logger::{redact_payload, summarize_response};
use crate::models::{JobHandle, JobStatus, ModelSpec, QueueStatus, Surface};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal success of one job: the body holding the result plus how we got there.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub body: Value,
    pub handle: Option<JobHandle>,
    pub poll_attempts: u32,
}

#[derive(Debug)]
enum JobState {
    Submitting,
    Queued(JobHandle),
    Polling { handle: JobHandle, attempts: u32 },
    Fetching { handle: JobHandle, attempts: u32 },
    Completed(JobOutcome),
}

/// Talks to the direct and queue surfaces. Holds no per-job state, so one instance is
/// shared by every request in flight.
#[derive(Clone)]
pub struct QueueClient {
    http: Client,
    config: Arc<FalConfig>,
    authorization: String,
}

impl QueueClient {
    pub fn new(http: Client, config: Arc<FalConfig>, api_key: &str) -> Self {
        Self {
            http,
            config,
            authorization: format!("Key {}", api_key),
        }
    }

    /// Drive one job from submission to a terminal state.
    pub async fn run(
        &self,
        spec: &ModelSpec,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let mut state = JobState::Submitting;
        loop {
            state = match state {
                JobState::Submitting => {
                    let body = self.submit(spec, payload, cancel).await?;
                    match (spec.surface, request_id(&body)) {
                        (Surface::Queue, Some(request_id)) => JobState::Queued(JobHandle {
                            endpoint: spec.endpoint.clone(),
                            request_id,
                        }),
                        _ => {
                            log::debug!("{} answered synchronously", spec.endpoint);
                            JobState::Completed(JobOutcome {
                                body,
                                handle: None,
                                poll_attempts: 0,
                            })
                        }
                    }
                }
                JobState::Queued(handle) => {
                    log::info!(
                        "Queued {} as request {}",
                        handle.endpoint,
                        handle.request_id
                    );
                    JobState::Polling {
                        handle,
                        attempts: 0,
                    }
                }
                JobState::Polling { handle, attempts } => {
                    if attempts >= self.config.max_poll_attempts {
                        log::warn!(
                            "Request {} still not finished after {} status checks",
                            handle.request_id,
                            attempts
                        );
                        return Err(classify(
                            Phase::Status,
                            Failure::PollBudgetExhausted(attempts),
                        ));
                    }

                    with_cancel(cancel, tokio::time::sleep(self.config.poll_interval))
                        .await
                        .map_err(|failure| classify(Phase::Status, failure))?;
                    let attempts = attempts + 1;

                    match self.poll_once(&handle, attempts, cancel).await? {
                        Some(status) if status.status == JobStatus::Completed => {
                            JobState::Fetching { handle, attempts }
                        }
                        Some(status) if status.status == JobStatus::Failed => {
                            let message = status
                                .error
                                .unwrap_or_else(|| "Unknown error".to_string());
                            log::error!("Request {} failed: {}", handle.request_id, message);
                            return Err(classify(Phase::Status, Failure::JobFailed(message)));
                        }
                        _ => JobState::Polling { handle, attempts },
                    }
                }
                JobState::Fetching { handle, attempts } => {
                    let body = self.fetch_result(&handle, cancel).await?;
                    JobState::Completed(JobOutcome {
                        body,
                        handle: Some(handle),
                        poll_attempts: attempts,
                    })
                }
                JobState::Completed(outcome) => return Ok(outcome),
            };
        }
    }

    /// One status call for an existing job, without waiting or polling.
    pub async fn status(&self, handle: &JobHandle) -> Result<QueueStatus> {
        let request = self
            .authorized(self.http.get(status_url(&self.config, handle)))
            .timeout(self.config.poll_request_timeout);
        exchange(request)
            .await
            .map(|body| QueueStatus::from_value(&body))
            .map_err(|failure| classify(Phase::Status, failure))
    }

    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.config.queue_url());
        let request = self.authorized(self.http.get(&url)).timeout(HEALTH_TIMEOUT);
        match request.send().await {
            Ok(response) => {
                log::debug!("Health check returned {}", response.status());
                response.status().is_success()
            }
            Err(e) => {
                log::warn!("Health check failed: {}", e);
                false
            }
        }
    }

    async fn submit(
        &self,
        spec: &ModelSpec,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let (url, timeout) = match spec.surface {
            Surface::Direct => (
                format!("{}/{}", self.config.base_url(), spec.endpoint),
                self.config.sync_timeout,
            ),
            Surface::Queue => (
                format!("{}/{}", self.config.queue_url(), spec.endpoint),
                self.config.submit_timeout,
            ),
        };
        log::debug!("POST {} {}", url, redact_payload(payload));

        let request = self
            .authorized(self.http.post(&url))
            .timeout(timeout)
            .json(payload);
        let body = with_cancel(cancel, exchange(request))
            .await
            .and_then(|result| result)
            .map_err(|failure| {
                log::error!("Submit to {} failed: {}", spec.endpoint, failure_label(&failure));
                classify(Phase::Submit, failure)
            })?;

        log::debug!("Submit response {}", summarize_response(&body));
        Ok(body)
    }

    /// `Ok(None)` means the check did not produce a usable status (network hiccup,
    /// rate limit, server error) and the next scheduled poll should simply run.
    async fn poll_once(
        &self,
        handle: &JobHandle,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<QueueStatus>> {
        let request = self
            .authorized(self.http.get(status_url(&self.config, handle)))
            .timeout(self.config.poll_request_timeout);

        match with_cancel(cancel, exchange(request))
            .await
            .and_then(|result| result)
        {
            Ok(body) => {
                let status = QueueStatus::from_value(&body);
                log::debug!(
                    "Request {} status {:?} (check {}/{})",
                    handle.request_id,
                    status.status,
                    attempt,
                    self.config.max_poll_attempts
                );
                Ok(Some(status))
            }
            Err(failure) if is_transient(&failure) => {
                log::warn!(
                    "Status check {} for {} failed, will retry: {}",
                    attempt,
                    handle.request_id,
                    failure_label(&failure)
                );
                Ok(None)
            }
            Err(failure) => Err(classify(Phase::Status, failure)),
        }
    }

    async fn fetch_result(&self, handle: &JobHandle, cancel: &CancellationToken) -> Result<Value> {
        let url = format!(
            "{}/{}/requests/{}",
            self.config.queue_url(),
            handle.endpoint,
            handle.request_id
        );
        let request = self
            .authorized(self.http.get(&url))
            .timeout(self.config.poll_request_timeout);

        let body = with_cancel(cancel, exchange(request))
            .await
            .and_then(|result| result)
            .map_err(|failure| classify(Phase::Result, failure))?;
        log::debug!("Result for {} {}", handle.request_id, summarize_response(&body));
        Ok(body)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, &self.authorization)
    }
}

fn status_url(config: &FalConfig, handle: &JobHandle) -> String {
    format!(
        "{}/{}/requests/{}/status",
        config.queue_url(),
        handle.endpoint,
        handle.request_id
    )
}

fn request_id(body: &Value) -> Option<String> {
    body.get("request_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Send a request and parse a JSON body. Non-2xx answers keep their raw body so the
/// classifier can truncate it.
async fn exchange(request: RequestBuilder) -> std::result::Result<Value, Failure> {
    let response = request
        .send()
        .await
        .map_err(|e| Failure::from_reqwest(&e))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Failure::from_reqwest(&e))?;

    if !status.is_success() {
        return Err(Failure::HttpStatus {
            code: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| Failure::Decode(format!("{} ({} bytes)", e, bytes.len())))
}

async fn with_cancel<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> std::result::Result<F::Output, Failure> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Failure::Cancelled),
        output = future => Ok(output),
    }
}

fn is_transient(failure: &Failure) -> bool {
    match failure {
        Failure::Transport { .. } => true,
        Failure::HttpStatus { code, .. } => *code == 429 || (500..600).contains(code),
        _ => false,
    }
}

/// Loggable description that never includes a response body.
fn failure_label(failure: &Failure) -> String {
    match failure {
        Failure::HttpStatus { code, body } => format!("HTTP {} ({} bytes)", code, body.len()),
        Failure::Transport { message, .. } => message.clone(),
        Failure::Decode(message) => format!("undecodable body: {}", message),
        Failure::JobFailed(message) => message.clone(),
        Failure::PollBudgetExhausted(attempts) => format!("{} status checks", attempts),
        Failure::Cancelled => "cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_detection() {
        assert_eq!(
            request_id(&json!({"request_id": "abc", "status": "IN_QUEUE"})).as_deref(),
            Some("abc")
        );
        assert!(request_id(&json!({"images": []})).is_none());
        assert!(request_id(&json!({"request_id": "  "})).is_none());
        assert!(request_id(&json!({"request_id": 12})).is_none());
    }

    #[test]
    fn test_transient_failures() {
        assert!(is_transient(&Failure::Transport {
            timed_out: true,
            message: "timeout".into()
        }));
        assert!(is_transient(&Failure::HttpStatus {
            code: 503,
            body: String::new()
        }));
        assert!(is_transient(&Failure::HttpStatus {
            code: 429,
            body: String::new()
        }));
        assert!(!is_transient(&Failure::HttpStatus {
            code: 404,
            body: String::new()
        }));
        assert!(!is_transient(&Failure::Decode("eof".into())));
        assert!(!is_transient(&Failure::Cancelled));
    }

    #[test]
    fn test_failure_label_hides_body() {
        let label = failure_label(&Failure::HttpStatus {
            code: 500,
            body: "data:image/png;base64,AAAA".into(),
        });
        assert!(!label.contains("base64"));
        assert!(label.contains("500"));
    }

    #[test]
    fn test_status_url_layout() {
        let config = FalConfig::new().with_queue_url("https://queue.example/");
        let handle = JobHandle {
            endpoint: "fal-ai/qwen-image-edit-plus".into(),
            request_id: "r-1".into(),
        };
        assert_eq!(
            status_url(&config, &handle),
            "https://queue.example/fal-ai/qwen-image-edit-plus/requests/r-1/status"
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = with_cancel(&cancel, std::future::pending::<()>()).await;
        assert_eq!(result, Err(Failure::Cancelled));
    }
}
