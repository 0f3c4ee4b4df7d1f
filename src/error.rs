use std::fmt;

use thiserror::Error;

use crate::logger::redact_body;

/// Upstream response bodies are cut to this many characters before they end up in an error.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Which remote call a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submit,
    Status,
    Result,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Submit => write!(f, "submit"),
            Phase::Status => write!(f, "status"),
            Phase::Result => write!(f, "result"),
        }
    }
}

/// Coarse error category handed to the route layer, which maps it to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    UpstreamRejected,
    UpstreamTimeout,
    UpstreamFailed,
    Transport,
    MalformedResponse,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upstream rejected {phase} request ({status}): {body}")]
    UpstreamRejected {
        phase: Phase,
        status: u16,
        body: String,
    },

    #[error("Generation timed out after {attempts} status checks")]
    UpstreamTimeout { attempts: u32 },

    #[error("Generation failed: {0}")]
    UpstreamFailed(String),

    #[error("Transport error during {phase}: {message}")]
    TransportError { phase: Phase, message: String },

    #[error("Malformed {phase} response: {message}")]
    MalformedResponse { phase: Phase, message: String },

    #[error("Generation cancelled by caller")]
    Cancelled,

    /// A local worker died before finishing; nothing is wrong with the request itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::ConfigError(_) => ErrorKind::Configuration,
            GenerationError::ValidationError(_) => ErrorKind::Validation,
            GenerationError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            GenerationError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            GenerationError::UpstreamFailed(_) => ErrorKind::UpstreamFailed,
            GenerationError::TransportError { .. } => ErrorKind::Transport,
            GenerationError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            GenerationError::Cancelled => ErrorKind::Cancelled,
            GenerationError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may reasonably resubmit the same request later.
    /// Nothing inside this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::UpstreamRejected { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            GenerationError::UpstreamTimeout { .. } | GenerationError::TransportError { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::ConfigError(_) => "Fal.ai API key not configured".to_string(),
            GenerationError::ValidationError(msg) => msg.clone(),
            GenerationError::UpstreamRejected { status, body, .. } => {
                format!("Fal.ai API Error ({}): {}", status, body)
            }
            GenerationError::UpstreamTimeout { .. } => {
                "Request timed out after 2 minutes".to_string()
            }
            GenerationError::UpstreamFailed(msg) => format!("Generation failed: {}", msg),
            GenerationError::TransportError { message, .. } => {
                format!("Request failed: {}", message)
            }
            GenerationError::MalformedResponse { .. } => {
                "Invalid response from Fal.ai".to_string()
            }
            GenerationError::Cancelled => "Generation cancelled".to_string(),
            GenerationError::Internal(_) => "Internal error, please try again".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Raw description of something that went wrong talking to the remote service,
/// before it is mapped to a [`GenerationError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    HttpStatus { code: u16, body: String },
    Transport { timed_out: bool, message: String },
    Decode(String),
    JobFailed(String),
    PollBudgetExhausted(u32),
    Cancelled,
}

impl Failure {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return Failure::Decode(err.to_string());
        }
        Failure::Transport {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Pure mapping from (phase, failure) to the error surfaced to callers.
pub fn classify(phase: Phase, failure: Failure) -> GenerationError {
    match failure {
        Failure::HttpStatus { code, body } => GenerationError::UpstreamRejected {
            phase,
            status: code,
            body: sanitize(&body),
        },
        Failure::Transport { timed_out, message } => {
            let message = if timed_out {
                format!("{} request timed out: {}", phase, message)
            } else {
                message
            };
            GenerationError::TransportError {
                phase,
                message: sanitize(&message),
            }
        }
        Failure::Decode(message) => GenerationError::MalformedResponse {
            phase,
            message: sanitize(&message),
        },
        Failure::JobFailed(message) => GenerationError::UpstreamFailed(sanitize(&message)),
        Failure::PollBudgetExhausted(attempts) => GenerationError::UpstreamTimeout { attempts },
        Failure::Cancelled => GenerationError::Cancelled,
    }
}

/// Upstream text may echo the uploaded images back, so they are redacted before the cut.
fn sanitize(text: &str) -> String {
    truncate_body(&redact_body(text))
}

/// Cut `body` to [`MAX_ERROR_BODY_CHARS`] characters on a char boundary.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
