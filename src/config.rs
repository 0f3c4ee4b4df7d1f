use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://fal.run";
pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";

/// Limits applied to uploaded images before they are base64-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub max_dimension: u32,
    pub target_bytes: usize,
    pub start_quality: u8,
    pub quality_step: u8,
    pub floor_quality: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            max_dimension: 2048,
            target_bytes: 1024 * 1024,
            start_quality: 95,
            quality_step: 10,
            floor_quality: 60,
        }
    }
}

impl PreprocessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_target_bytes(mut self, target_bytes: usize) -> Self {
        self.target_bytes = target_bytes;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FalConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub queue_url: String,
    /// Timeout for the submit call on the queue surface.
    pub submit_timeout: Duration,
    /// Timeout for a blocking call on the direct surface.
    pub sync_timeout: Duration,
    /// Timeout for each status / result call.
    pub poll_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub preprocess_inputs: bool,
    pub preprocess: PreprocessConfig,
}

impl Default for FalConfig {
    fn default() -> Self {
        FalConfig {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            queue_url: DEFAULT_QUEUE_URL.to_string(),
            submit_timeout: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(120),
            poll_request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 60,
            preprocess_inputs: true,
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl FalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut config = FalConfig::default();

        config.api_key = env::var("FAL_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        if let Some(url) = non_empty_env("FAL_BASE_URL") {
            config.base_url = url;
        }
        if let Some(url) = non_empty_env("FAL_QUEUE_URL") {
            config.queue_url = url;
        }
        if let Some(ms) = env_parse::<u64>("FAL_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = env_parse::<u32>("FAL_MAX_POLL_ATTEMPTS") {
            config.max_poll_attempts = attempts;
        }
        if let Some(secs) = env_parse::<u64>("FAL_SUBMIT_TIMEOUT_SECS") {
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("FAL_SYNC_TIMEOUT_SECS") {
            config.sync_timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Point both the direct and the queue surface at `url`. Mostly useful for tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = url.clone();
        self.queue_url = url;
        self
    }

    pub fn with_queue_url(mut self, url: impl Into<String>) -> Self {
        self.queue_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn with_poll_request_timeout(mut self, timeout: Duration) -> Self {
        self.poll_request_timeout = timeout;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.preprocess_inputs = enabled;
        self
    }

    pub fn with_preprocess_config(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn queue_url(&self) -> &str {
        self.queue_url.trim_end_matches('/')
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_env(name).and_then(|value| value.parse().ok())
}
