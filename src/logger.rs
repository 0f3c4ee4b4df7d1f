use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::FalConfig;

static PIXFORGE_LOGGER: Lazy<PixforgeLogger> = Lazy::new(PixforgeLogger::new);

/// Strings longer than this that look like base64 are redacted even without a `data:` prefix.
const REDACT_MIN_CHARS: usize = 256;

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    PIXFORGE_LOGGER.update_config(config.clone());

    if let Err(e) = log::set_logger(&*PIXFORGE_LOGGER) {
        return Err(format!("Failed to set logger: {:?}", e));
    }

    log::set_max_level(config.min_level.to_log_level_filter());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "🎨",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_log_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_log_level_filter(&self) -> log::LevelFilter {
        self.to_log_level().to_level_filter()
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// One emitted record, also the JSON line written in JSON mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub target: String,
    pub file: String,
    pub line: u32,
    pub thread_id: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, target: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            target,
            file,
            line,
            thread_id: format!("{:?}", std::thread::current().id()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_thread_id: bool,
    pub show_file_location: bool,
    pub show_target: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
    /// Drop debug and trace records that come from other crates (reqwest, hyper, ...).
    pub quiet_dependencies: bool,
    pub custom_prefix: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_thread_id: false,
            show_file_location: false,
            show_target: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_to_file: false,
            log_file_path: "pixforge.log".to_string(),
            quiet_dependencies: true,
            custom_prefix: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_to_file = true;
        self.log_file_path = path.to_string();
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.custom_prefix = Some(prefix.to_string());
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            log_to_file: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_colors: true,
            show_emojis: true,
            output_json: false,
            show_file_location: true,
            ..Default::default()
        }
    }

    fn accepts(&self, metadata: &Metadata) -> bool {
        if metadata.level() > self.min_level.to_log_level() {
            return false;
        }
        !(self.quiet_dependencies
            && metadata.level() >= Level::Debug
            && !metadata.target().starts_with(env!("CARGO_CRATE_NAME")))
    }
}

pub struct PixforgeLogger {
    config: Arc<Mutex<LoggerConfig>>,
    log_file: Arc<Mutex<Option<File>>>,
}

impl PixforgeLogger {
    pub fn new() -> Self {
        Self {
            config: Arc::new(Mutex::new(LoggerConfig::default())),
            log_file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.lock() {
            *config = new_config.clone();
        }

        if new_config.log_to_file {
            if let Ok(file) = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_config.log_file_path)
            {
                if let Ok(mut log_file) = self.log_file.lock() {
                    *log_file = Some(file);
                }
            }
        }
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if let Some(prefix) = &config.custom_prefix {
            if config.show_colors {
                output.push_str(&format!("[{}] ", prefix.bright_white().bold()));
            } else {
                output.push_str(&format!("[{}] ", prefix));
            }
        }

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if config.show_colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };

        if config.show_colors {
            output.push_str(&format!(
                "[{}] ",
                level_str.color(entry.level.color()).bold()
            ));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if config.show_target && !entry.target.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}: ", entry.target.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.target));
            }
        }

        if config.show_colors {
            output.push_str(&entry.message.white().bold().to_string());
        } else {
            output.push_str(&entry.message);
        }

        if config.show_thread_id {
            if config.show_colors {
                output.push_str(&format!(" [thread:{}]", entry.thread_id.bright_black()));
            } else {
                output.push_str(&format!(" [thread:{}]", entry.thread_id));
            }
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn write_to_file(&self, entry: &LogEntry, config: &LoggerConfig) {
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let content = if config.output_json {
                    serde_json::to_string(entry).unwrap_or_default() + "\n"
                } else {
                    let plain = LoggerConfig {
                        show_colors: false,
                        ..config.clone()
                    };
                    self.format_console_output(entry, &plain) + "\n"
                };
                let _ = file.write_all(content.as_bytes());
                let _ = file.flush();
            }
        }
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.target().to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        )
    }
}

impl Default for PixforgeLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for PixforgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => config.accepts(metadata),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);

        if let Ok(config) = self.config.lock() {
            if config.output_json {
                println!("{}", serde_json::to_string(&entry).unwrap_or_default());
            } else {
                println!("{}", self.format_console_output(&entry, &config));
            }

            if config.log_to_file {
                self.write_to_file(&entry, &config);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let _ = file.flush();
            }
        }
    }
}

/// Logs how long a scope took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(&self) {
        log::info!(
            "⏱️  {} finished in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

/// Copy of `payload` that is safe to log: data URIs and long base64 strings are
/// replaced by a short description of their type and length.
pub fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::String(text) => match redact_text(text) {
            Some(redacted) => Value::String(redacted),
            None => payload.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), redact_payload(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn redact_text(text: &str) -> Option<String> {
    if let Some(rest) = text.strip_prefix("data:") {
        let mime = rest.split([';', ',']).next().unwrap_or_default();
        return Some(format!("<data-uri {}, {} chars>", mime, text.len()));
    }
    let looks_base64 = text.len() >= REDACT_MIN_CHARS
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    looks_base64.then(|| format!("<base64, {} chars>", text.len()))
}

/// Text-scan counterpart of [`redact_payload`] for bodies that may not be JSON.
/// Data URIs and long base64 runs are replaced in place, the rest is kept verbatim.
pub fn redact_body(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(1024));
    let mut rest = text;
    while let Some(first) = rest.chars().next() {
        if rest.starts_with("data:") {
            let end = rest.find(|c: char| !is_data_uri_char(c)).unwrap_or(rest.len());
            let token = &rest[..end];
            out.push_str(&redact_text(token).unwrap_or_else(|| token.to_string()));
            rest = &rest[end..];
            continue;
        }

        let run = rest.find(|c: char| !is_base64_char(c)).unwrap_or(rest.len());
        if run == 0 {
            out.push(first);
            rest = &rest[first.len_utf8()..];
        } else if run >= REDACT_MIN_CHARS {
            out.push_str(&format!("<base64, {} chars>", run));
            rest = &rest[run..];
        } else {
            // `data` can end a short run right before its colon.
            let keep = match rest[..run].strip_suffix("data") {
                Some(head) if rest[run..].starts_with(':') => head.len(),
                _ => run,
            };
            out.push_str(&rest[..keep]);
            rest = &rest[keep..];
        }
    }
    out
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

fn is_data_uri_char(c: char) -> bool {
    is_base64_char(c) || matches!(c, ':' | ';' | ',' | '-' | '.' | '_')
}

/// Key list and serialized size of a response body, never its content.
pub fn summarize_response(body: &Value) -> String {
    let size = serde_json::to_string(body).map(|s| s.len()).unwrap_or(0);
    match body.as_object() {
        Some(map) => format!(
            "{{keys: [{}], {} bytes}}",
            map.keys().cloned().collect::<Vec<_>>().join(", "),
            size
        ),
        None => format!("{{non-object, {} bytes}}", size),
    }
}

pub fn log_startup_info(app_name: &str, version: &str) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("📝 Logger initialized successfully");
}

/// Logs the effective client configuration. The API key itself is never printed.
pub fn log_config_info(config: &FalConfig) {
    log::info!("⚙️  Configuration loaded:");
    log::info!(
        "   API key: {}",
        if config.api_key.is_some() { "✅" } else { "❌" }
    );
    log::info!("   Direct endpoint: {}", config.base_url());
    log::info!("   Queue endpoint: {}", config.queue_url());
    log::info!(
        "   Polling: every {}ms, at most {} checks",
        config.poll_interval.as_millis(),
        config.max_poll_attempts
    );
    log::info!(
        "   Upload pre-processing: {}",
        if config.preprocess_inputs { "✅" } else { "❌" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::Warn.to_log_level_filter(), log::LevelFilter::Warn);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn test_dependency_noise_is_filtered() {
        let config = LoggerConfig::development();
        let ours = Metadata::builder()
            .level(Level::Debug)
            .target("pixforge::client::queue")
            .build();
        let theirs = Metadata::builder()
            .level(Level::Debug)
            .target("hyper::proto")
            .build();
        let their_warning = Metadata::builder()
            .level(Level::Warn)
            .target("hyper::proto")
            .build();
        assert!(config.accepts(&ours));
        assert!(!config.accepts(&theirs));
        assert!(config.accepts(&their_warning));
    }

    #[test]
    fn test_plain_console_format() {
        let logger = PixforgeLogger::new();
        let config = LoggerConfig {
            show_colors: false,
            show_emojis: false,
            include_timestamp: false,
            ..LoggerConfig::default()
        }
        .with_prefix("px");
        let entry = LogEntry::new(
            LogLevel::Warn,
            "slow poll".into(),
            "pixforge".into(),
            "src/x.rs".into(),
            1,
        );
        assert_eq!(
            logger.format_console_output(&entry, &config),
            "[px] [WARN] pixforge: slow poll"
        );
    }

    #[test]
    fn test_redaction_hides_image_payloads() {
        let long_b64 = "QUJD".repeat(100);
        let payload = json!({
            "prompt": "a cat",
            "image_urls": ["https://cdn/x.png", "data:image/jpeg;base64,/9j/4AAQ"],
            "nested": {"raw": long_b64},
            "seed": 3
        });
        let redacted = redact_payload(&payload);
        assert_eq!(redacted["prompt"], "a cat");
        assert_eq!(redacted["image_urls"][0], "https://cdn/x.png");
        assert_eq!(redacted["image_urls"][1], "<data-uri image/jpeg, 31 chars>");
        assert_eq!(redacted["nested"]["raw"], "<base64, 400 chars>");
        assert_eq!(redacted["seed"], 3);
    }

    #[test]
    fn test_body_redaction_scans_plain_text() {
        let uri = format!("data:image/jpeg;base64,{}", "/9j/4AAQ".repeat(40));
        let body = format!(r#"{{"detail":[{{"input":"{}","msg":"too large"}}]}}"#, uri);
        let redacted = redact_body(&body);
        assert_eq!(
            redacted,
            format!(
                r#"{{"detail":[{{"input":"<data-uri image/jpeg, {} chars>","msg":"too large"}}]}}"#,
                uri.len()
            )
        );

        let glued = format!("bad field xdata:image/png;base64,AAAA and {}", "QUJD".repeat(80));
        assert_eq!(
            redact_body(&glued),
            "bad field x<data-uri image/png, 26 chars> and <base64, 320 chars>"
        );

        assert_eq!(redact_body("prompt too long: é ü"), "prompt too long: é ü");
    }

    #[test]
    fn test_response_summary_lists_keys_only() {
        let summary = summarize_response(&json!({"images": ["data:image/png;base64,AAAA"]}));
        assert!(summary.contains("images"));
        assert!(!summary.contains("base64"));
    }
}
