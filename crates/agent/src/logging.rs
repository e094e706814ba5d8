//! Process-wide logging setup.
//!
//! [`LoggingContext::init`] may be called any number of times; only the first
//! call installs the subscriber. Later calls get a context describing the
//! configuration that is actually active.

use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File written inside [`LoggingConfig::log_dir`].
pub const LOG_FILE_NAME: &str = "drone-agent.log";

const MAX_STRING_LEN: usize = 100;
const MAX_DEPTH: usize = 10;

static ACTIVE: Mutex<Option<LoggingConfig>> = Mutex::new(None);

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Directory for a plain-text copy of the log.
    #[serde(rename = "dir")]
    pub log_dir: Option<PathBuf>,
    /// Colored stderr output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

/// Handle to the active logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingContext {
    config: LoggingConfig,
    newly_initialized: bool,
}

impl LoggingContext {
    /// Installs the global subscriber on first use.
    pub fn init(config: LoggingConfig) -> Result<Self> {
        let mut active = ACTIVE
            .lock()
            .map_err(|_| Error::Logging("logging state poisoned".into()))?;

        if let Some(existing) = active.as_ref() {
            return Ok(Self {
                config: existing.clone(),
                newly_initialized: false,
            });
        }

        install(&config)?;
        *active = Some(config.clone());
        tracing::debug!(level = %config.level, log_dir = ?config.log_dir, "logging configured");

        Ok(Self {
            config,
            newly_initialized: true,
        })
    }

    /// The configuration in effect, which may differ from the one passed to
    /// `init` if logging was already set up.
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn already_initialized(&self) -> bool {
        !self.newly_initialized
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.config.log_dir.as_ref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

fn install(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn", config.level))
    });

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let file = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE_NAME))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Logs a JSON value in readable form under the `data` target.
///
/// Long strings are truncated and deep nesting is cut off.
pub fn log_data(title: &str, data: &Value) {
    tracing::info!(target: "data", "{title} | {}\n{}", type_info(data), format_data(data, 0));
}

fn type_info(data: &Value) -> String {
    match data {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().take(5).map(String::as_str).collect();
            let more = if map.len() > 5 {
                format!("... (total: {})", map.len())
            } else {
                String::new()
            };
            format!("object, size: {}, keys: {keys:?}{more}", map.len())
        }
        Value::Array(items) => format!("array, length: {}", items.len()),
        Value::String(s) => format!("string, length: {}", s.chars().count()),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
    }
}

fn format_data(data: &Value, depth: usize) -> String {
    if depth >= MAX_DEPTH {
        return "... (max depth reached)".to_string();
    }
    let indent = "  ".repeat(depth);

    match data {
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let mut lines = vec!["{".to_string()];
            for (key, value) in map {
                lines.push(format!("{indent}  \"{key}\": {}", format_data(value, depth + 1)));
            }
            lines.push(format!("{indent}}}"));
            lines.join("\n")
        }
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(items) if items.len() <= 5 && items.iter().all(is_scalar) => {
            let inner: Vec<String> = items.iter().map(|v| format_data(v, depth + 1)).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Array(items) => {
            let mut lines = vec!["[".to_string()];
            for item in items {
                lines.push(format!("{indent}  {},", format_data(item, depth + 1)));
            }
            lines.push(format!("{indent}]"));
            lines.join("\n")
        }
        Value::String(s) => {
            let len = s.chars().count();
            if len > MAX_STRING_LEN {
                let head: String = s.chars().take(MAX_STRING_LEN).collect();
                format!("\"{head}...\" (length: {len})")
            } else {
                format!("\"{s}\"")
            }
        }
        other => other.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}
