//! # Structured Logging Module
//!
//! Environment-aware structured logging for the publishing workers.
//!
//! Console output is human readable unless `PUBLISHER_LOG_FORMAT=json`. When
//! `PUBLISHER_LOG_DIR` is set, a JSON copy of every event is also written to
//! `{dir}/{environment}.{pid}.{timestamp}.log`. `RUST_LOG` overrides the
//! environment-derived level.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};
use uuid::Uuid;

use crate::config::ConfigLoader;
use crate::models::Platform;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize structured logging once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigLoader::detect_environment();
        let log_level = get_log_level(&environment);
        let json_console = std::env::var("PUBLISHER_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let console: BoxedLayer = if json_console {
            fmt::layer()
                .json()
                .with_target(true)
                .with_filter(build_filter(log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(build_filter(log_level))
                .boxed()
        };
        let mut layers = vec![console];

        let mut log_file = None;
        if let Some(log_dir) = std::env::var_os("PUBLISHER_LOG_DIR").map(PathBuf::from) {
            match fs::create_dir_all(&log_dir) {
                Ok(()) => {
                    let file_name = format!(
                        "{}.{}.{}.log",
                        environment,
                        process::id(),
                        Utc::now().format("%Y%m%d_%H%M%S")
                    );
                    let appender = tracing_appender::rolling::never(&log_dir, &file_name);
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    // Keep the writer flushing for the life of the process
                    std::mem::forget(guard);

                    layers.push(
                        fmt::layer()
                            .with_writer(writer)
                            .with_target(true)
                            .with_ansi(false)
                            .json()
                            .with_filter(build_filter(log_level))
                            .boxed(),
                    );
                    log_file = Some(log_dir.join(file_name));
                }
                Err(e) => eprintln!(
                    "publishing-core: cannot create log directory {}: {e}",
                    log_dir.display()
                ),
            }
        }

        if tracing_subscriber::registry().with(layers).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping it");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            json_console = json_console,
            log_file = log_file.as_ref().map(|p| p.display().to_string()),
            "🔧 Structured logging initialized"
        );
    });
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Default level for an environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "test" => "warn",
        "production" => "info",
        _ => "debug",
    }
}

/// Log a task lifecycle operation
pub fn log_task_operation(
    operation: &str,
    task_id: Uuid,
    platform: Option<Platform>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        platform = platform.map(|p| p.as_str()),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log a job-level operation
pub fn log_job_operation(operation: &str, job_id: Uuid, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        job_id = %job_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 JOB_OPERATION"
    );
}

/// Log a queue transport operation
pub fn log_queue_operation(operation: &str, queue: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        queue = %queue,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📬 QUEUE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "warn");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_task_operation("start", Uuid::new_v4(), Some(Platform::YouTube), "uploading", None);
        log_error("worker", "handle_message", "boom", Some("test"));
    }
}
