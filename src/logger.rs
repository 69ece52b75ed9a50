//! Logging setup.
//!
//! `RUST_LOG` wins over the configured level. With a log directory the
//! output goes to a daily rolling file; otherwise to stdout.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// Keep the returned guard alive for the life of the process, or buffered
/// file output is lost on exit.
pub fn init_logger(log_level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        if std::fs::create_dir_all(dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(dir, "comanda");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            subscriber.with_ansi(false).with_writer(writer).init();
            return Some(guard);
        }
    }

    subscriber.init();
    None
}
