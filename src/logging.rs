use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking writer flushing until dropped.
#[derive(Debug)]
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

pub fn init_tracing(default_level: &str, log_file: Option<&Path>) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard, ansi) = match log_file {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                (BoxMakeWriter::new(non_blocking), Some(guard), false)
            }
            Err(err) => {
                eprintln!("Warning: failed to open log file {}: {}", path.display(), err);
                (BoxMakeWriter::new(std::io::stderr), None, true)
            }
        },
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);

    if subscriber.try_init().is_err() {
        return LogGuard { _guard: None };
    }

    LogGuard { _guard: guard }
}
