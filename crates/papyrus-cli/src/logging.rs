//! Tracing subscriber setup.
//!
//! Logs go to a daily-rotated `papyrus.log` under the configured log
//! directory and, with `--verbose`, to stderr. Nothing is ever written to
//! stdout: the MCP stdio server owns it for JSON-RPC.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "papyrus";
const KEEP_LOG_FILES: usize = 7;

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "papyrus=debug" } else { "papyrus=info" }
}

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop, so keep it alive for the life of the process.
pub fn init(log_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let console = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });

    let appender = std::fs::create_dir_all(log_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            Builder::new()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .max_log_files(KEEP_LOG_FILES)
                .build(log_dir)
                .map_err(|e| e.to_string())
        });

    let (file, guard) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: file logging disabled, cannot use {}: {}",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(false), "papyrus=info");
        assert_eq!(default_filter(true), "papyrus=debug");
    }
}
