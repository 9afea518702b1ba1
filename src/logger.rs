use std::fs;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Initialize structured logging.
///
/// Sets up:
/// - File output: rolling log files in `{data_dir}/logs/jarvis.log`
///   with daily rotation, keeping the latest 5 files.
/// - Console output (stderr): compact human-readable format. stdout is
///   reserved for JSON-line events.
/// - Environment filter: defaults to `info`, configurable via `RUST_LOG`.
///
/// If the log directory cannot be created the file layer is skipped and
/// only stderr logging is installed.
fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact()
}

pub fn init() -> anyhow::Result<()> {
    let log_dir = paths::get_log_dir();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn,mio=warn,cpal=warn")
    });

    let file_appender = fs::create_dir_all(&log_dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("jarvis")
                .filename_suffix("log")
                .max_log_files(5)
                .build(&log_dir)
                .map_err(anyhow::Error::from)
        });

    match file_appender {
        Ok(appender) => {
            let file_layer = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(console_layer())
                .try_init()?;

            tracing::info!(log_dir = %log_dir.display(), "Logger initialized");
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer())
                .try_init()?;

            tracing::warn!(log_dir = %log_dir.display(), "File logging disabled: {}", e);
        }
    }

    Ok(())
}
