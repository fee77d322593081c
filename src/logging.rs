/// File logging configuration.
///
/// Logs go to `{data_dir}/logs/msgtally.log`. Each run appends to the same
/// file, starting with a separator line.
use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "msgtally.log";

/// Initializes logging under `data_dir`.
///
/// `RUST_LOG` overrides the default `info` filter. Calling this again in the
/// same process only appends another separator.
///
/// # Arguments
///
/// * `data_dir` - Directory holding the store and the `logs/` folder
/// * `session` - Label written in the separator (e.g. the subcommand)
pub fn init_logging(data_dir: &Path, session: &str) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    // Write the separator before the subscriber opens the file
    let separator = format!(
        "\n{sep}\n[{ts}] New session: {session}\n{sep}\n",
        sep = "=".repeat(80),
        ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        session = session
    );
    use std::io::Write;
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))
    {
        let _ = writeln!(file, "{}", separator);
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .ok(); // Already initialized

    tracing::info!("Logging initialized for session: {}", session);

    Ok(())
}
