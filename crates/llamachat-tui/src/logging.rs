use anyhow::Context;
use llamachat_core::{ErrorCollectorLayer, ErrorEntry};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// `<cache dir>/llamachat/llamachat.log`
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("llamachat").join("llamachat.log"))
}

/// Install the global subscriber.
///
/// The terminal owns stdout and stderr, so formatted output goes to a log
/// file and warnings reach the UI through the returned receiver.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<Receiver<ErrorEntry>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let (collector, error_rx) = ErrorCollectorLayer::new();

    let path = log_file.map(Path::to_path_buf).or_else(default_log_path);
    let file_layer = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(collector)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(error_rx)
}
