use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "platmap.log";

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,platmap=debug,platmap_core=debug,platmap_scanner=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
///
/// Everything goes to the activity log when one is given. The terminal only
/// gets warnings while a progress spinner owns it.
pub fn init_logging(log_file: Option<&Path>, verbose: bool, terminal_busy: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let stderr_level = if terminal_busy && !verbose {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}
