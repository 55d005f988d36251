//! Logging setup.
//!
//! The terminal belongs to the UI, so all `tracing` output goes to a log
//! file.  `RUST_LOG` takes the usual `EnvFilter` directives; without it we
//! log at `info` with the HTTP stack clamped to `warn`.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const NOISY_TARGETS: &[(&str, &str)] = &[("hyper", "warn"), ("hyper_util", "warn"), ("reqwest", "warn"), ("h2", "warn")];

fn build_env_filter(base: &str) -> Result<EnvFilter> {
    let mut directives = vec![base.to_string()];
    for (target, lvl) in NOISY_TARGETS {
        directives.push(format!("{target}={lvl}"));
    }
    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{filter_str}': {e}"))
}

/// Install the global subscriber, appending to `file_path`.
pub fn init(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_file = OpenOptions::new().create(true).append(true).open(file_path)?;

    let base = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(&base)?)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .init();

    tracing::debug!("Logging initialized: level={base}, file={file_path}");
    Ok(())
}
