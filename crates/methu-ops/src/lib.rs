//! Operational helpers: logging setup and directory bootstrap.

use std::{fs, path::Path};

use methu_types::{config::OpsConfig, MethuError, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| MethuError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| MethuError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Create `dir` unless it already exists as a directory.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(MethuError::Structure(format!(
            "file with name exists: {}",
            dir.display()
        ))),
        Err(_) => fs::create_dir_all(dir).map_err(|err| {
            MethuError::Structure(format!("failed to create {}: {err}", dir.display()))
        }),
    }
}

/// Make sure both working directories exist. Every failure is logged, and
/// the result is true only when both are usable directories.
pub fn ensure_structure(images_dir: &Path, gifs_dir: &Path) -> bool {
    let mut ok = true;
    for dir in [images_dir, gifs_dir] {
        match ensure_directory(dir) {
            Ok(()) => info!("Directory ready at {}", dir.display()),
            Err(err) => {
                error!("Failed to create directory {}: {}", dir.display(), err);
                ok = false;
            }
        }
    }
    ok
}
