//! File logging through `tracing`. The terminal belongs to the UI, so nothing
//! is ever written to stderr while the app runs.

use crate::cache::{CacheManager, LOG_FILE};
use crate::config::LoggingConfig;
use color_eyre::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub file: PathBuf,
}

impl LogSettings {
    /// `--debug` beats the configured level; `--log-file` beats the configured
    /// file, which beats the cache directory.
    pub fn resolve(
        config: &LoggingConfig,
        debug: bool,
        log_file: Option<&Path>,
        cache: &CacheManager,
    ) -> Self {
        let level = if debug {
            Level::DEBUG
        } else {
            config.level.parse().unwrap_or(Level::INFO)
        };
        let file = log_file
            .map(Path::to_path_buf)
            .or_else(|| config.file.clone())
            .unwrap_or_else(|| cache.cache_file(LOG_FILE));
        Self { level, file }
    }

    /// `RUST_LOG` when set, otherwise this crate at `level`.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,tfsview={}",
                self.level.as_str().to_lowercase()
            ))
        })
    }
}

/// Install the global subscriber, appending to the log file.
pub fn init(settings: &LogSettings) -> Result<()> {
    if let Some(parent) = settings.file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)?;
    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);
    tracing_subscriber::registry()
        .with(settings.filter())
        .with(layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_config_level() {
        let cache = CacheManager::with_dir(PathBuf::from("/tmp/tfsview-test"));
        let config = LoggingConfig {
            level: "warn".into(),
            file: None,
        };
        let settings = LogSettings::resolve(&config, true, None, &cache);
        assert_eq!(settings.level, Level::DEBUG);
        assert_eq!(settings.file, cache.cache_file(LOG_FILE));
    }

    #[test]
    fn explicit_log_file_wins() {
        let cache = CacheManager::with_dir(PathBuf::from("/tmp/tfsview-test"));
        let config = LoggingConfig {
            level: "error".into(),
            file: Some(PathBuf::from("/var/tmp/configured.log")),
        };
        let settings =
            LogSettings::resolve(&config, false, Some(Path::new("cli.log")), &cache);
        assert_eq!(settings.level, Level::ERROR);
        assert_eq!(settings.file, PathBuf::from("cli.log"));
    }
}
