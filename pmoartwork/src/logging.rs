//! Initialisation du logging (tracing)
//!
//! Un filtre de niveau rechargeable est posé avant la sortie console, ce
//! qui permet de changer le niveau à chaud via [`LogHandle::set_level`].

use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
    Registry,
};

use crate::error::ArtworkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingSettings {
    pub min_level: LevelFilter,
    pub enable_console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            min_level: LevelFilter::INFO,
            enable_console: true,
        }
    }
}

/// Poignée sur le filtre installé par [`init_logging`].
#[derive(Clone)]
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: LevelFilter) -> Result<(), ArtworkError> {
        self.reload_handle
            .reload(level)
            .map_err(|e| ArtworkError::Logging(e.to_string()))?;
        tracing::info!("Log level set to {}", level);
        Ok(())
    }

    pub fn level(&self) -> Option<LevelFilter> {
        self.reload_handle.clone_current()
    }
}

/// Installe le subscriber global.
///
/// Si un subscriber global existe déjà (tests, binaire hôte), il est
/// conservé et la poignée retournée n'a pas d'effet.
pub fn init_logging(settings: &LoggingSettings) -> LogHandle {
    let (filter, reload_handle) = reload::Layer::new(settings.min_level);
    let subscriber = Registry::default().with(filter);

    let installed = if settings.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already set, keeping it");
    }

    LogHandle { reload_handle }
}

/// Convertit un nom de niveau (`INFO`, `debug`, ...) en filtre.
pub fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_uppercase().as_str() {
        "OFF" => Some(LevelFilter::OFF),
        "ERROR" => Some(LevelFilter::from_level(Level::ERROR)),
        "WARN" | "WARNING" => Some(LevelFilter::from_level(Level::WARN)),
        "INFO" => Some(LevelFilter::from_level(Level::INFO)),
        "DEBUG" => Some(LevelFilter::from_level(Level::DEBUG)),
        "TRACE" => Some(LevelFilter::from_level(Level::TRACE)),
        _ => None,
    }
}
