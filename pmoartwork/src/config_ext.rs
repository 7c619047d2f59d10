//! Extension pour intégrer le service d'images dans pmoconfig
//!
//! Ce module fournit le trait `ArtworkConfigExt` qui lit la section
//! `artwork` de la configuration et construit le service.

use anyhow::Result;
use pmoconfig::Config;
use pmoimagecache::{CacheSettings, RegionCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::db::SqliteStore;
use crate::filesystem::LocalFilesystem;
use crate::logging::{parse_level, LoggingSettings};
use crate::placeholder::PlaceholderSet;
use crate::resize::ResizeSettings;
use crate::service::{ArtworkService, ArtworkSettings};

const DEFAULT_DIMENSION: u64 = 2048;
const DEFAULT_JPEG_QUALITY: u64 = 85;
const DEFAULT_CACHE_SIZE: u64 = 5000;
const DEFAULT_DATABASE: &str = "artwork.db";

/// Trait d'extension de `pmoconfig::Config` pour le service d'images
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmoartwork::ArtworkConfigExt;
///
/// let config = get_config();
/// let service = config.create_artwork_service()?;
/// ```
pub trait ArtworkConfigExt {
    /// Réglages du service (redimensionnement, délai, favoris)
    fn get_artwork_settings(&self) -> Result<ArtworkSettings>;

    /// Taille maximale et durée de vie des entrées du cache
    ///
    /// # Returns
    ///
    /// `artwork.cache.size` (default: 5000, 0 = illimité) et
    /// `artwork.cache.ttl_secs` (default: 0 = pas d'expiration)
    fn get_cache_settings(&self) -> Result<CacheSettings>;

    /// Dossier de surcharge des images par défaut, s'il est configuré
    fn get_placeholders_dir(&self) -> Result<Option<PathBuf>>;

    /// Chemin absolu de la base SQLite (default: "artwork.db")
    fn get_database_path(&self) -> Result<PathBuf>;

    fn get_logging_settings(&self) -> Result<LoggingSettings>;

    /// Construit le service complet : store SQLite, système de fichiers
    /// local, images par défaut et cache.
    fn create_artwork_service(&self) -> Result<ArtworkService>;
}

impl ArtworkConfigExt for Config {
    fn get_artwork_settings(&self) -> Result<ArtworkSettings> {
        let quality = self
            .get_u64(&["artwork", "jpeg_quality"], DEFAULT_JPEG_QUALITY)?
            .clamp(1, 100) as u8;
        let timeout_ms = self.get_u64(&["artwork", "request_timeout_ms"], 0)?;

        Ok(ArtworkSettings {
            resize: ResizeSettings {
                default_width: dimension(self.get_u64(&["artwork", "default_width"], DEFAULT_DIMENSION)?),
                default_height: dimension(self.get_u64(&["artwork", "default_height"], DEFAULT_DIMENSION)?),
                jpeg_quality: quality,
            },
            request_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            favorites_image: self
                .get_string(&["artwork", "favorites_image"])?
                .map(|p| self.resolve_path(&p)),
        })
    }

    fn get_cache_settings(&self) -> Result<CacheSettings> {
        let size = self.get_u64(&["artwork", "cache", "size"], DEFAULT_CACHE_SIZE)?;
        let ttl = self.get_u64(&["artwork", "cache", "ttl_secs"], 0)?;
        Ok(CacheSettings {
            limit: size as usize,
            ttl: (ttl > 0).then(|| Duration::from_secs(ttl)),
        })
    }

    fn get_placeholders_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .get_string(&["artwork", "placeholders", "directory"])?
            .map(|p| self.resolve_path(&p)))
    }

    fn get_database_path(&self) -> Result<PathBuf> {
        let path = self
            .get_string(&["artwork", "database", "path"])?
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        Ok(self.resolve_path(&path))
    }

    fn get_logging_settings(&self) -> Result<LoggingSettings> {
        let level = self.get_log_min_level()?;
        let min_level = parse_level(&level).unwrap_or_else(|| {
            tracing::warn!("Unknown log level '{}', using INFO", level);
            LoggingSettings::default().min_level
        });
        Ok(LoggingSettings {
            min_level,
            enable_console: self.get_log_enable_console()?,
        })
    }

    fn create_artwork_service(&self) -> Result<ArtworkService> {
        let db_path = self.get_database_path()?;
        let store = SqliteStore::open(&db_path)?;
        let placeholders = PlaceholderSet::load(self.get_placeholders_dir()?.as_deref())?;
        let cache = RegionCache::new("artwork", self.get_cache_settings()?);

        tracing::info!("Artwork service using database {}", db_path.display());

        Ok(ArtworkService::new(
            Arc::new(store),
            Arc::new(LocalFilesystem),
            Arc::new(placeholders),
            Arc::new(cache),
            self.get_artwork_settings()?,
        ))
    }
}

fn dimension(value: u64) -> u32 {
    if value == 0 {
        DEFAULT_DIMENSION as u32
    } else {
        value.min(u32::MAX as u64) as u32
    }
}
