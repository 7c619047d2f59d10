//! Accès au système de fichiers et reconnaissance des fichiers d'images
//!
//! Les rôles sont reconnus au nom de fichier :
//!
//! | Rôle | Noms reconnus |
//! |------|---------------|
//! | Artiste | `artist`, `band`, `photo` |
//! | Artiste secondaire | `artist` + séparateur optionnel + numéro ≥ 1 (`artist 1`, `artist_02`) |
//! | Album | `cover`, `folder`, `front`, `release`, `album` |
//! | Album secondaire | `release`/`cover`/`front` + numéro ≥ 1, ou `back`, `inlay`, `disc`, `cd` (+ numéro optionnel) |
//! | Vignette de piste | même nom de base que le fichier média |
//!
//! Extensions : jpg, jpeg, png, gif, bmp, webp, sans tenir compte de la casse.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};

static IMAGE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png|gif|bmp|webp)$").unwrap());

static ARTIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(artist|band|photo)\.(jpe?g|png|gif|bmp|webp)$").unwrap());

static ARTIST_SECONDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^artist[ _.\-]?0*[1-9][0-9]*\.(jpe?g|png|gif|bmp|webp)$").unwrap()
});

static RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(cover|folder|front|release|album)\.(jpe?g|png|gif|bmp|webp)$").unwrap()
});

static RELEASE_SECONDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^((release|cover|front)[ _.\-]?0*[1-9][0-9]*|(back|inlay|disc|cd)([ _.\-]?[0-9]+)?)\.(jpe?g|png|gif|bmp|webp)$",
    )
    .unwrap()
});

const ARTIST_PRIORITY: [&str; 3] = ["artist", "band", "photo"];
const RELEASE_PRIORITY: [&str; 5] = ["cover", "folder", "front", "release", "album"];

/// Rôle d'une image dans le dossier d'une entité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    Artist,
    ArtistSecondary,
    Release,
    ReleaseSecondary,
    TrackThumbnail,
}

/// Filtre de noms de fichiers passé au système de fichiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleFilter {
    Artist,
    ArtistSecondary,
    Release,
    ReleaseSecondary,
    TrackThumbnail { media_stem: String },
}

impl RoleFilter {
    /// Filtre d'un rôle, `None` si le rôle exige un nom de média absent.
    pub fn for_role(role: ImageRole, media_stem: Option<&str>) -> Option<Self> {
        Some(match role {
            ImageRole::Artist => RoleFilter::Artist,
            ImageRole::ArtistSecondary => RoleFilter::ArtistSecondary,
            ImageRole::Release => RoleFilter::Release,
            ImageRole::ReleaseSecondary => RoleFilter::ReleaseSecondary,
            ImageRole::TrackThumbnail => RoleFilter::TrackThumbnail {
                media_stem: media_stem.filter(|s| !s.is_empty())?.to_string(),
            },
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            RoleFilter::Artist => ARTIST.is_match(file_name),
            RoleFilter::ArtistSecondary => ARTIST_SECONDARY.is_match(file_name),
            RoleFilter::Release => RELEASE.is_match(file_name),
            RoleFilter::ReleaseSecondary => RELEASE_SECONDARY.is_match(file_name),
            RoleFilter::TrackThumbnail { media_stem } => {
                IMAGE_EXT.is_match(file_name)
                    && file_stem(file_name).eq_ignore_ascii_case(media_stem)
            }
        }
    }

    /// Ordonne des candidats : par priorité de nom pour les rôles
    /// principaux, puis par nom sans tenir compte de la casse.
    pub fn sort(&self, files: &mut [PathBuf]) {
        files.sort_by_cached_key(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            (self.priority(&name), name)
        });
    }

    fn priority(&self, lower_name: &str) -> usize {
        let names: &[&str] = match self {
            RoleFilter::Artist => &ARTIST_PRIORITY,
            RoleFilter::Release => &RELEASE_PRIORITY,
            _ => return 0,
        };
        let stem = file_stem(lower_name);
        names.iter().position(|n| *n == stem).unwrap_or(names.len())
    }
}

fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}

/// Accès en lecture aux fichiers images.
#[async_trait]
pub trait ImageFilesystem: Send + Sync {
    /// Fichiers de `dir` dont le nom passe le filtre.
    async fn list_files(&self, dir: &Path, filter: &RoleFilter) -> io::Result<Vec<PathBuf>>;

    async fn read_bytes(&self, path: &Path) -> io::Result<Bytes>;

    /// Date de modification, si le système la connaît.
    async fn modified(&self, _path: &Path) -> io::Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// Système de fichiers local (tokio::fs).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

#[async_trait]
impl ImageFilesystem for LocalFilesystem {
    async fn list_files(&self, dir: &Path, filter: &RoleFilter) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !filter.matches(name) {
                continue;
            }
            // Suit les liens symboliques
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => files.push(path),
                _ => {}
            }
        }

        filter.sort(&mut files);
        Ok(files)
    }

    async fn read_bytes(&self, path: &Path) -> io::Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    async fn modified(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(meta.modified().ok().map(DateTime::<Utc>::from))
    }
}
