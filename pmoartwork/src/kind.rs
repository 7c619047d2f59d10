//! Types d'entités et types d'images servis
//!
//! [`EntityKind`] désigne une entité du catalogue (une ligne du store).
//! [`ImageKind`] désigne l'image demandée : les emplacements secondaires
//! portent leur index dans la variante elle-même.

use pmoimagecache::Region;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ArtworkError;

/// Entité adressable du catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Release,
    Track,
    Playlist,
    Collection,
    Label,
    Genre,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Artist,
        EntityKind::Release,
        EntityKind::Track,
        EntityKind::Playlist,
        EntityKind::Collection,
        EntityKind::Label,
        EntityKind::Genre,
        EntityKind::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Release => "release",
            EntityKind::Track => "track",
            EntityKind::Playlist => "playlist",
            EntityKind::Collection => "collection",
            EntityKind::Label => "label",
            EntityKind::Genre => "genre",
            EntityKind::User => "user",
        }
    }

    /// Région d'invalidation de l'entité `id` (ex: `artist:{id}`).
    pub fn region(&self, id: Uuid) -> Region {
        Region::new(self.as_str(), id)
    }

    /// Type de contenu par défaut des images de ce type d'entité.
    pub fn default_content_type(&self) -> ContentType {
        match self {
            EntityKind::User => ContentType::Png,
            _ => ContentType::Jpeg,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ArtworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArtworkError::invalid_record("kind", s))
    }
}

/// Image demandée pour une entité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Artist,
    ArtistSecondary(usize),
    Release,
    ReleaseSecondary(usize),
    Track,
    Playlist,
    Collection,
    Label,
    Genre,
    User,
}

impl ImageKind {
    /// Entité dont l'image est demandée.
    pub fn entity(&self) -> EntityKind {
        match self {
            ImageKind::Artist | ImageKind::ArtistSecondary(_) => EntityKind::Artist,
            ImageKind::Release | ImageKind::ReleaseSecondary(_) => EntityKind::Release,
            ImageKind::Track => EntityKind::Track,
            ImageKind::Playlist => EntityKind::Playlist,
            ImageKind::Collection => EntityKind::Collection,
            ImageKind::Label => EntityKind::Label,
            ImageKind::Genre => EntityKind::Genre,
            ImageKind::User => EntityKind::User,
        }
    }

    /// Étiquette de la clé de cache.
    ///
    /// Les images secondaires d'une même entité ont chacune leur étiquette
    /// mais partagent la région de l'entité.
    pub fn purpose(&self) -> String {
        match self {
            ImageKind::ArtistSecondary(i) => format!("artist_secondary_{}", i),
            ImageKind::ReleaseSecondary(i) => format!("release_secondary_{}", i),
            other => other.entity().as_str().to_string(),
        }
    }

    pub fn secondary_index(&self) -> Option<usize> {
        match self {
            ImageKind::ArtistSecondary(i) | ImageKind::ReleaseSecondary(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.purpose())
    }
}

/// Type MIME d'une image servie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Jpeg => "image/jpeg",
            ContentType::Png => "image/png",
            ContentType::Gif => "image/gif",
            ContentType::Webp => "image/webp",
            ContentType::Bmp => "image/bmp",
        }
    }

    /// Devine le type à partir des octets magiques.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ContentType::Jpeg),
            image::ImageFormat::Png => Some(ContentType::Png),
            image::ImageFormat::Gif => Some(ContentType::Gif),
            image::ImageFormat::WebP => Some(ContentType::Webp),
            image::ImageFormat::Bmp => Some(ContentType::Bmp),
            _ => None,
        }
    }

    /// Type détecté, ou le type par défaut de `kind` si les octets sont
    /// méconnaissables.
    pub fn detect(bytes: &[u8], kind: EntityKind) -> Self {
        Self::sniff(bytes).unwrap_or_else(|| kind.default_content_type())
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
