use bytes::Bytes;
use chrono::{DateTime, Utc};
use pmoimagecache::Region;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::kind::{ContentType, EntityKind};
use crate::validator::Validator;

/// Étape de la chaîne qui a produit une image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Thumbnail,
    ParentRelease(Uuid),
    Placeholder(EntityKind),
}

impl ImageSource {
    /// Région supplémentaire dont dépend une image empruntée.
    pub fn dependency(&self) -> Option<Region> {
        match self {
            ImageSource::ParentRelease(id) => Some(EntityKind::Release.region(*id)),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImageSource::Placeholder(_))
    }
}

/// Image canonique (non redimensionnée) d'une entité.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    bytes: Bytes,
    content_type: ContentType,
    last_modified: DateTime<Utc>,
    validator: Validator,
    source: ImageSource,
}

impl ResolvedImage {
    pub fn new(
        bytes: Bytes,
        content_type: ContentType,
        last_modified: DateTime<Utc>,
        source: ImageSource,
    ) -> Self {
        let validator = Validator::compute(&bytes);
        Self {
            bytes,
            content_type,
            last_modified,
            validator,
            source,
        }
    }

    /// Même contenu, attribué à une autre source.
    pub fn borrowed(&self, source: ImageSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }
}

/// Valeur conservée dans le cache pour une clé canonique.
///
/// Les sentinelles sont mises en cache comme les images : une entité
/// inconnue n'est pas recherchée à nouveau avant invalidation de sa région.
#[derive(Debug, Clone)]
pub enum CachedImage {
    Found(Arc<ResolvedImage>),
    EntityNotFound,
    NoImage,
}

impl CachedImage {
    pub fn image(&self) -> Option<&Arc<ResolvedImage>> {
        match self {
            CachedImage::Found(image) => Some(image),
            _ => None,
        }
    }
}
