//! Localisation des entités dans le store de métadonnées

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ArtworkError;
use crate::kind::EntityKind;

/// Ce que le store sait des images d'une entité.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
    /// Dossier de l'entité (artiste, album) ou fichier image enregistré
    /// (playlist, collection, label, genre, utilisateur)
    pub location: Option<PathBuf>,
    /// Vignette embarquée dans le store
    pub thumbnail: Option<Bytes>,
    /// Nom de base du fichier média (pistes uniquement)
    pub media_stem: Option<String>,
    /// Album parent (pistes uniquement)
    pub parent_release_id: Option<Uuid>,
    pub last_modified: DateTime<Utc>,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid, last_modified: DateTime<Utc>) -> Self {
        Self {
            kind,
            id,
            location: None,
            thumbnail: None,
            media_stem: None,
            parent_release_id: None,
            last_modified,
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<Bytes>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_media_stem(mut self, stem: impl Into<String>) -> Self {
        self.media_stem = Some(stem.into());
        self
    }

    pub fn with_parent_release(mut self, release_id: Uuid) -> Self {
        self.parent_release_id = Some(release_id);
        self
    }
}

/// Résultat d'une localisation.
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    Found(EntityRef),
    NotFound,
}

/// Store de métadonnées consulté par le moteur.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_entity_image_metadata(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<EntityRef>, ArtworkError>;

    async fn find_parent_release_id(&self, track_id: Uuid) -> Result<Option<Uuid>, ArtworkError>;
}

/// Traduit un identifiant en [`EntityRef`].
///
/// Pour une piste, l'album parent est complété par une seconde requête si
/// la première ne l'a pas fourni.
#[derive(Clone)]
pub struct EntityLocator {
    store: Arc<dyn MetadataStore>,
}

impl EntityLocator {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn locate(&self, kind: EntityKind, id: Uuid) -> Result<Located, ArtworkError> {
        let Some(mut entity) = self.store.find_entity_image_metadata(kind, id).await? else {
            tracing::debug!("No {} with id {}", kind, id);
            return Ok(Located::NotFound);
        };

        // Sans album parent, la piste prend l'image par défaut d'album
        if kind == EntityKind::Track && entity.parent_release_id.is_none() {
            entity.parent_release_id = match self.store.find_parent_release_id(id).await {
                Ok(parent) => parent,
                Err(e) => {
                    tracing::warn!("Parent release lookup of track {} failed: {}", id, e);
                    None
                }
            };
        }

        Ok(Located::Found(entity))
    }
}
