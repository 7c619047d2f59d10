//! Chaînes de repli par type d'image
//!
//! Chaque [`ImageKind`] a une chaîne d'étapes figée, essayée dans l'ordre.
//! La première étape qui produit des octets non vides l'emporte. Une étape
//! en échec (I/O, image absente) est journalisée puis ignorée.
//!
//! ```text
//! Artist            : fichier artist/band/photo → vignette → image par défaut
//! ArtistSecondary(i): i-ème fichier secondaire
//! Release           : fichier cover/folder/... → vignette → image par défaut
//! ReleaseSecondary(i): i-ème fichier secondaire
//! Track             : fichier du même nom que le média → vignette
//!                     → image de l'album parent → image par défaut d'album
//! Playlist, ...     : fichier enregistré → vignette → image par défaut
//! ```

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ArtworkError;
use crate::filesystem::{ImageFilesystem, ImageRole, RoleFilter};
use crate::kind::{ContentType, EntityKind, ImageKind};
use crate::locator::EntityRef;
use crate::placeholder::PlaceholderProvider;
use crate::resolved::{ImageSource, ResolvedImage};

/// Étape d'une chaîne de repli.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep {
    /// Premier fichier du rôle dans le dossier de l'entité
    FolderImage(ImageRole),
    /// Fichier du rôle à l'index demandé dans le dossier de l'entité
    SecondaryImage(ImageRole),
    /// Fichier image enregistré pour l'entité
    StoredFile,
    /// Vignette embarquée dans le store
    Thumbnail,
    /// Image canonique de l'album parent
    ParentRelease,
    /// Image par défaut d'un type d'entité
    Placeholder(EntityKind),
}

const ARTIST_CHAIN: &[FallbackStep] = &[
    FallbackStep::FolderImage(ImageRole::Artist),
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Artist),
];

const ARTIST_SECONDARY_CHAIN: &[FallbackStep] =
    &[FallbackStep::SecondaryImage(ImageRole::ArtistSecondary)];

const RELEASE_CHAIN: &[FallbackStep] = &[
    FallbackStep::FolderImage(ImageRole::Release),
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Release),
];

const RELEASE_SECONDARY_CHAIN: &[FallbackStep] =
    &[FallbackStep::SecondaryImage(ImageRole::ReleaseSecondary)];

const TRACK_CHAIN: &[FallbackStep] = &[
    FallbackStep::FolderImage(ImageRole::TrackThumbnail),
    FallbackStep::Thumbnail,
    FallbackStep::ParentRelease,
    FallbackStep::Placeholder(EntityKind::Release),
];

const PLAYLIST_CHAIN: &[FallbackStep] = &[
    FallbackStep::StoredFile,
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Playlist),
];

const COLLECTION_CHAIN: &[FallbackStep] = &[
    FallbackStep::StoredFile,
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Collection),
];

const LABEL_CHAIN: &[FallbackStep] = &[
    FallbackStep::StoredFile,
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Label),
];

const GENRE_CHAIN: &[FallbackStep] = &[
    FallbackStep::StoredFile,
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::Genre),
];

const USER_CHAIN: &[FallbackStep] = &[
    FallbackStep::StoredFile,
    FallbackStep::Thumbnail,
    FallbackStep::Placeholder(EntityKind::User),
];

impl ImageKind {
    /// Chaîne de repli de ce type d'image.
    pub fn chain(&self) -> &'static [FallbackStep] {
        match self {
            ImageKind::Artist => ARTIST_CHAIN,
            ImageKind::ArtistSecondary(_) => ARTIST_SECONDARY_CHAIN,
            ImageKind::Release => RELEASE_CHAIN,
            ImageKind::ReleaseSecondary(_) => RELEASE_SECONDARY_CHAIN,
            ImageKind::Track => TRACK_CHAIN,
            ImageKind::Playlist => PLAYLIST_CHAIN,
            ImageKind::Collection => COLLECTION_CHAIN,
            ImageKind::Label => LABEL_CHAIN,
            ImageKind::Genre => GENRE_CHAIN,
            ImageKind::User => USER_CHAIN,
        }
    }
}

/// Fournit l'image canonique d'un album à l'étape [`FallbackStep::ParentRelease`].
///
/// Implémenté par le service pour que l'emprunt passe par le cache de
/// l'album.
#[async_trait]
pub trait ParentImageSource: Send + Sync {
    async fn parent_release_image(
        &self,
        release_id: Uuid,
    ) -> Result<Option<Arc<ResolvedImage>>, ArtworkError>;
}

/// Exécute les chaînes de repli.
#[derive(Clone)]
pub struct FallbackResolver {
    fs: Arc<dyn ImageFilesystem>,
    placeholders: Arc<dyn PlaceholderProvider>,
}

impl FallbackResolver {
    pub fn new(fs: Arc<dyn ImageFilesystem>, placeholders: Arc<dyn PlaceholderProvider>) -> Self {
        Self { fs, placeholders }
    }

    pub fn filesystem(&self) -> &Arc<dyn ImageFilesystem> {
        &self.fs
    }

    /// Résout l'image canonique de `entity` pour `kind`.
    ///
    /// Retourne `None` quand la chaîne est épuisée sans résultat (seuls les
    /// emplacements secondaires n'ont pas d'image par défaut).
    pub async fn resolve(
        &self,
        kind: ImageKind,
        entity: &EntityRef,
        parent: &dyn ParentImageSource,
    ) -> Option<ResolvedImage> {
        for step in kind.chain() {
            if let Some(image) = self.try_step(*step, kind, entity, parent).await {
                tracing::debug!(
                    "{} {} resolved by {:?} ({} bytes)",
                    kind,
                    entity.id,
                    step,
                    image.bytes().len()
                );
                return Some(image);
            }
        }
        tracing::debug!("{} {}: no image", kind, entity.id);
        None
    }

    async fn try_step(
        &self,
        step: FallbackStep,
        kind: ImageKind,
        entity: &EntityRef,
        parent: &dyn ParentImageSource,
    ) -> Option<ResolvedImage> {
        match step {
            FallbackStep::FolderImage(role) => {
                let dir = entity.location.as_deref()?;
                let filter = RoleFilter::for_role(role, entity.media_stem.as_deref())?;
                let files = self.list(dir, &filter).await;
                for path in files {
                    if let Some(image) = self.read_file(&path, entity).await {
                        return Some(image);
                    }
                }
                None
            }
            FallbackStep::SecondaryImage(role) => {
                let dir = entity.location.as_deref()?;
                let index = kind.secondary_index()?;
                let filter = RoleFilter::for_role(role, None)?;
                let files = self.list(dir, &filter).await;
                let path = files.get(index)?;
                self.read_file(path, entity).await
            }
            FallbackStep::StoredFile => {
                let path = entity.location.as_deref()?;
                self.read_file(path, entity).await
            }
            FallbackStep::Thumbnail => {
                let thumbnail = entity.thumbnail.as_ref().filter(|t| !t.is_empty())?;
                Some(ResolvedImage::new(
                    thumbnail.clone(),
                    ContentType::detect(thumbnail, entity.kind),
                    entity.last_modified,
                    ImageSource::Thumbnail,
                ))
            }
            FallbackStep::ParentRelease => {
                let release_id = entity.parent_release_id?;
                match parent.parent_release_image(release_id).await {
                    Ok(Some(image)) => Some(image.borrowed(ImageSource::ParentRelease(release_id))),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(
                            "Parent release {} of track {} failed: {}",
                            release_id,
                            entity.id,
                            e
                        );
                        None
                    }
                }
            }
            FallbackStep::Placeholder(placeholder_kind) => {
                let placeholder = self.placeholders.default_image(placeholder_kind)?;
                if placeholder.bytes.is_empty() {
                    return None;
                }
                Some(ResolvedImage::new(
                    placeholder.bytes,
                    placeholder.content_type,
                    entity.last_modified,
                    ImageSource::Placeholder(placeholder_kind),
                ))
            }
        }
    }

    async fn list(&self, dir: &Path, filter: &RoleFilter) -> Vec<std::path::PathBuf> {
        match self.fs.list_files(dir, filter).await {
            Ok(mut files) => {
                filter.sort(&mut files);
                files
            }
            Err(e) => {
                log_io(dir, &e);
                Vec::new()
            }
        }
    }

    async fn read_file(&self, path: &Path, entity: &EntityRef) -> Option<ResolvedImage> {
        match self.fs.read_bytes(path).await {
            Ok(bytes) if !bytes.is_empty() => {
                let content_type = ContentType::detect(&bytes, entity.kind);
                Some(ResolvedImage::new(
                    bytes,
                    content_type,
                    entity.last_modified,
                    ImageSource::File(path.to_path_buf()),
                ))
            }
            Ok(_) => {
                tracing::debug!("Ignoring empty image file {}", path.display());
                None
            }
            Err(e) => {
                log_io(path, &e);
                None
            }
        }
    }
}

fn log_io(path: &Path, e: &io::Error) {
    if e.kind() == io::ErrorKind::NotFound {
        tracing::debug!("{} not found", path.display());
    } else {
        tracing::warn!("Unable to access {}: {}", path.display(), e);
    }
}
