//! Service d'images : point d'entrée unique du moteur
//!
//! Pour chaque requête :
//!
//! 1. image canonique depuis le cache, ou résolution par la chaîne de repli
//!    (une seule résolution concurrente par clé)
//! 2. comparaison avec le validateur du client → `NotModified`
//! 3. redimensionnement hors du runtime
//! 4. réponse avec le validateur des octets effectivement servis
//!
//! Toute erreur interne est journalisée et devient `SystemError`.

use async_trait::async_trait;
use pmoimagecache::{CacheKey, CacheStats, Populated, Region, RegionCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ArtworkError;
use crate::fallback::{FallbackResolver, ParentImageSource};
use crate::filesystem::ImageFilesystem;
use crate::kind::{ContentType, EntityKind, ImageKind};
use crate::locator::{EntityLocator, EntityRef, Located, MetadataStore};
use crate::placeholder::PlaceholderProvider;
use crate::request::{ImageOptions, ImageRequest, ImageResponse};
use crate::resize::{resize_blocking, ResizeSettings};
use crate::resolved::{CachedImage, ResolvedImage};
use crate::validator::Validator;

/// Identifiant réservé de la playlist dynamique des favoris.
///
/// Son image est le fichier configuré (`artwork.favorites_image`), sans
/// consultation du store.
pub const FAVORITES_PLAYLIST_ID: Uuid = Uuid::from_u128(0xf0a7_e5c1_0000_4000_8000_0000_0000_0001);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtworkSettings {
    pub resize: ResizeSettings,
    /// Délai maximal d'une requête, sans limite si `None`
    pub request_timeout: Option<Duration>,
    pub favorites_image: Option<PathBuf>,
}

pub struct ArtworkService {
    locator: EntityLocator,
    resolver: FallbackResolver,
    cache: Arc<RegionCache<CachedImage>>,
    settings: ArtworkSettings,
}

impl ArtworkService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fs: Arc<dyn ImageFilesystem>,
        placeholders: Arc<dyn PlaceholderProvider>,
        cache: Arc<RegionCache<CachedImage>>,
        settings: ArtworkSettings,
    ) -> Self {
        Self {
            locator: EntityLocator::new(store),
            resolver: FallbackResolver::new(fs, placeholders),
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &ArtworkSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<RegionCache<CachedImage>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Sert une requête d'image. Ne retourne jamais d'erreur.
    pub async fn resolve_image(&self, request: &ImageRequest) -> ImageResponse {
        let work = self.respond(request);
        let outcome = match self.settings.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(ArtworkError::Timeout(limit)),
            },
            None => work.await,
        };

        match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    "Image {} {} failed: {}",
                    request.kind(),
                    request.id(),
                    e
                );
                ImageResponse::system_error()
            }
        }
    }

    pub async fn artist_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Artist, id, options).await
    }

    pub async fn artist_secondary_image(
        &self,
        id: Uuid,
        index: usize,
        options: ImageOptions,
    ) -> ImageResponse {
        self.resolve_kind(ImageKind::ArtistSecondary(index), id, options)
            .await
    }

    pub async fn release_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Release, id, options).await
    }

    pub async fn release_secondary_image(
        &self,
        id: Uuid,
        index: usize,
        options: ImageOptions,
    ) -> ImageResponse {
        self.resolve_kind(ImageKind::ReleaseSecondary(index), id, options)
            .await
    }

    pub async fn track_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Track, id, options).await
    }

    pub async fn playlist_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Playlist, id, options).await
    }

    pub async fn collection_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Collection, id, options).await
    }

    pub async fn label_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Label, id, options).await
    }

    pub async fn genre_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::Genre, id, options).await
    }

    pub async fn user_image(&self, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_kind(ImageKind::User, id, options).await
    }

    async fn resolve_kind(&self, kind: ImageKind, id: Uuid, options: ImageOptions) -> ImageResponse {
        self.resolve_image(&ImageRequest::with_options(kind, id, options))
            .await
    }

    /// Invalide toutes les entrées d'une région.
    ///
    /// À appeler après toute écriture sur l'entité (ou sur un album dont
    /// des pistes empruntent l'image).
    pub fn invalidate_region(&self, region: &Region) -> usize {
        let n = self.cache.invalidate_region(region);
        tracing::debug!("Invalidated {} entries of {}", n, region);
        n
    }

    pub fn invalidate_entity(&self, kind: EntityKind, id: Uuid) -> usize {
        self.invalidate_region(&kind.region(id))
    }

    /// Vide le cache. Les résolutions en cours ne seront pas conservées.
    pub fn shutdown(&self) {
        let n = self.cache.flush();
        tracing::info!("Artwork service stopped, {} cached images dropped", n);
    }

    async fn respond(&self, request: &ImageRequest) -> Result<ImageResponse, ArtworkError> {
        let image = match self.canonical(request.kind(), request.id()).await? {
            CachedImage::Found(image) => image,
            CachedImage::EntityNotFound | CachedImage::NoImage => {
                return Ok(ImageResponse::not_found())
            }
        };

        let options = request.options();

        // Le validateur client est comparé à l'image canonique
        if let Some(client) = options.validator.as_deref() {
            if image.validator().matches(client) {
                return Ok(ImageResponse::not_modified(
                    image.validator().clone(),
                    image.last_modified(),
                ));
            }
        }

        let resize = self.settings.resize;
        let resized = resize_blocking(
            image.bytes().clone(),
            options.width.unwrap_or(resize.default_width),
            options.height.unwrap_or(resize.default_height),
            options.has_size(),
            resize,
        )
        .await;

        let (validator, content_type) = if resized.was_resized {
            (
                Validator::compute(&resized.bytes),
                ContentType::sniff(&resized.bytes).unwrap_or(image.content_type()),
            )
        } else {
            (image.validator().clone(), image.content_type())
        };

        Ok(ImageResponse::success(
            resized.bytes,
            content_type,
            image.last_modified(),
            validator,
        ))
    }

    async fn canonical(&self, kind: ImageKind, id: Uuid) -> Result<CachedImage, ArtworkError> {
        let region = kind.entity().region(id);
        let key = CacheKey::canonical(kind.purpose(), id);
        self.cache
            .get_or_populate(&region, &key, || self.populate(kind, id))
            .await
    }

    async fn populate(
        &self,
        kind: ImageKind,
        id: Uuid,
    ) -> Result<Populated<CachedImage>, ArtworkError> {
        let entity = if kind == ImageKind::Playlist && id == FAVORITES_PLAYLIST_ID {
            self.favorites_entity().await
        } else {
            match self.locator.locate(kind.entity(), id).await? {
                Located::Found(entity) => entity,
                Located::NotFound => return Ok(Populated::new(CachedImage::EntityNotFound)),
            }
        };

        let mut populated = match self.resolver.resolve(kind, &entity, self).await {
            Some(image) => {
                let dependency = image.source().dependency();
                let populated = Populated::new(CachedImage::Found(Arc::new(image)));
                match dependency {
                    Some(region) => populated.depends_on(region),
                    None => populated,
                }
            }
            None => Populated::new(CachedImage::NoImage),
        };

        // Quelle que soit l'étape retenue, une piste suit son album parent :
        // l'album peut apparaître ou recevoir une image plus tard
        if kind == ImageKind::Track {
            if let Some(release_id) = entity.parent_release_id {
                populated = populated.depends_on(EntityKind::Release.region(release_id));
            }
        }
        Ok(populated)
    }

    async fn favorites_entity(&self) -> EntityRef {
        let mut entity = EntityRef::new(
            EntityKind::Playlist,
            FAVORITES_PLAYLIST_ID,
            chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        );
        if let Some(path) = &self.settings.favorites_image {
            if let Ok(Some(modified)) = self.resolver.filesystem().modified(path).await {
                entity.last_modified = modified;
            }
            entity.location = Some(path.clone());
        }
        entity
    }
}

#[async_trait]
impl ParentImageSource for ArtworkService {
    async fn parent_release_image(
        &self,
        release_id: Uuid,
    ) -> Result<Option<Arc<ResolvedImage>>, ArtworkError> {
        Ok(self
            .canonical(ImageKind::Release, release_id)
            .await?
            .image()
            .cloned())
    }
}
