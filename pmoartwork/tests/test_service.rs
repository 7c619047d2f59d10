use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use image::{ImageBuffer, Rgb, Rgba};
use pmoartwork::{
    ArtworkError, ArtworkService, ArtworkSettings, CachedImage, ContentType, EntityKind,
    EntityRef, ImageFilesystem, ImageKind, ImageOptions, ImageRequest, ImageStatus,
    LocalFilesystem, MetadataStore, PlaceholderSet, ResizeSettings, RoleFilter, SqliteStore,
    Validator, FAVORITES_PLAYLIST_ID,
};
use pmoimagecache::{CacheSettings, RegionCache};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Store SQLite instrumenté : compte les lectures, peut échouer ou ralentir.
struct CountingStore {
    inner: SqliteStore,
    lookups: AtomicUsize,
    fail: AtomicBool,
    parents_fail: AtomicBool,
    delay: Duration,
}

impl CountingStore {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            lookups: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            parents_fail: AtomicBool::new(false),
            delay,
        })
    }

    fn add(&self, entity: EntityRef) {
        self.inner.upsert(&entity).unwrap();
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for CountingStore {
    async fn find_entity_image_metadata(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<EntityRef>, ArtworkError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArtworkError::store("database unreachable"));
        }
        self.inner.find_entity_image_metadata(kind, id).await
    }

    async fn find_parent_release_id(&self, track_id: Uuid) -> Result<Option<Uuid>, ArtworkError> {
        if self.parents_fail.load(Ordering::SeqCst) {
            return Err(ArtworkError::store("tracks table locked"));
        }
        self.inner.find_parent_release_id(track_id).await
    }
}

fn build_service(store: Arc<dyn MetadataStore>, settings: ArtworkSettings) -> ArtworkService {
    build_service_with_fs(store, Arc::new(LocalFilesystem), settings)
}

fn build_service_with_fs(
    store: Arc<dyn MetadataStore>,
    fs: Arc<dyn ImageFilesystem>,
    settings: ArtworkSettings,
) -> ArtworkService {
    ArtworkService::new(
        store,
        fs,
        Arc::new(PlaceholderSet::builtin().unwrap()),
        Arc::new(RegionCache::new("test", CacheSettings::default())),
        settings,
    )
}

fn placeholder(kind: EntityKind) -> Bytes {
    PlaceholderSet::builtin()
        .unwrap()
        .get(kind)
        .unwrap()
        .bytes
        .clone()
}

fn jpeg_image(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, _| Rgb([shade, (x % 255) as u8, 40]));
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .unwrap();
    buffer
}

fn png_image(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn dims(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

#[tokio::test]
async fn test_release_without_files_serves_placeholder_then_not_modified() {
    let store = CountingStore::new();
    let release = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()));
    let service = build_service(store.clone(), ArtworkSettings::default());

    let first = service
        .resolve_image(&ImageRequest::new(ImageKind::Release, release))
        .await;
    assert_eq!(first.status, ImageStatus::Success);
    assert_eq!(first.content_type, Some(ContentType::Jpeg));
    assert_eq!(first.bytes.as_ref().unwrap(), &placeholder(EntityKind::Release));

    let etag = first.etag_header().unwrap();
    let second = service
        .resolve_image(&ImageRequest::new(ImageKind::Release, release).if_none_match(etag))
        .await;
    assert_eq!(second.status, ImageStatus::NotModified);
    assert!(second.bytes.is_none());
    assert_eq!(second.validator, first.validator);

    // Validateur périmé : contenu complet
    let third = service
        .resolve_image(&ImageRequest::new(ImageKind::Release, release).if_none_match("\"0000\""))
        .await;
    assert_eq!(third.status, ImageStatus::Success);
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn test_every_kind_has_a_stable_default() {
    let store = CountingStore::new();
    let kinds = [
        ImageKind::Artist,
        ImageKind::Release,
        ImageKind::Track,
        ImageKind::Playlist,
        ImageKind::Collection,
        ImageKind::Label,
        ImageKind::Genre,
        ImageKind::User,
    ];
    let ids: Vec<Uuid> = kinds.iter().map(|_| Uuid::new_v4()).collect();
    for (kind, id) in kinds.iter().zip(&ids) {
        store.add(EntityRef::new(kind.entity(), *id, Utc::now()));
    }
    let service = build_service(store, ArtworkSettings::default());

    for (kind, id) in kinds.iter().zip(&ids) {
        let a = service.resolve_image(&ImageRequest::new(*kind, *id)).await;
        assert_eq!(a.status, ImageStatus::Success, "{}", kind);
        service.invalidate_entity(kind.entity(), *id);
        let b = service.resolve_image(&ImageRequest::new(*kind, *id)).await;
        assert_eq!(a.validator, b.validator, "{}", kind);

        let expected = if *kind == ImageKind::Track {
            EntityKind::Release
        } else {
            kind.entity()
        };
        assert_eq!(a.bytes.unwrap(), placeholder(expected), "{}", kind);
    }

    let user = service.user_image(ids[7], ImageOptions::new()).await;
    assert_eq!(user.content_type, Some(ContentType::Png));
}

#[tokio::test]
async fn test_unknown_entity_is_not_found() {
    let store = CountingStore::new();
    let service = build_service(store.clone(), ArtworkSettings::default());
    let id = Uuid::new_v4();

    let response = service.artist_image(id, ImageOptions::new()).await;
    assert_eq!(response.status, ImageStatus::NotFound);
    assert!(response.bytes.is_none());

    // L'absence est mise en cache jusqu'à invalidation
    service.artist_image(id, ImageOptions::new()).await;
    assert_eq!(store.lookups(), 1);

    store.add(EntityRef::new(EntityKind::Artist, id, Utc::now()));
    service.invalidate_entity(EntityKind::Artist, id);
    let found = service.artist_image(id, ImageOptions::new()).await;
    assert_eq!(found.status, ImageStatus::Success);
}

#[tokio::test]
async fn test_artist_folder_and_secondary_images() {
    let dir = TempDir::new().unwrap();
    let main = jpeg_image(64, 64, 10);
    let first = png_image(32, 32);
    let second = jpeg_image(48, 48, 200);
    write(dir.path(), "artist.jpg", &main);
    write(dir.path(), "artist 2.jpg", &second);
    write(dir.path(), "Artist 1.png", &first);
    write(dir.path(), "notes.txt", b"not an image");

    let store = CountingStore::new();
    let artist = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Artist, artist, Utc::now()).with_location(dir.path()));
    let service = build_service(store, ArtworkSettings::default());

    let primary = service.artist_image(artist, ImageOptions::new()).await;
    assert_eq!(primary.bytes.unwrap().as_ref(), main.as_slice());
    assert_eq!(primary.content_type, Some(ContentType::Jpeg));

    let s0 = service
        .artist_secondary_image(artist, 0, ImageOptions::new())
        .await;
    assert_eq!(s0.bytes.unwrap().as_ref(), first.as_slice());
    assert_eq!(s0.content_type, Some(ContentType::Png));

    let s1 = service
        .artist_secondary_image(artist, 1, ImageOptions::new())
        .await;
    assert_eq!(s1.bytes.unwrap().as_ref(), second.as_slice());

    let s2 = service
        .artist_secondary_image(artist, 2, ImageOptions::new())
        .await;
    assert_eq!(s2.status, ImageStatus::NotFound);
}

#[tokio::test]
async fn test_release_secondary_without_folder_is_not_found() {
    let store = CountingStore::new();
    let release = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()));
    let service = build_service(store, ArtworkSettings::default());

    let response = service
        .release_secondary_image(release, 0, ImageOptions::new())
        .await;
    assert_eq!(response.status, ImageStatus::NotFound);

    // L'emplacement principal a toujours une image
    let primary = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(primary.status, ImageStatus::Success);
}

#[tokio::test]
async fn test_track_thumbnail_file_matches_media_stem() {
    let dir = TempDir::new().unwrap();
    let thumb = jpeg_image(40, 40, 90);
    write(dir.path(), "01 - Intro.jpg", &thumb);
    write(dir.path(), "cover.jpg", &jpeg_image(40, 40, 10));

    let store = CountingStore::new();
    let track = Uuid::new_v4();
    store.add(
        EntityRef::new(EntityKind::Track, track, Utc::now())
            .with_location(dir.path())
            .with_media_stem("01 - Intro"),
    );
    let service = build_service(store, ArtworkSettings::default());

    let response = service.track_image(track, ImageOptions::new()).await;
    assert_eq!(response.bytes.unwrap().as_ref(), thumb.as_slice());
}

#[tokio::test]
async fn test_track_borrows_parent_release_and_follows_its_invalidation() {
    let dir = TempDir::new().unwrap();
    let cover_v1 = jpeg_image(50, 50, 10);
    let cover_v2 = jpeg_image(50, 50, 250);
    let cover_path = write(dir.path(), "cover.jpg", &cover_v1);

    let store = CountingStore::new();
    let release = Uuid::new_v4();
    let track = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()).with_location(dir.path()));
    store.add(
        EntityRef::new(EntityKind::Track, track, Utc::now())
            .with_location(dir.path())
            .with_media_stem("02 - Song")
            .with_parent_release(release),
    );
    let service = build_service(store, ArtworkSettings::default());

    let t1 = service.track_image(track, ImageOptions::new()).await;
    let r1 = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(t1.bytes.as_ref().unwrap().as_ref(), cover_v1.as_slice());
    assert_eq!(t1.validator, r1.validator);

    std::fs::write(&cover_path, &cover_v2).unwrap();
    // Une écriture sur l'album invalide aussi la piste qui emprunte son image
    assert_eq!(service.invalidate_entity(EntityKind::Release, release), 2);

    let t2 = service.track_image(track, ImageOptions::new()).await;
    assert_eq!(t2.bytes.unwrap().as_ref(), cover_v2.as_slice());
}

#[tokio::test]
async fn test_track_without_parent_uses_release_default() {
    let store = CountingStore::new();
    let track = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Track, track, Utc::now()));
    let service = build_service(store, ArtworkSettings::default());

    let response = service.track_image(track, ImageOptions::new()).await;
    assert_eq!(response.bytes.unwrap(), placeholder(EntityKind::Release));
}

#[tokio::test]
async fn test_track_parent_lookup_failure_uses_release_default() {
    let store = CountingStore::new();
    store.parents_fail.store(true, Ordering::SeqCst);
    let track = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Track, track, Utc::now()));
    let service = build_service(store, ArtworkSettings::default());

    let response = service.track_image(track, ImageOptions::new()).await;
    assert_eq!(response.status, ImageStatus::Success);
    assert_eq!(response.bytes.unwrap(), placeholder(EntityKind::Release));
}

#[tokio::test]
async fn test_track_follows_parent_release_created_later() {
    let dir = TempDir::new().unwrap();
    let cover = jpeg_image(50, 50, 120);
    write(dir.path(), "cover.jpg", &cover);

    let store = CountingStore::new();
    let release = Uuid::new_v4();
    let track = Uuid::new_v4();
    store.add(
        EntityRef::new(EntityKind::Track, track, Utc::now())
            .with_media_stem("03 - Later")
            .with_parent_release(release),
    );
    let service = build_service(store.clone(), ArtworkSettings::default());

    // Album encore inconnu : image par défaut d'album
    let before = service.track_image(track, ImageOptions::new()).await;
    assert_eq!(before.bytes.unwrap(), placeholder(EntityKind::Release));

    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()).with_location(dir.path()));
    // L'absence de l'album et la piste sont toutes deux invalidées
    assert_eq!(service.invalidate_entity(EntityKind::Release, release), 2);

    let after = service.track_image(track, ImageOptions::new()).await;
    let release_response = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(after.bytes.unwrap().as_ref(), cover.as_slice());
    assert_eq!(after.validator, release_response.validator);
}

#[tokio::test]
async fn test_inline_thumbnail_is_used_without_files() {
    let thumb = png_image(16, 16);
    let store = CountingStore::new();
    let artist = Uuid::new_v4();
    store.add(
        EntityRef::new(EntityKind::Artist, artist, Utc::now()).with_thumbnail(thumb.clone()),
    );
    let service = build_service(store, ArtworkSettings::default());

    let response = service.artist_image(artist, ImageOptions::new()).await;
    assert_eq!(response.bytes.unwrap().as_ref(), thumb.as_slice());
    assert_eq!(response.content_type, Some(ContentType::Png));
}

#[tokio::test]
async fn test_resize_fits_box_and_keeps_canonical_validator() {
    let dir = TempDir::new().unwrap();
    let cover = jpeg_image(400, 300, 120);
    write(dir.path(), "folder.jpg", &cover);

    let store = CountingStore::new();
    let release = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()).with_location(dir.path()));
    let service = build_service(store, ArtworkSettings::default());

    let full = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(full.bytes.as_ref().unwrap().as_ref(), cover.as_slice());
    let canonical = full.validator.clone().unwrap();
    assert_eq!(canonical, Validator::compute(&cover));

    let small = service
        .release_image(release, ImageOptions::new().with_size(100, 100))
        .await;
    assert_eq!(small.status, ImageStatus::Success);
    let (w, h) = dims(small.bytes.as_ref().unwrap());
    assert!(w <= 100 && h <= 100);
    assert_eq!((w, h), (100, 75));
    let resized_validator = small.validator.clone().unwrap();
    assert_ne!(resized_validator, canonical);
    assert_eq!(
        resized_validator,
        Validator::compute(small.bytes.as_ref().unwrap())
    );

    // Le validateur client est comparé à l'image canonique
    let conditional = service
        .release_image(
            release,
            ImageOptions::new()
                .with_size(100, 100)
                .with_validator(canonical.header_value()),
        )
        .await;
    assert_eq!(conditional.status, ImageStatus::NotModified);

    // Jamais d'agrandissement
    let big = service
        .release_image(release, ImageOptions::new().with_size(2000, 2000))
        .await;
    assert_eq!(big.bytes.unwrap().as_ref(), cover.as_slice());
}

#[tokio::test]
async fn test_default_box_applies_without_requested_size() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "cover.jpg", &jpeg_image(400, 300, 60));

    let store = CountingStore::new();
    let release = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()).with_location(dir.path()));
    let settings = ArtworkSettings {
        resize: ResizeSettings {
            default_width: 80,
            default_height: 80,
            jpeg_quality: 70,
        },
        ..ArtworkSettings::default()
    };
    let service = build_service(store, settings);

    let response = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(dims(response.bytes.as_ref().unwrap()), (80, 60));

    // Une seule dimension : l'autre prend la valeur par défaut
    let response = service
        .release_image(release, ImageOptions::new().with_width(40))
        .await;
    assert_eq!(dims(response.bytes.as_ref().unwrap()), (40, 30));
}

#[tokio::test]
async fn test_invalidation_forces_new_lookup() {
    let store = CountingStore::new();
    let label = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Label, label, Utc::now()));
    let service = build_service(store.clone(), ArtworkSettings::default());

    service.label_image(label, ImageOptions::new()).await;
    service.label_image(label, ImageOptions::new().with_size(10, 10)).await;
    assert_eq!(store.lookups(), 1);

    service.invalidate_entity(EntityKind::Label, label);
    service.label_image(label, ImageOptions::new()).await;
    assert_eq!(store.lookups(), 2);

    // Une autre entité n'est pas touchée
    service.invalidate_entity(EntityKind::Label, Uuid::new_v4());
    service.label_image(label, ImageOptions::new()).await;
    assert_eq!(store.lookups(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_resolve_once() {
    let store = CountingStore::with_delay(Duration::from_millis(50));
    let genre = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Genre, genre, Utc::now()));
    let service = Arc::new(build_service(store.clone(), ArtworkSettings::default()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.genre_image(genre, ImageOptions::new()).await
        }));
    }

    let mut validators = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, ImageStatus::Success);
        validators.push(response.validator.unwrap());
    }
    assert!(validators.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn test_store_failure_is_system_error_and_retried() {
    let store = CountingStore::new();
    let collection = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Collection, collection, Utc::now()));
    let service = build_service(store.clone(), ArtworkSettings::default());

    store.fail.store(true, Ordering::SeqCst);
    let failed = service.collection_image(collection, ImageOptions::new()).await;
    assert_eq!(failed.status, ImageStatus::SystemError);
    assert!(failed.bytes.is_none());
    assert!(service.cache().is_empty());

    store.fail.store(false, Ordering::SeqCst);
    let ok = service.collection_image(collection, ImageOptions::new()).await;
    assert_eq!(ok.status, ImageStatus::Success);
}

#[tokio::test]
async fn test_timeout_is_system_error() {
    let store = CountingStore::with_delay(Duration::from_millis(300));
    let user = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::User, user, Utc::now()));
    let settings = ArtworkSettings {
        request_timeout: Some(Duration::from_millis(20)),
        ..ArtworkSettings::default()
    };
    let service = build_service(store, settings);

    let response = service.user_image(user, ImageOptions::new()).await;
    assert_eq!(response.status, ImageStatus::SystemError);
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_empty_file_falls_through_to_next_step() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "cover.jpg", b"");

    let store = CountingStore::new();
    let release = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Release, release, Utc::now()).with_location(dir.path()));
    let service = build_service(store, ArtworkSettings::default());

    let response = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(response.bytes.unwrap(), placeholder(EntityKind::Release));
}

/// Système de fichiers qui liste un fichier mais refuse de le lire.
struct DenyingFilesystem;

#[async_trait]
impl ImageFilesystem for DenyingFilesystem {
    async fn list_files(&self, dir: &Path, _filter: &RoleFilter) -> io::Result<Vec<PathBuf>> {
        Ok(vec![dir.join("cover.jpg")])
    }

    async fn read_bytes(&self, _path: &Path) -> io::Result<Bytes> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
    }
}

#[tokio::test]
async fn test_io_errors_fall_through() {
    let thumb = jpeg_image(20, 20, 5);
    let store = CountingStore::new();
    let release = Uuid::new_v4();
    let playlist = Uuid::new_v4();
    store.add(
        EntityRef::new(EntityKind::Release, release, Utc::now())
            .with_location("/srv/music/album")
            .with_thumbnail(thumb.clone()),
    );
    store.add(
        EntityRef::new(EntityKind::Playlist, playlist, Utc::now()).with_location("/srv/p.jpg"),
    );
    let service = build_service_with_fs(
        store,
        Arc::new(DenyingFilesystem),
        ArtworkSettings::default(),
    );

    let release_response = service.release_image(release, ImageOptions::new()).await;
    assert_eq!(release_response.bytes.unwrap().as_ref(), thumb.as_slice());

    let playlist_response = service.playlist_image(playlist, ImageOptions::new()).await;
    assert_eq!(
        playlist_response.bytes.unwrap(),
        placeholder(EntityKind::Playlist)
    );
}

#[tokio::test]
async fn test_favorites_playlist_uses_bundled_image() {
    let dir = TempDir::new().unwrap();
    let favorites = png_image(24, 24);
    let path = write(dir.path(), "favorites.png", &favorites);

    let store = CountingStore::new();
    let settings = ArtworkSettings {
        favorites_image: Some(path),
        ..ArtworkSettings::default()
    };
    let service = build_service(store.clone(), settings);

    let response = service
        .playlist_image(FAVORITES_PLAYLIST_ID, ImageOptions::new())
        .await;
    assert_eq!(response.status, ImageStatus::Success);
    assert_eq!(response.bytes.unwrap().as_ref(), favorites.as_slice());
    assert_eq!(response.content_type, Some(ContentType::Png));
    assert_eq!(store.lookups(), 0);

    // Sans fichier configuré : image par défaut des playlists
    let bare = build_service(CountingStore::new(), ArtworkSettings::default());
    let response = bare
        .playlist_image(FAVORITES_PLAYLIST_ID, ImageOptions::new())
        .await;
    assert_eq!(response.bytes.unwrap(), placeholder(EntityKind::Playlist));
}

#[tokio::test]
async fn test_last_modified_comes_from_entity() {
    let when = Utc.with_ymd_and_hms(2023, 6, 4, 18, 30, 5).unwrap();
    let store = CountingStore::new();
    let genre = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Genre, genre, when));
    let service = build_service(store, ArtworkSettings::default());

    let response = service.genre_image(genre, ImageOptions::new()).await;
    assert_eq!(response.last_modified, Some(when));
    assert_eq!(
        response.last_modified_header().as_deref(),
        Some("Sun, 04 Jun 2023 18:30:05 GMT")
    );
}

#[tokio::test]
async fn test_shutdown_flushes_cache() {
    let store = CountingStore::new();
    let artist = Uuid::new_v4();
    store.add(EntityRef::new(EntityKind::Artist, artist, Utc::now()));
    let service = build_service(store.clone(), ArtworkSettings::default());

    service.artist_image(artist, ImageOptions::new()).await;
    assert!(matches!(
        service.cache().get(&pmoimagecache::CacheKey::canonical("artist", artist)),
        Some(CachedImage::Found(_))
    ));

    service.shutdown();
    assert!(service.cache().is_empty());
    service.artist_image(artist, ImageOptions::new()).await;
    assert_eq!(store.lookups(), 2);
}
