//! # pmoartwork - Images d'entités du catalogue musical
//!
//! Cette crate résout, met en cache et sert les images des entités d'une
//! bibliothèque musicale : artistes, albums, pistes, playlists, collections,
//! labels, genres et utilisateurs.
//!
//! ## Fonctionnalités
//!
//! - **Chaînes de repli** : fichier du dossier → vignette embarquée →
//!   image de l'album parent (pistes) → image par défaut
//! - **Cache par régions** : une seule résolution concurrente par image,
//!   invalidation par entité sans perte lors des courses
//! - **Requêtes conditionnelles** : validateur de contenu (ETag) et
//!   réponse `NotModified`
//! - **Redimensionnement** : réduction à la taille demandée, jamais
//!   d'agrandissement
//!
//! ## Architecture
//!
//! ```text
//! ArtworkService (service.rs)
//!     ├── EntityLocator      (locator.rs, db.rs)   - store de métadonnées
//!     ├── FallbackResolver   (fallback.rs)         - chaînes de repli
//!     │     ├── ImageFilesystem   (filesystem.rs)
//!     │     └── PlaceholderProvider (placeholder.rs)
//!     ├── RegionCache<CachedImage> (pmoimagecache)
//!     └── resize / validator
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmoartwork::{ArtworkConfigExt, ImageOptions};
//! use pmoconfig::get_config;
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let service = get_config().create_artwork_service()?;
//! let release_id = Uuid::new_v4();
//!
//! let response = service
//!     .release_image(release_id, ImageOptions::new().with_size(300, 300))
//!     .await;
//! if response.is_success() {
//!     println!("ETag: {:?}", response.etag_header());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod db;
pub mod error;
pub mod fallback;
pub mod filesystem;
pub mod kind;
pub mod locator;
pub mod logging;
pub mod placeholder;
pub mod request;
pub mod resize;
pub mod resolved;
pub mod service;
pub mod validator;

pub use config_ext::ArtworkConfigExt;
pub use db::SqliteStore;
pub use error::ArtworkError;
pub use fallback::{FallbackResolver, FallbackStep, ParentImageSource};
pub use filesystem::{ImageFilesystem, ImageRole, LocalFilesystem, RoleFilter};
pub use kind::{ContentType, EntityKind, ImageKind};
pub use locator::{EntityLocator, EntityRef, Located, MetadataStore};
pub use logging::{init_logging, LogHandle, LoggingSettings};
pub use placeholder::{Placeholder, PlaceholderProvider, PlaceholderSet};
pub use request::{ImageOptions, ImageRequest, ImageResponse, ImageStatus};
pub use resize::{resize, Resized, ResizeSettings};
pub use resolved::{CachedImage, ImageSource, ResolvedImage};
pub use service::{ArtworkService, ArtworkSettings, FAVORITES_PLAYLIST_ID};
pub use validator::{compute_validator, Validator};
