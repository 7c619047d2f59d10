//! # pmoimagecache - Cache-aside par régions pour PMOArtwork
//!
//! Cette crate fournit un cache mémoire générique utilisé par `pmoartwork`
//! pour conserver les images déjà résolues (octets canoniques + validateur).
//!
//! ## Vue d'ensemble
//!
//! - Les entrées sont identifiées par une [`CacheKey`] `purpose:entity:size`
//! - Chaque entrée appartient à une [`Region`] (une par entité, ex: `artist:{id}`)
//!   et éventuellement à des régions de dépendance
//! - [`RegionCache::get_or_populate`] garantit une seule population
//!   concurrente par clé
//! - [`RegionCache::invalidate_region`] supprime toutes les entrées d'une
//!   région, même en concurrence avec des populations en cours
//!
//! ## Architecture
//!
//! ```text
//! pmoimagecache (générique)
//!     ├── key.rs      - Clés et régions
//!     └── store.rs    - RegionCache, populations, invalidation, LRU
//!
//! pmoartwork (spécialisé pour les images d'entités)
//!     └── Utilise RegionCache<CachedImage>
//! ```
//!
//! ## Utilisation
//!
//! ```rust
//! use pmoimagecache::{CacheKey, CacheSettings, Populated, Region, RegionCache};
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: RegionCache<String> = RegionCache::new("demo", CacheSettings::default());
//! let region = Region::new("artist", "a1");
//! let key = CacheKey::canonical("artist", "a1");
//!
//! let value = cache
//!     .get_or_populate(&region, &key, || async {
//!         Ok::<_, Infallible>(Populated::new("portrait".to_string()))
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(value, "portrait");
//!
//! // Une écriture sur l'artiste invalide toutes ses entrées
//! cache.invalidate_region(&region);
//! assert!(cache.get(&key).is_none());
//! # }
//! ```

pub mod key;
pub mod store;

pub use key::{CacheKey, Region};
pub use store::{CacheSettings, CacheStats, Populated, RegionCache};
