//! Clés et régions du cache
//!
//! Une clé identifie une entrée (`purpose:entity:size`), une région regroupe
//! toutes les entrées d'une même entité afin de pouvoir les invalider d'un
//! seul coup (`artist:{id}`, `release:{id}`, ...).

use std::fmt;

/// Région d'invalidation : une par instance d'entité.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(String);

impl Region {
    /// Construit la région `{scope}:{id}`.
    ///
    /// # Exemple
    ///
    /// ```
    /// use pmoimagecache::Region;
    ///
    /// let region = Region::new("artist", 42);
    /// assert_eq!(region.as_str(), "artist:42");
    /// ```
    pub fn new(scope: &str, id: impl fmt::Display) -> Self {
        Self(format!("{}:{}", scope, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clé d'une entrée du cache.
///
/// La largeur et la hauteur demandées sont repliées en un seul `size_hint`
/// (`width + height`, `0` pour l'entrée canonique non redimensionnée).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    purpose: String,
    entity_id: String,
    size_hint: u32,
}

impl CacheKey {
    /// Clé de l'entrée canonique (`size_hint == 0`).
    pub fn canonical(purpose: impl Into<String>, entity_id: impl fmt::Display) -> Self {
        Self {
            purpose: purpose.into(),
            entity_id: entity_id.to_string(),
            size_hint: 0,
        }
    }

    /// Clé d'une variante dimensionnée.
    ///
    /// ```
    /// use pmoimagecache::CacheKey;
    ///
    /// let key = CacheKey::sized("artist", "a1", Some(80), Some(80));
    /// assert_eq!(key.to_string(), "artist:a1:160");
    /// assert!(!key.is_canonical());
    /// ```
    pub fn sized(
        purpose: impl Into<String>,
        entity_id: impl fmt::Display,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Self {
        let size_hint = width.unwrap_or(0).saturating_add(height.unwrap_or(0));
        Self {
            purpose: purpose.into(),
            entity_id: entity_id.to_string(),
            size_hint,
        }
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn size_hint(&self) -> u32 {
        self.size_hint
    }

    pub fn is_canonical(&self) -> bool {
        self.size_hint == 0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.purpose, self.entity_id, self.size_hint)
    }
}
