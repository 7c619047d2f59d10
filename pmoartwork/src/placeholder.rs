//! Images par défaut
//!
//! Chaque type d'entité possède une image de repli, générée au démarrage.
//! Un dossier de surcharge peut fournir ses propres fichiers
//! (`artist.jpg`, `release.jpg`, ..., `user.png`).

use bytes::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ArtworkError;
use crate::kind::{ContentType, EntityKind};
use crate::resize::{encode_jpeg, encode_png};

const PLACEHOLDER_SIZE: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub bytes: Bytes,
    pub content_type: ContentType,
}

/// Source des images par défaut.
pub trait PlaceholderProvider: Send + Sync {
    fn default_image(&self, kind: EntityKind) -> Option<Placeholder>;
}

#[derive(Debug, Clone, Default)]
pub struct PlaceholderSet {
    images: HashMap<EntityKind, Placeholder>,
}

impl PlaceholderSet {
    /// Images intégrées : un fond uni teinté par type d'entité.
    ///
    /// Les pistes n'ont pas d'image propre, elles empruntent celle de leur
    /// album.
    pub fn builtin() -> Result<Self, ArtworkError> {
        let mut images = HashMap::new();
        for kind in EntityKind::ALL {
            if kind == EntityKind::Track {
                continue;
            }
            images.insert(kind, render(kind)?);
        }
        Ok(Self { images })
    }

    /// Images intégrées, surchargées par les fichiers de `dir` s'il existe.
    pub fn load(dir: Option<&Path>) -> Result<Self, ArtworkError> {
        let mut set = Self::builtin()?;
        let Some(dir) = dir else {
            return Ok(set);
        };

        for kind in EntityKind::ALL {
            if kind == EntityKind::Track {
                continue;
            }
            for ext in ["jpg", "jpeg", "png"] {
                let path = dir.join(format!("{}.{}", kind.as_str(), ext));
                match std::fs::read(&path) {
                    Ok(data) if !data.is_empty() => {
                        tracing::info!("Using placeholder override {}", path.display());
                        let content_type = ContentType::detect(&data, kind);
                        set = set.with_image(
                            kind,
                            Placeholder {
                                bytes: Bytes::from(data),
                                content_type,
                            },
                        );
                        break;
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!("Unable to read placeholder {}: {}", path.display(), e)
                    }
                }
            }
        }
        Ok(set)
    }

    pub fn with_image(mut self, kind: EntityKind, placeholder: Placeholder) -> Self {
        self.images.insert(kind, placeholder);
        self
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Placeholder> {
        self.images.get(&kind)
    }
}

impl PlaceholderProvider for PlaceholderSet {
    fn default_image(&self, kind: EntityKind) -> Option<Placeholder> {
        self.images.get(&kind).cloned()
    }
}

fn tint(kind: EntityKind) -> [u8; 3] {
    match kind {
        EntityKind::Artist => [92, 74, 114],
        EntityKind::Release | EntityKind::Track => [58, 78, 104],
        EntityKind::Playlist => [70, 104, 82],
        EntityKind::Collection => [110, 92, 60],
        EntityKind::Label => [104, 64, 64],
        EntityKind::Genre => [64, 100, 104],
        EntityKind::User => [96, 96, 96],
    }
}

fn render(kind: EntityKind) -> Result<Placeholder, ArtworkError> {
    let [r, g, b] = tint(kind);
    let inset = PLACEHOLDER_SIZE / 4;
    let img = RgbImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
        let inside = (inset..PLACEHOLDER_SIZE - inset).contains(&x)
            && (inset..PLACEHOLDER_SIZE - inset).contains(&y);
        if inside {
            Rgb([r.saturating_add(40), g.saturating_add(40), b.saturating_add(40)])
        } else {
            Rgb([r, g, b])
        }
    });
    let img = DynamicImage::ImageRgb8(img);

    let content_type = kind.default_content_type();
    let data = match content_type {
        ContentType::Png => encode_png(&img)?,
        _ => encode_jpeg(&img, 85)?,
    };
    Ok(Placeholder {
        bytes: Bytes::from(data),
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_covers_every_kind_but_track() {
        let set = PlaceholderSet::builtin().unwrap();
        for kind in EntityKind::ALL {
            let p = set.default_image(kind);
            if kind == EntityKind::Track {
                assert!(p.is_none());
                continue;
            }
            let p = p.unwrap();
            assert_eq!(p.content_type, kind.default_content_type());
            assert_eq!(ContentType::sniff(&p.bytes), Some(p.content_type));
        }
        assert_ne!(
            set.get(EntityKind::Artist).unwrap().bytes,
            set.get(EntityKind::Release).unwrap().bytes
        );
    }

    #[test]
    fn test_builtin_is_deterministic() {
        let a = PlaceholderSet::builtin().unwrap();
        let b = PlaceholderSet::builtin().unwrap();
        assert_eq!(a.get(EntityKind::Label), b.get(EntityKind::Label));
    }

    #[test]
    fn test_override_directory() {
        let dir = TempDir::new().unwrap();
        let custom = encode_png(&DynamicImage::ImageRgb8(RgbImage::new(4, 4))).unwrap();
        std::fs::write(dir.path().join("genre.png"), &custom).unwrap();
        std::fs::write(dir.path().join("track.png"), &custom).unwrap();

        let set = PlaceholderSet::load(Some(dir.path())).unwrap();
        let genre = set.get(EntityKind::Genre).unwrap();
        assert_eq!(genre.bytes.as_ref(), custom.as_slice());
        assert_eq!(genre.content_type, ContentType::Png);
        assert_eq!(
            set.get(EntityKind::Artist),
            PlaceholderSet::builtin().unwrap().get(EntityKind::Artist)
        );
        // Les pistes empruntent l'image de leur album
        assert!(set.get(EntityKind::Track).is_none());
    }
}
