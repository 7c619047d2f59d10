use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::ArtworkError;

/// Paramètres du redimensionnement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSettings {
    /// Boîte appliquée quand le client ne donne aucune dimension
    pub default_width: u32,
    pub default_height: u32,
    pub jpeg_quality: u8,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            default_width: 2048,
            default_height: 2048,
            jpeg_quality: 85,
        }
    }
}

/// Résultat d'un redimensionnement.
#[derive(Debug, Clone)]
pub struct Resized {
    pub was_resized: bool,
    pub bytes: Bytes,
}

impl Resized {
    fn unchanged(bytes: &Bytes) -> Self {
        Self {
            was_resized: false,
            bytes: bytes.clone(),
        }
    }
}

/// Réduit une image pour qu'elle tienne dans la boîte cible.
///
/// Sans `force`, la boîte est celle par défaut des réglages. Le ratio est
/// conservé et l'image n'est jamais agrandie. La sortie reste en PNG si la
/// source est un PNG, sinon elle est encodée en JPEG.
///
/// Ne retourne jamais d'erreur : si les octets ne sont pas décodables ou si
/// l'encodage échoue, l'original est renvoyé avec `was_resized == false`.
///
/// # Arguments
///
/// * `bytes` - Image d'origine
/// * `width`, `height` - Boîte demandée (ignorée sans `force`)
/// * `force` - Le client a explicitement demandé une taille
/// * `settings` - Boîte par défaut et qualité JPEG
pub fn resize(
    bytes: &Bytes,
    width: u32,
    height: u32,
    force: bool,
    settings: &ResizeSettings,
) -> Resized {
    if bytes.is_empty() {
        return Resized::unchanged(bytes);
    }

    let (target_w, target_h) = if force {
        (width, height)
    } else {
        (settings.default_width, settings.default_height)
    };
    if target_w == 0 || target_h == 0 {
        return Resized::unchanged(bytes);
    }

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("Unable to decode image for resizing: {}", e);
            return Resized::unchanged(bytes);
        }
    };

    if img.width() <= target_w && img.height() <= target_h {
        return Resized::unchanged(bytes);
    }

    let resized = img.resize(target_w, target_h, FilterType::Lanczos3);
    let as_png = matches!(image::guess_format(bytes), Ok(ImageFormat::Png));

    let encoded = if as_png {
        encode_png(&resized)
    } else {
        encode_jpeg(&resized, settings.jpeg_quality)
    };

    match encoded {
        Ok(data) => {
            tracing::debug!(
                "Resized image {}x{} -> {}x{}",
                img.width(),
                img.height(),
                resized.width(),
                resized.height()
            );
            Resized {
                was_resized: true,
                bytes: Bytes::from(data),
            }
        }
        Err(e) => {
            tracing::warn!("Unable to encode resized image: {}", e);
            Resized::unchanged(bytes)
        }
    }
}

/// Variante asynchrone : le décodage et l'encodage tournent hors du runtime.
pub async fn resize_blocking(
    bytes: Bytes,
    width: u32,
    height: u32,
    force: bool,
    settings: ResizeSettings,
) -> Resized {
    let original = bytes.clone();
    match tokio::task::spawn_blocking(move || resize(&bytes, width, height, force, &settings))
        .await
    {
        Ok(resized) => resized,
        Err(e) => {
            tracing::warn!("Resize task failed: {}", e);
            Resized::unchanged(&original)
        }
    }
}

pub(crate) fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ArtworkError> {
    // JPEG ne porte pas de canal alpha
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&rgb)?;
    Ok(out)
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ArtworkError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
