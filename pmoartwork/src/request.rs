//! Requêtes et réponses du service d'images

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::kind::{ContentType, ImageKind};
use crate::validator::Validator;

/// Options client d'une requête : taille voulue et validateur conditionnel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Valeur `If-None-Match` brute
    pub validator: Option<String>,
}

impl ImageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_size(self, width: u32, height: u32) -> Self {
        self.with_width(width).with_height(height)
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// Le client a fixé au moins une dimension.
    pub fn has_size(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Requête d'image, immuable une fois construite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    kind: ImageKind,
    id: Uuid,
    options: ImageOptions,
}

impl ImageRequest {
    pub fn new(kind: ImageKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            options: ImageOptions::default(),
        }
    }

    pub fn with_options(kind: ImageKind, id: Uuid, options: ImageOptions) -> Self {
        Self { kind, id, options }
    }

    pub fn sized(self, width: u32, height: u32) -> Self {
        let options = self.options.clone().with_size(width, height);
        Self { options, ..self }
    }

    pub fn if_none_match(self, validator: impl Into<String>) -> Self {
        let options = self.options.clone().with_validator(validator);
        Self { options, ..self }
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }
}

/// Issue d'une requête.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Success,
    /// Entité inconnue, ou aucune image pour un emplacement secondaire
    NotFound,
    /// Le validateur client correspond à l'image canonique
    NotModified,
    SystemError,
}

/// Réponse du service.
///
/// Seul `Success` porte des octets. `NotModified` porte le validateur et la
/// date pour que le transport puisse répéter les en-têtes.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub status: ImageStatus,
    pub bytes: Option<Bytes>,
    pub content_type: Option<ContentType>,
    pub last_modified: Option<DateTime<Utc>>,
    pub validator: Option<Validator>,
}

impl ImageResponse {
    pub fn success(
        bytes: Bytes,
        content_type: ContentType,
        last_modified: DateTime<Utc>,
        validator: Validator,
    ) -> Self {
        Self {
            status: ImageStatus::Success,
            bytes: Some(bytes),
            content_type: Some(content_type),
            last_modified: Some(last_modified),
            validator: Some(validator),
        }
    }

    pub fn not_modified(validator: Validator, last_modified: DateTime<Utc>) -> Self {
        Self {
            status: ImageStatus::NotModified,
            bytes: None,
            content_type: None,
            last_modified: Some(last_modified),
            validator: Some(validator),
        }
    }

    pub fn not_found() -> Self {
        Self::empty(ImageStatus::NotFound)
    }

    pub fn system_error() -> Self {
        Self::empty(ImageStatus::SystemError)
    }

    fn empty(status: ImageStatus) -> Self {
        Self {
            status,
            bytes: None,
            content_type: None,
            last_modified: None,
            validator: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ImageStatus::Success
    }

    /// Valeur de l'en-tête `ETag`.
    pub fn etag_header(&self) -> Option<String> {
        self.validator.as_ref().map(Validator::header_value)
    }

    /// Valeur de l'en-tête `Last-Modified` (IMF-fixdate).
    pub fn last_modified_header(&self) -> Option<String> {
        self.last_modified
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }

    pub fn content_type_header(&self) -> Option<&'static str> {
        self.content_type.map(|c| c.mime())
    }
}
