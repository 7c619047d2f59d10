use std::time::Duration;
use thiserror::Error;

/// Échecs internes du moteur d'images.
///
/// Aucune de ces erreurs n'atteint l'appelant du service : elles sont
/// journalisées puis converties en [`ImageStatus::SystemError`].
/// L'absence d'entité ou d'image n'est pas une erreur mais un statut.
///
/// [`ImageStatus::SystemError`]: crate::ImageStatus::SystemError
#[derive(Error, Debug)]
pub enum ArtworkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Invalid stored value for {field}: {value}")]
    InvalidRecord { field: &'static str, value: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Image resolution timed out after {0:?}")]
    Timeout(Duration),
    #[error("Logging error: {0}")]
    Logging(String),
}

impl ArtworkError {
    pub fn store(message: &str) -> Self {
        ArtworkError::Store(message.to_string())
    }

    pub fn invalid_record(field: &'static str, value: &str) -> Self {
        ArtworkError::InvalidRecord {
            field,
            value: value.to_string(),
        }
    }
}
