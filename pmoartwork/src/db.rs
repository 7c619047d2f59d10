//! Store de métadonnées SQLite
//!
//! Une table unique `entity_images` décrit, pour chaque entité, où trouver
//! ses images : dossier ou fichier, vignette embarquée, nom de base du média
//! et album parent pour les pistes.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::ArtworkError;
use crate::kind::EntityKind;
use crate::locator::{EntityRef, MetadataStore};

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Ouvre (ou crée) la base de données
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin vers le fichier SQLite
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmoartwork::SqliteStore;
    /// use std::path::Path;
    ///
    /// let store = SqliteStore::open(Path::new("artwork.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, ArtworkError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Base en mémoire, pour les tests et les outils.
    pub fn open_in_memory() -> Result<Self, ArtworkError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ArtworkError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entity_images (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                location TEXT,
                thumbnail BLOB,
                media_stem TEXT,
                parent_id TEXT,
                last_modified TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entity_images_parent ON entity_images (parent_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ArtworkError> {
        self.conn
            .lock()
            .map_err(|_| ArtworkError::store("database connection lock poisoned"))
    }

    /// Ajoute ou met à jour la description d'une entité.
    pub fn upsert(&self, entity: &EntityRef) -> Result<(), ArtworkError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entity_images (kind, id, location, thumbnail, media_stem, parent_id, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(kind, id) DO UPDATE SET
                 location = excluded.location,
                 thumbnail = excluded.thumbnail,
                 media_stem = excluded.media_stem,
                 parent_id = excluded.parent_id,
                 last_modified = excluded.last_modified",
            params![
                entity.kind.as_str(),
                entity.id.to_string(),
                entity
                    .location
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                entity.thumbnail.as_ref().map(|b| b.to_vec()),
                entity.media_stem,
                entity.parent_release_id.map(|id| id.to_string()),
                entity.last_modified.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Supprime une entité. Retourne `true` si une ligne a été effacée.
    pub fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, ArtworkError> {
        let conn = self.conn()?;
        let n = conn.execute(
            "DELETE FROM entity_images WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id.to_string()],
        )?;
        Ok(n > 0)
    }

    pub fn count(&self) -> Result<usize, ArtworkError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entity_images", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRef>, ArtworkError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT location, thumbnail, media_stem, parent_id, last_modified
                 FROM entity_images WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id.to_string()],
                RawRow::from_row,
            )
            .optional()?;

        raw.map(|raw| raw.into_entity(kind, id)).transpose()
    }

    fn parent_of(&self, track_id: Uuid) -> Result<Option<Uuid>, ArtworkError> {
        let conn = self.conn()?;
        let parent: Option<Option<String>> = conn
            .query_row(
                "SELECT parent_id FROM entity_images WHERE kind = ?1 AND id = ?2",
                params![EntityKind::Track.as_str(), track_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        parent.flatten().map(|s| parse_uuid("parent_id", &s)).transpose()
    }
}

struct RawRow {
    location: Option<String>,
    thumbnail: Option<Vec<u8>>,
    media_stem: Option<String>,
    parent_id: Option<String>,
    last_modified: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            location: row.get(0)?,
            thumbnail: row.get(1)?,
            media_stem: row.get(2)?,
            parent_id: row.get(3)?,
            last_modified: row.get(4)?,
        })
    }

    fn into_entity(self, kind: EntityKind, id: Uuid) -> Result<EntityRef, ArtworkError> {
        let last_modified = DateTime::parse_from_rfc3339(&self.last_modified)
            .map_err(|_| ArtworkError::invalid_record("last_modified", &self.last_modified))?
            .with_timezone(&Utc);

        Ok(EntityRef {
            kind,
            id,
            location: self.location.map(PathBuf::from),
            thumbnail: self.thumbnail.filter(|t| !t.is_empty()).map(Bytes::from),
            media_stem: self.media_stem,
            parent_release_id: self
                .parent_id
                .map(|s| parse_uuid("parent_id", &s))
                .transpose()?,
            last_modified,
        })
    }
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ArtworkError> {
    Uuid::parse_str(value).map_err(|_| ArtworkError::invalid_record(field, value))
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn find_entity_image_metadata(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<EntityRef>, ArtworkError> {
        self.get(kind, id)
    }

    async fn find_parent_release_id(&self, track_id: Uuid) -> Result<Option<Uuid>, ArtworkError> {
        self.parent_of(track_id)
    }
}
