/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * Edits write records whole: a `save_*` call persists an edit and the cache
 * invalidation it caused in a single statement. Caches write only their own
 * columns, and only while the record still has the revision the cached value
 * was built from.
 */

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use super::connection::DatabaseConnection;
use super::models::{SongRecord, SongbookRecord, VariantRecord, Visibility};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

/// Decode a JSON document column
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode an optional RFC 3339 timestamp column
fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Fixed-width UTC timestamp, so stored expirations compare correctly as text
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const VARIANT_COLUMNS: &str = "id, song_id, owner, title, text, description, visibility, \
                               cached_fragment, revision, created_at, updated_at";

const SONGBOOK_COLUMNS: &str = "id, title, owner, options, entries, artifact_path, \
                                cache_expires_at, revision, created_at, updated_at";

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// The underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Song Operations
    // =========================================================================

    /// Insert a new song
    pub async fn create_song(&self, song: &SongRecord) -> Result<()> {
        let song = song.clone();
        let interpreters = serde_json::to_string(&song.interpreters)?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO songs (id, title, interpreters, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![song.id, song.title, interpreters, song.created_at],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a song by ID
    pub async fn find_song(&self, song_id: &str) -> Result<Option<SongRecord>> {
        let song_id = song_id.to_string();

        self.db
            .execute_async(move |conn| {
                let song = conn
                    .query_row(
                        "SELECT id, title, interpreters, created_at FROM songs WHERE id = ?1",
                        [&song_id],
                        |row| {
                            Ok(SongRecord {
                                id: row.get(0)?,
                                title: row.get(1)?,
                                interpreters: json_column(row, 2)?,
                                created_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(song)
            })
            .await
    }

    // =========================================================================
    // Variant Operations
    // =========================================================================

    /// Insert a new variant
    pub async fn create_variant(&self, variant: &VariantRecord) -> Result<()> {
        let variant = variant.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO variants ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        VARIANT_COLUMNS
                    ),
                    params![
                        variant.id,
                        variant.song_id,
                        variant.owner,
                        variant.title,
                        variant.text,
                        variant.description,
                        variant.visibility.to_string(),
                        variant.cached_fragment,
                        variant.revision,
                        variant.created_at,
                        variant.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a variant by ID
    pub async fn find_variant(&self, variant_id: &str) -> Result<Option<VariantRecord>> {
        let variant_id = variant_id.to_string();

        self.db
            .execute_async(move |conn| Self::find_variant_sync(conn, &variant_id))
            .await
    }

    fn find_variant_sync(conn: &Connection, variant_id: &str) -> Result<Option<VariantRecord>> {
        let variant = conn
            .query_row(
                &format!("SELECT {} FROM variants WHERE id = ?1", VARIANT_COLUMNS),
                [variant_id],
                Self::map_variant,
            )
            .optional()?;
        Ok(variant)
    }

    fn map_variant(row: &Row<'_>) -> rusqlite::Result<VariantRecord> {
        Ok(VariantRecord {
            id: row.get(0)?,
            song_id: row.get(1)?,
            owner: row.get(2)?,
            title: row.get(3)?,
            text: row.get(4)?,
            description: row.get(5)?,
            visibility: row
                .get::<_, String>(6)?
                .parse()
                .unwrap_or(Visibility::Private),
            cached_fragment: row.get(7)?,
            revision: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    /// Persist every field of a variant, including its fragment cache
    pub async fn save_variant(&self, variant: &VariantRecord) -> Result<()> {
        let variant = variant.clone();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE variants
                    SET title = ?2, text = ?3, description = ?4, visibility = ?5,
                        cached_fragment = ?6, revision = ?7, updated_at = ?8
                    WHERE id = ?1
                    "#,
                    params![
                        variant.id,
                        variant.title,
                        variant.text,
                        variant.description,
                        variant.visibility.to_string(),
                        variant.cached_fragment,
                        variant.revision,
                        variant.updated_at,
                    ],
                )?;

                if updated == 0 {
                    return Err(anyhow::anyhow!("Variant does not exist: {}", variant.id));
                }
                Ok(())
            })
            .await
    }

    /// Cache a fragment unless the variant was edited after `revision` was read
    ///
    /// Returns whether the fragment was stored.
    pub async fn store_fragment(&self, variant_id: &str, revision: i64, fragment: &str) -> Result<bool> {
        let variant_id = variant_id.to_string();
        let fragment = fragment.to_string();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE variants SET cached_fragment = ?3 WHERE id = ?1 AND revision = ?2",
                    params![variant_id, revision, fragment],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Delete a variant and drop it from every songbook placing it, in one transaction
    ///
    /// Returns `None` when the variant does not exist, otherwise the number
    /// of songbooks that lost an entry (their publish cache is cleared too).
    pub async fn delete_variant(&self, variant_id: &str) -> Result<Option<usize>> {
        let variant_id = variant_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let deleted = tx.execute("DELETE FROM variants WHERE id = ?1", [&variant_id])?;
                if deleted == 0 {
                    return Ok(None);
                }

                let mut touched = 0;
                for mut songbook in Self::list_songbooks_sync(tx)? {
                    if songbook.remove_entry(&variant_id) {
                        Self::update_songbook_sync(tx, &songbook)?;
                        touched += 1;
                    }
                }

                debug!("Deleted variant {}, removed from {} songbook(s)", variant_id, touched);
                Ok(Some(touched))
            })
            .await
    }

    // =========================================================================
    // Songbook Operations
    // =========================================================================

    /// Insert a new songbook
    pub async fn create_songbook(&self, songbook: &SongbookRecord) -> Result<()> {
        let songbook = songbook.clone();
        let options = serde_json::to_string(&songbook.options)?;
        let entries = serde_json::to_string(&songbook.entries)?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO songbooks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        SONGBOOK_COLUMNS
                    ),
                    params![
                        songbook.id,
                        songbook.title,
                        songbook.owner,
                        options,
                        entries,
                        songbook.artifact_path,
                        songbook.cache_expires_at.map(format_timestamp),
                        songbook.revision,
                        songbook.created_at,
                        songbook.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a songbook by ID
    pub async fn find_songbook(&self, songbook_id: &str) -> Result<Option<SongbookRecord>> {
        let songbook_id = songbook_id.to_string();

        self.db
            .execute_async(move |conn| {
                let songbook = conn
                    .query_row(
                        &format!("SELECT {} FROM songbooks WHERE id = ?1", SONGBOOK_COLUMNS),
                        [&songbook_id],
                        Self::map_songbook,
                    )
                    .optional()?;
                Ok(songbook)
            })
            .await
    }

    fn map_songbook(row: &Row<'_>) -> rusqlite::Result<SongbookRecord> {
        Ok(SongbookRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            owner: row.get(2)?,
            options: json_column(row, 3)?,
            entries: json_column(row, 4)?,
            artifact_path: row.get(5)?,
            cache_expires_at: timestamp_column(row, 6)?,
            revision: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// All songbooks, oldest first
    pub async fn list_songbooks(&self) -> Result<Vec<SongbookRecord>> {
        self.db
            .execute_async(|conn| Self::list_songbooks_sync(conn))
            .await
    }

    fn list_songbooks_sync(conn: &Connection) -> Result<Vec<SongbookRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM songbooks ORDER BY created_at, id",
            SONGBOOK_COLUMNS
        ))?;
        let songbooks = stmt
            .query_map([], Self::map_songbook)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songbooks)
    }

    /// Persist every field of a songbook, including its publish cache pointer
    pub async fn save_songbook(&self, songbook: &SongbookRecord) -> Result<()> {
        let songbook = songbook.clone();

        self.db
            .execute_async(move |conn| Self::update_songbook_sync(conn, &songbook))
            .await
    }

    fn update_songbook_sync(conn: &Connection, songbook: &SongbookRecord) -> Result<()> {
        let options = serde_json::to_string(&songbook.options)?;
        let entries = serde_json::to_string(&songbook.entries)?;

        let updated = conn.execute(
            r#"
            UPDATE songbooks
            SET title = ?2, options = ?3, entries = ?4, artifact_path = ?5,
                cache_expires_at = ?6, revision = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                songbook.id,
                songbook.title,
                options,
                entries,
                songbook.artifact_path,
                songbook.cache_expires_at.map(format_timestamp),
                songbook.revision,
                songbook.updated_at,
            ],
        )?;

        if updated == 0 {
            return Err(anyhow::anyhow!("Songbook does not exist: {}", songbook.id));
        }
        Ok(())
    }

    /// Point a songbook at a published document unless it was edited after `revision` was read
    ///
    /// Also used to slide the expiration of an existing pointer. Returns
    /// whether the pointer was stored.
    pub async fn store_publish_pointer(
        &self,
        songbook_id: &str,
        revision: i64,
        artifact_path: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let songbook_id = songbook_id.to_string();
        let artifact_path = artifact_path.to_string();
        let expires_at = format_timestamp(expires_at);

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE songbooks SET artifact_path = ?3, cache_expires_at = ?4
                    WHERE id = ?1 AND revision = ?2
                    "#,
                    params![songbook_id, revision, artifact_path, expires_at],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Clear every publish pointer expired at `now`; returns how many were cleared
    pub async fn clear_expired_pointers(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = format_timestamp(now);

        self.db
            .execute_async(move |conn| {
                let cleared = conn.execute(
                    r#"
                    UPDATE songbooks SET artifact_path = NULL, cache_expires_at = NULL
                    WHERE artifact_path IS NOT NULL
                      AND (cache_expires_at IS NULL OR cache_expires_at <= ?1)
                    "#,
                    [&now],
                )?;
                Ok(cleared)
            })
            .await
    }

    /// Delete a songbook; returns whether it existed
    pub async fn delete_songbook(&self, songbook_id: &str) -> Result<bool> {
        let songbook_id = songbook_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM songbooks WHERE id = ?1", [&songbook_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Artifact paths currently referenced by any songbook
    pub async fn referenced_artifacts(&self) -> Result<Vec<String>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn
                    .prepare("SELECT artifact_path FROM songbooks WHERE artifact_path IS NOT NULL")?;
                let paths = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(paths)
            })
            .await
    }
}
