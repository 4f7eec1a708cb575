/*!
 * Song store connection.
 *
 * One SQLite connection behind a mutex, shared by every clone. Async callers
 * go through `execute_async` / `transaction_async`, which move the blocking
 * SQLite work onto tokio's blocking pool.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;

/// File name of the store inside the data directory
const STORE_FILENAME: &str = "zpevnik.db";

/// Application directory under the user's data directory
const STORE_DIRNAME: &str = "zpevnik";

/// Marker path of an in-memory store
const IN_MEMORY_PATH: &str = ":memory:";

/// Shared handle to the song store
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open the store in the user's data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_database_path()?)
    }

    /// Open (or create) the store at `db_path`, creating missing parent directories
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {:?}", parent))?;
        }

        info!("Opening song store at: {:?}", db_path);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open song store: {:?}", db_path))?;

        Self::from_connection(conn, db_path)
    }

    /// Throwaway store living in memory
    pub fn new_in_memory() -> Result<Self> {
        debug!("Opening in-memory song store");
        let conn = Connection::open_in_memory().context("Failed to open in-memory song store")?;

        Self::from_connection(conn, PathBuf::from(IN_MEMORY_PATH))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<data dir>/zpevnik/zpevnik.db`, falling back to `~/.local/share`
    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory"))?;

        Ok(base_dir.join(STORE_DIRNAME).join(STORE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        connection
            .lock()
            .map_err(|e| anyhow::anyhow!("Song store lock poisoned: {}", e))
    }

    /// Run `f` on the calling thread
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Self::lock(&self.connection)?;
        f(&conn)
    }

    /// Run `f` on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;
            f(&conn)
        })
        .await
        .context("Song store task panicked")?
    }

    /// Run `f` inside one transaction on the blocking pool
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls
    /// back every statement `f` issued.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::lock(&connection)?;
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .context("Song store transaction task panicked")?
    }

    /// Row counts of the store
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let count = |query: &str| -> i64 {
                conn.query_row(query, [], |row| row.get(0)).unwrap_or(0)
            };

            Ok(DatabaseStats {
                song_count: count("SELECT COUNT(*) FROM songs"),
                variant_count: count("SELECT COUNT(*) FROM variants"),
                songbook_count: count("SELECT COUNT(*) FROM songbooks"),
                cached_fragments: count(
                    "SELECT COUNT(*) FROM variants WHERE cached_fragment IS NOT NULL",
                ),
                published_songbooks: count(
                    "SELECT COUNT(*) FROM songbooks WHERE artifact_path IS NOT NULL",
                ),
            })
        })
    }
}

/// Row counts of the song store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub song_count: i64,
    pub variant_count: i64,
    pub songbook_count: i64,
    /// Variants holding a translated fragment
    pub cached_fragments: i64,
    /// Songbooks pointing at a published document
    pub published_songbooks: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Songs: {}, Variants: {} ({} cached), Songbooks: {} ({} published)",
            self.song_count,
            self.variant_count,
            self.cached_fragments,
            self.songbook_count,
            self.published_songbooks
        )
    }
}
