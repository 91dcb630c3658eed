//! DuckDB item store
//!
//! One `items` table keyed by id. Writes are `INSERT ... ON CONFLICT DO
//! NOTHING`, so re-persisting an item is a no-op and the first stored
//! version wins.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::DateTime;
use duckdb::{Connection, params};
use hnpipe_core::{Item, ItemId, ItemKind, Sink, SinkError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id          BIGINT PRIMARY KEY,
    kind        VARCHAR NOT NULL,
    content     VARCHAR NOT NULL,
    url         VARCHAR NOT NULL,
    score       BIGINT NOT NULL,
    title       VARCHAR NOT NULL,
    created_at  BIGINT NOT NULL,
    created_by  VARCHAR NOT NULL
);";

const INSERT: &str = "
INSERT INTO items (id, kind, content, url, score, title, created_at, created_by)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO NOTHING";

const SELECT_COLS: &str = "id, kind, content, url, score, title, created_at, created_by";

fn db_err(e: duckdb::Error) -> SinkError {
    SinkError::Database(e.to_string())
}

/// Persistent [`Sink`] over a single DuckDB connection.
///
/// DuckDB allows one writing process per file; run one `run` or `consume`
/// process per database.
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SinkError::Database(format!("creating {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        log::debug!("opened item store {}", path.display());
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, item: &Item) -> Result<usize, SinkError> {
        let id = i64::try_from(item.id.0)
            .map_err(|_| SinkError::Database(format!("item id {} out of range", item.id)))?;
        self.lock()
            .execute(
                INSERT,
                params![
                    id,
                    item.kind.as_str(),
                    item.text,
                    item.url,
                    item.score,
                    item.title,
                    item.created_at.timestamp(),
                    item.created_by,
                ],
            )
            .map_err(db_err)
    }

    /// Stored items, newest first, optionally restricted to one kind.
    pub fn items(&self, kind: Option<ItemKind>, limit: usize) -> Result<Vec<Item>, SinkError> {
        let conn = self.lock();
        let rows = match kind {
            Some(kind) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {SELECT_COLS} FROM items WHERE kind = ? \
                         ORDER BY created_at DESC, id DESC LIMIT {limit}"
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![kind.as_str()], row_to_item)
                    .map_err(db_err)?
                    .collect::<Result<Vec<_>, _>>();
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {SELECT_COLS} FROM items \
                         ORDER BY created_at DESC, id DESC LIMIT {limit}"
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map([], row_to_item)
                    .map_err(db_err)?
                    .collect::<Result<Vec<_>, _>>();
                rows
            }
        };
        rows.map_err(db_err)
    }

    pub fn count(&self) -> Result<u64, SinkError> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(db_err)
    }
}

fn row_to_item(row: &duckdb::Row<'_>) -> duckdb::Result<Item> {
    let kind: String = row.get(1)?;
    Ok(Item {
        id: ItemId(row.get::<_, i64>(0)? as u64),
        kind: ItemKind::from_name(&kind).unwrap_or_default(),
        text: row.get(2)?,
        url: row.get(3)?,
        score: row.get(4)?,
        title: row.get(5)?,
        created_at: DateTime::from_timestamp(row.get(6)?, 0).unwrap_or_default(),
        created_by: row.get(7)?,
        dead: false,
        deleted: false,
    })
}

impl Sink for DuckDbStore {
    async fn write(&self, item: &Item) -> Result<(), SinkError> {
        let store = self.clone();
        let item = item.clone();
        let inserted = tokio::task::spawn_blocking(move || store.insert(&item))
            .await
            .map_err(|e| SinkError::Database(format!("write task: {e}")))??;
        if inserted == 0 {
            log::trace!("item already stored");
        }
        Ok(())
    }
}
