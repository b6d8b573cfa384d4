//! SQLite-backed collections with FTS5 ranking
//!
//! All passages live in one FTS5 table keyed by collection name. The
//! store's own top-k search is bm25 over the passage text.

use crate::retrieval::{PageNumber, Passage};
use crate::store::{tokenize, StoreError, VectorStore, VectorStoreClient};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database migrations, applied in order
const MIGRATIONS: &[&str] = &[
    // Migration 1: collections and passages
    r#"
    CREATE TABLE collections (
        name TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE VIRTUAL TABLE passages USING fts5(
        text,
        collection UNINDEXED,
        position UNINDEXED,
        page_number UNINDEXED,
        tokenize = 'unicode61 remove_diacritics 2'
    );
    "#,
];

/// Collection store on a local SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        Self::with_pool(pool)
    }

    /// Single-connection in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Self::with_pool(pool)
    }

    fn with_pool(pool: DbPool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        get_conn(&self.pool)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (index, migration) in MIGRATIONS.iter().enumerate() {
            let version = index as i64 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.get_conn()?;
        collection_exists(&conn, name)
    }

    /// Register an empty collection
    pub fn create_collection(&self, name: &str) -> Result<SqliteCollection, StoreError> {
        let conn = self.get_conn()?;

        if collection_exists(&conn, name)? {
            return Err(StoreError::CollectionExists {
                name: name.to_string(),
            });
        }

        conn.execute(
            "INSERT INTO collections (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().to_rfc3339()],
        )?;

        tracing::info!("Created collection {}", name);

        Ok(SqliteCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }

    /// Remove a collection and all of its passages
    pub fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        if removed == 0 {
            return Err(StoreError::CollectionNotFound {
                name: name.to_string(),
            });
        }
        tx.execute("DELETE FROM passages WHERE collection = ?1", params![name])?;
        tx.commit()?;

        tracing::info!("Deleted collection {}", name);
        Ok(())
    }

    /// Open a collection with its concrete type, for ingestion
    pub fn open_collection(&self, name: &str) -> Result<SqliteCollection, StoreError> {
        if !self.collection_exists(name)? {
            return Err(StoreError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        Ok(SqliteCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }
}

impl VectorStore for SqliteStore {
    fn collection(&self, name: &str) -> Result<Box<dyn VectorStoreClient>, StoreError> {
        Ok(Box::new(self.open_collection(name)?))
    }

    fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

/// Handle to one collection in a `SqliteStore`
#[derive(Clone)]
pub struct SqliteCollection {
    pool: DbPool,
    name: String,
}

impl SqliteCollection {
    /// Append passages after any already stored, in the given order
    pub fn add_passages(&self, passages: &[Passage]) -> Result<usize, StoreError> {
        let mut conn = get_conn(&self.pool)?;
        let tx = conn.transaction()?;

        let next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM passages WHERE collection = ?1",
            params![self.name],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO passages (text, collection, position, page_number)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for (offset, passage) in passages.iter().enumerate() {
                let page = match &passage.page_number {
                    PageNumber::Unknown => None,
                    other => Some(other.to_string()),
                };
                stmt.execute(params![
                    passage.text,
                    self.name,
                    next_position + offset as i64,
                    page
                ])?;
            }
        }

        tx.commit()?;

        tracing::debug!("Added {} passages to {}", passages.len(), self.name);
        Ok(passages.len())
    }

    fn ensure_exists(&self, conn: &rusqlite::Connection) -> Result<(), StoreError> {
        if collection_exists(conn, &self.name)? {
            Ok(())
        } else {
            Err(StoreError::CollectionNotFound {
                name: self.name.clone(),
            })
        }
    }
}

impl VectorStoreClient for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_top_k(&self, query_text: &str, k: usize) -> Result<Vec<Passage>, StoreError> {
        let conn = get_conn(&self.pool)?;
        self.ensure_exists(&conn)?;

        let Some(expression) = match_expression(query_text) else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT text, page_number FROM passages
             WHERE passages MATCH ?1 AND collection = ?2
             ORDER BY bm25(passages), position
             LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(params![expression, self.name, k as i64], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(collect_passages(rows))
    }

    fn fetch_all(&self) -> Result<Vec<Passage>, StoreError> {
        let conn = get_conn(&self.pool)?;
        self.ensure_exists(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT text, page_number FROM passages
             WHERE collection = ?1
             ORDER BY position",
        )?;

        let rows = stmt
            .query_map(params![self.name], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(collect_passages(rows))
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = get_conn(&self.pool)?;
        self.ensure_exists(&conn)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM passages WHERE collection = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn get_conn(pool: &DbPool) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
    pool.get()
        .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))
}

fn collection_exists(conn: &rusqlite::Connection, name: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Quote every query word and OR them, so user text never reaches the
/// FTS5 query syntax
fn match_expression(query_text: &str) -> Option<String> {
    let terms: Vec<String> = tokenize(query_text)
        .into_iter()
        .map(|token| format!("\"{}\"", token))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(Value, Value)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn collect_passages(rows: Vec<(Value, Value)>) -> Vec<Passage> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, (text, page))| {
            let Value::Text(text) = text else {
                tracing::warn!("Skipping passage row {} without text", index);
                return None;
            };
            Some(Passage {
                text,
                page_number: page_from_value(page),
            })
        })
        .collect()
}

fn page_from_value(value: Value) -> PageNumber {
    match value {
        Value::Integer(n) => PageNumber::Number(n),
        Value::Text(s) => PageNumber::parse(&s),
        Value::Real(f) if f.fract() == 0.0 => PageNumber::Number(f as i64),
        Value::Real(f) => PageNumber::Label(f.to_string()),
        Value::Null | Value::Blob(_) => PageNumber::Unknown,
    }
}
