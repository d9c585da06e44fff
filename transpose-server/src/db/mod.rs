//! Persistence layer: the transpose record store
//!
//! One table, append-only. `id` is the short public transpose ID (primary
//! key), `link_id` carries a secondary index used for the cache
//! short-circuit. Records are never updated; retention is an external
//! concern.

use rand::Rng;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use transpose_common::error::{Error, Result};
use transpose_common::model::{LinkId, TransposeContent, TransposeRecord};

/// Length of generated transpose IDs.
pub const SHORT_ID_LENGTH: usize = 10;

/// URL-safe 64-symbol alphabet for transpose IDs.
const SHORT_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Open (creating if missing) the database and ensure the schema exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests.
///
/// Each pooled `sqlite::memory:` connection opens its own private
/// database, so the pool is capped at a single connection; otherwise the
/// schema only exists on whichever connection ran `init_schema`.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(Error::Database)?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent schema creation.
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transposes (
            id TEXT PRIMARY KEY,
            link_id TEXT NOT NULL,
            terms TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transposes_link_id ON transposes(link_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Generate a short, URL-safe transpose ID.
///
/// 64^10 possible values make accidental collisions a birthday-bound
/// rarity; uniqueness is still enforced by the primary key on insert.
pub fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_ID_LENGTH)
        .map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char)
        .collect()
}

/// Handle over the transpose record store.
#[derive(Clone)]
pub struct TransposeStore {
    pool: SqlitePool,
}

impl TransposeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Point lookup through the `link_id` secondary index. Duplicate rows
    /// for the same link are tolerated; the first inserted wins.
    pub async fn find_by_link_id(&self, link_id: &LinkId) -> Result<Option<TransposeRecord>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, link_id, terms, content FROM transposes
             WHERE link_id = ? ORDER BY rowid ASC LIMIT 1",
        )
        .bind(link_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    /// Point lookup by primary key.
    pub async fn get_by_transpose_id(&self, transpose_id: &str) -> Result<Option<TransposeRecord>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, link_id, terms, content FROM transposes WHERE id = ?",
        )
        .bind(transpose_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    /// Single atomic insert; there is no update path. A primary-key
    /// collision surfaces as `Error::Collision` so the caller can mint a
    /// fresh ID and retry.
    pub async fn insert(&self, record: &TransposeRecord) -> Result<()> {
        let content = serde_json::to_string(&record.content)
            .map_err(|e| Error::Internal(format!("Failed to serialize content: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO transposes (id, link_id, terms, content) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.transpose_id)
        .bind(record.link_id.as_str())
        .bind(&record.search_terms)
        .bind(&content)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Err(Error::Collision(record.transpose_id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn record_from_row(
    (transpose_id, link_id, terms, content): (String, String, String, String),
) -> Result<TransposeRecord> {
    let content: TransposeContent = serde_json::from_str(&content)
        .map_err(|e| Error::Internal(format!("Corrupt content for {}: {}", transpose_id, e)))?;

    Ok(TransposeRecord {
        transpose_id,
        link_id: LinkId::from(link_id),
        search_terms: terms,
        content,
    })
}
