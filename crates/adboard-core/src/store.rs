//! Durable SQLite store for cooldowns and the review queue.
//!
//! # Schema
//!
//! ```text
//! ad_cooldowns     (actor_id TEXT PRIMARY KEY, last_ad_time INTEGER NOT NULL)
//! ad_review_queue  (id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                   submitter_uuid TEXT NOT NULL,
//!                   message TEXT NOT NULL,
//!                   submission_time INTEGER NOT NULL)
//! ```
//!
//! Cooldown writes are write-behind: callers enqueue onto an unbounded
//! channel and a single worker task applies them in enqueue order, which
//! preserves per-actor ordering without any actor-level coordination.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::actor::ActorId;
use crate::error::Result;
use crate::review::ReviewEntry;

const POOL_MAX_CONNECTIONS: u32 = 10;

const CREATE_COOLDOWNS: &str = "CREATE TABLE IF NOT EXISTS ad_cooldowns (
    actor_id TEXT PRIMARY KEY,
    last_ad_time INTEGER NOT NULL
)";

const CREATE_REVIEW_QUEUE: &str = "CREATE TABLE IF NOT EXISTS ad_review_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    submitter_uuid TEXT NOT NULL,
    message TEXT NOT NULL,
    submission_time INTEGER NOT NULL
)";

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Pooled SQLite handle. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `path` and ensure the
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_COOLDOWNS).execute(&pool).await?;
        sqlx::query(CREATE_REVIEW_QUEUE).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool. Further queries will fail; callers release exactly once.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -----------------------------------------------------------------------
    // Cooldowns
    // -----------------------------------------------------------------------

    pub async fn load_cooldown(&self, actor: ActorId) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_ad_time FROM ad_cooldowns WHERE actor_id = ?")
                .bind(actor.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(t,)| t))
    }

    /// Upsert: a second save for the same actor overwrites, never duplicates.
    pub async fn save_cooldown(&self, actor: ActorId, millis: i64) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO ad_cooldowns (actor_id, last_ad_time) VALUES (?, ?)")
            .bind(actor.to_string())
            .bind(millis)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Review queue
    // -----------------------------------------------------------------------

    pub async fn insert_review(&self, submitter: ActorId, message: &str, millis: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO ad_review_queue (submitter_uuid, message, submission_time) \
             VALUES (?, ?, ?)",
        )
        .bind(submitter.to_string())
        .bind(message)
        .bind(millis)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_review(&self, limit: u32, offset: u32) -> Result<Vec<ReviewEntry>> {
        let rows: Vec<(i64, String, String, i64)> = sqlx::query_as(
            "SELECT id, submitter_uuid, message, submission_time \
             FROM ad_review_queue ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, submitter, message, submitted_at) in rows {
            match ActorId::from_str(&submitter) {
                Ok(submitter) => entries.push(ReviewEntry {
                    id,
                    submitter,
                    message,
                    submitted_at,
                }),
                // A malformed row should not hide the rest of the queue.
                Err(e) => warn!(row = id, error = %e, "skipping review row with bad actor id"),
            }
        }
        Ok(entries)
    }

    /// Delete a review entry. Returns false when no such id exists.
    pub async fn delete_review(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ad_review_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Write-behind worker
// ---------------------------------------------------------------------------

/// Handle to the write-behind worker: the enqueue side plus the worker task.
/// Dropping the sender closes the channel; the worker drains what is queued
/// and exits.
#[derive(Debug)]
pub struct WriteBehind {
    pub tx: mpsc::UnboundedSender<(ActorId, i64)>,
    pub worker: JoinHandle<()>,
}

/// Spawn the single consumer task applying cooldown saves in enqueue order.
/// Failures are logged and swallowed: the in-memory cache is already
/// authoritative, so a lost durable write never surfaces to the caller.
pub fn spawn_write_behind(db: Database, debug: bool) -> WriteBehind {
    let (tx, mut rx) = mpsc::unbounded_channel::<(ActorId, i64)>();
    let worker = tokio::spawn(async move {
        while let Some((actor, millis)) = rx.recv().await {
            match db.save_cooldown(actor, millis).await {
                Ok(()) => {
                    if debug {
                        debug!(actor = %actor, millis, "cooldown saved");
                    }
                }
                Err(e) => warn!(actor = %actor, error = %e, "cooldown write-behind failed"),
            }
        }
    });
    WriteBehind { tx, worker }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
