//! Review queue: when moderation requires review, submissions bypass the
//! confirmation flow and land here for staff to act on.

use serde::Serialize;
use tracing::{debug, error};

use crate::actor::ActorId;
use crate::error::{AdboardError, Result};
use crate::store::Database;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One queued ad awaiting staff review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewEntry {
    pub id: i64,
    pub submitter: ActorId,
    pub message: String,
    /// Epoch milliseconds at submission.
    pub submitted_at: i64,
}

#[derive(Debug, Clone)]
pub struct ReviewQueue {
    db: Database,
    debug: bool,
}

impl ReviewQueue {
    pub fn new(db: Database, debug: bool) -> Self {
        Self { db, debug }
    }

    /// Insert off the caller's path, like cooldown writes: the submitter's
    /// response never waits on the review table.
    pub fn enqueue(&self, submitter: ActorId, message: String, now_ms: i64) {
        let db = self.db.clone();
        let debug = self.debug;
        tokio::spawn(async move {
            match db.insert_review(submitter, &message, now_ms).await {
                Ok(()) => {
                    if debug {
                        debug!(submitter = %submitter, "ad queued for review");
                    }
                }
                Err(e) => error!(submitter = %submitter, error = %e, "failed to queue ad for review"),
            }
        });
    }

    /// One page of the queue, oldest first. Pages are 1-based.
    pub async fn list(&self, page: u32) -> Result<Vec<ReviewEntry>> {
        let page = page.max(1);
        self.db
            .list_review(DEFAULT_PAGE_SIZE, (page - 1) * DEFAULT_PAGE_SIZE)
            .await
    }

    /// Remove a reviewed entry (approved or dismissed, either way it leaves
    /// the queue).
    pub async fn resolve(&self, id: i64) -> Result<()> {
        if self.db.delete_review(id).await? {
            Ok(())
        } else {
            Err(AdboardError::ReviewEntryNotFound(id))
        }
    }
}
