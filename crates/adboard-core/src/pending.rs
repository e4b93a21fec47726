//! Pending-submission registry.
//!
//! Tracks at most one unconfirmed submission per actor. Admission is an
//! atomic check-and-insert on a sharded map, so concurrent submits by the
//! same actor cannot both win and submits by different actors never contend.
//! Each admission arms a single delayed expiry task; confirm, cancel, and
//! expiry race for one atomic removal and exactly one of them succeeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::actor::ActorId;
use crate::error::{AdboardError, Result};

// ---------------------------------------------------------------------------
// PendingSubmission
// ---------------------------------------------------------------------------

/// A draft ad awaiting explicit confirmation.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    /// Identity of this particular admission. An expiry timer captures it so
    /// a late timer can recognise that the slot has since been re-admitted.
    pub id: Uuid,
    pub actor: ActorId,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PendingRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: DashMap<ActorId, PendingSubmission>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-insert. Rejects with [`AdboardError::AlreadyPending`]
    /// if the actor already has an entry; never queues or overwrites.
    pub fn admit(&self, actor: ActorId, message: impl Into<String>) -> Result<PendingSubmission> {
        match self.entries.entry(actor) {
            Entry::Occupied(_) => Err(AdboardError::AlreadyPending),
            Entry::Vacant(slot) => {
                let submission = PendingSubmission {
                    id: Uuid::new_v4(),
                    actor,
                    message: message.into(),
                    submitted_at: Utc::now(),
                };
                slot.insert(submission.clone());
                Ok(submission)
            }
        }
    }

    /// Atomically remove and return the actor's entry.
    pub fn confirm(&self, actor: ActorId) -> Result<PendingSubmission> {
        self.entries
            .remove(&actor)
            .map(|(_, submission)| submission)
            .ok_or(AdboardError::NoPending)
    }

    /// Atomically remove the actor's entry, discarding the draft.
    pub fn cancel(&self, actor: ActorId) -> Result<()> {
        self.entries
            .remove(&actor)
            .map(|_| ())
            .ok_or(AdboardError::NoPending)
    }

    /// Remove the actor's entry only if it is still the given admission.
    /// This is the expiry path: a confirm/cancel that already won, or a newer
    /// admission occupying the slot, makes this a no-op.
    pub fn expire(&self, actor: ActorId, submission_id: Uuid) -> Option<PendingSubmission> {
        self.entries
            .remove_if(&actor, |_, submission| submission.id == submission_id)
            .map(|(_, submission)| submission)
    }

    pub fn is_pending(&self, actor: ActorId) -> bool {
        self.entries.contains_key(&actor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedule expiry of `submission_id` after `timeout`. The timer itself is
    /// never cancelled; at fire time the remove-if-same-admission check makes
    /// a stale timer harmless, and `on_expire` runs only when the timer won.
    pub fn arm_timeout<F>(
        self: Arc<Self>,
        actor: ActorId,
        submission_id: Uuid,
        timeout: Duration,
        on_expire: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(PendingSubmission) + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(submission) = self.expire(actor, submission_id) {
                on_expire(submission);
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
