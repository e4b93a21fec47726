//! The ad service: orchestrates validation, the pending-confirmation state
//! machine, cooldown bookkeeping, and the broadcast effect.
//!
//! Per-actor flow: `Idle -> PendingConfirmation -> {Confirmed, Cancelled,
//! TimedOut} -> Idle`. The service decides *that* and *when* a notification
//! is due; rendering and delivery belong to the [`Notifier`] and
//! [`Broadcaster`] implementations at the edge.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::actor::{caps, ActorId, CapabilitySet, Clock};
use crate::config::{Config, ConfigWarning};
use crate::cooldown::{CooldownStore, RankTable};
use crate::error::Result;
use crate::moderation::{self, Rejection};
use crate::pending::PendingRegistry;
use crate::review::ReviewQueue;
use crate::store::{self, Database};
use crate::timefmt;

// ---------------------------------------------------------------------------
// Edge seams
// ---------------------------------------------------------------------------

/// User-facing notification payloads. The service never formats rich text;
/// these carry just enough for the edge to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    OnCooldown { remaining_secs: u64, formatted: String },
    CooldownBypassed,
    Broadcasted,
    Cancelled,
    Expired,
    QueuedForReview,
    ReviewAlert { submitter: ActorId },
}

/// Delivery of user-facing notices.
pub trait Notifier: Send + Sync + 'static {
    /// Deliver a notice to one actor. `false` means the actor is unreachable
    /// (nobody listening), which stops repeating notifications.
    fn tell(&self, actor: ActorId, notice: Notice) -> bool;

    /// Fan a notice out to every holder of `capability` (staff alerts).
    fn alert(&self, capability: &str, notice: Notice);
}

/// The broadcast effect itself: fan a confirmed ad out to subscribers,
/// optionally restricted to holders of `audience`.
pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(&self, source: ActorId, message: &str, audience: Option<&str>);
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Admitted; awaiting explicit confirm/cancel within `timeout_secs`.
    PendingConfirmation { preview: String, timeout_secs: u64 },
    AlreadyPending,
    OnCooldown { remaining_secs: u64 },
    QueuedForReview,
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Broadcast { message: String },
    NoPending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled,
    NoPending,
}

// ---------------------------------------------------------------------------
// AdService
// ---------------------------------------------------------------------------

pub struct AdService {
    config: RwLock<Config>,
    registry: Arc<PendingRegistry>,
    cooldowns: Arc<CooldownStore>,
    reviews: ReviewQueue,
    notifier: Arc<dyn Notifier>,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl AdService {
    /// Open the durable store named by `config`, start the write-behind
    /// worker, and assemble the service.
    pub async fn start(
        config: Config,
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let db = Database::open(&config.database_path).await?;
        let write_behind = store::spawn_write_behind(db.clone(), config.settings.debug);
        let cooldowns = Arc::new(CooldownStore::new(
            db.clone(),
            write_behind,
            RankTable::from_config(&config),
            Arc::clone(&clock),
        ));
        let reviews = ReviewQueue::new(db, config.settings.debug);

        Ok(Self {
            config: RwLock::new(config),
            registry: Arc::new(PendingRegistry::new()),
            cooldowns,
            reviews,
            notifier,
            broadcaster,
            clock,
        })
    }

    pub fn reviews(&self) -> &ReviewQueue {
        &self.reviews
    }

    /// Snapshot of the current config.
    pub fn config(&self) -> Config {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // -----------------------------------------------------------------------
    // Submission state machine
    // -----------------------------------------------------------------------

    pub async fn submit(
        &self,
        actor: ActorId,
        capabilities: &CapabilitySet,
        message: String,
    ) -> SubmitOutcome {
        let (timeout_secs, screening, countdown_ticks, debug_mode) = {
            let cfg = self.config.read().unwrap_or_else(|e| e.into_inner());
            (
                cfg.confirmation_timeout_secs,
                cfg.moderation.clone(),
                cfg.settings.countdown_notice_ticks,
                cfg.settings.debug,
            )
        };

        // A second submit while pending loses regardless of cooldown state.
        if self.registry.is_pending(actor) {
            return SubmitOutcome::AlreadyPending;
        }

        let remaining = self.cooldowns.remaining_cooldown(actor, capabilities).await;
        if remaining > 0 {
            self.spawn_cooldown_countdown(actor, capabilities.clone(), countdown_ticks);
            return SubmitOutcome::OnCooldown {
                remaining_secs: remaining,
            };
        } else if capabilities.has(caps::BYPASS) {
            self.notifier.tell(actor, Notice::CooldownBypassed);
        }

        if let Some(rejection) = moderation::screen(&screening, &message) {
            return SubmitOutcome::Invalid {
                reason: rejection.to_string(),
            };
        }

        if screening.require_review {
            self.reviews.enqueue(actor, message, self.clock.now_ms());
            self.notifier.tell(actor, Notice::QueuedForReview);
            self.notifier
                .alert(caps::REVIEW, Notice::ReviewAlert { submitter: actor });
            return SubmitOutcome::QueuedForReview;
        }

        match self.registry.admit(actor, message) {
            // Lost a race with a concurrent submit by the same actor.
            Err(_) => SubmitOutcome::AlreadyPending,
            Ok(submission) => {
                let notifier = Arc::clone(&self.notifier);
                Arc::clone(&self.registry).arm_timeout(
                    actor,
                    submission.id,
                    Duration::from_secs(timeout_secs),
                    move |expired| {
                        notifier.tell(expired.actor, Notice::Expired);
                    },
                );
                if debug_mode {
                    debug!(actor = %actor, "ad submission pending confirmation");
                }
                SubmitOutcome::PendingConfirmation {
                    preview: submission.message,
                    timeout_secs,
                }
            }
        }
    }

    /// Confirm the pending ad: broadcast it, then record the cooldown.
    /// Exactly one of confirm/cancel/expiry wins per admitted submission.
    pub fn confirm(&self, actor: ActorId) -> ConfirmOutcome {
        match self.registry.confirm(actor) {
            Err(_) => ConfirmOutcome::NoPending,
            Ok(submission) => {
                self.broadcaster.broadcast(actor, &submission.message, None);
                self.cooldowns.record_action(actor, self.clock.now_ms());
                self.notifier.tell(actor, Notice::Broadcasted);
                ConfirmOutcome::Broadcast {
                    message: submission.message,
                }
            }
        }
    }

    pub fn cancel(&self, actor: ActorId) -> CancelOutcome {
        match self.registry.cancel(actor) {
            Err(_) => CancelOutcome::NoPending,
            Ok(()) => {
                self.notifier.tell(actor, Notice::Cancelled);
                CancelOutcome::Cancelled
            }
        }
    }

    pub async fn remaining_cooldown(&self, actor: ActorId, capabilities: &CapabilitySet) -> u64 {
        self.cooldowns.remaining_cooldown(actor, capabilities).await
    }

    /// Admin path: validated, immediate, no pending flow and no cooldown.
    /// The edge gates this on `adboard.admin`.
    pub fn broadcast_now(
        &self,
        source: ActorId,
        message: &str,
        audience: Option<&str>,
    ) -> std::result::Result<(), Rejection> {
        let screening = {
            self.config
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .moderation
                .clone()
        };
        if let Some(rejection) = moderation::screen(&screening, message) {
            return Err(rejection);
        }
        self.broadcaster.broadcast(source, message, audience);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reload config from disk, swapping the rank table wholesale. A changed
    /// `database_path` takes effect on restart, not reload.
    pub fn reload(&self, path: &Path) -> Result<Vec<ConfigWarning>> {
        let fresh = Config::load(path)?;
        let warnings = fresh.validate();
        self.cooldowns.replace_table(RankTable::from_config(&fresh));
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        Ok(warnings)
    }

    /// Drain outstanding durable writes, flush the cooldown cache, release
    /// the pool. Call once at process shutdown.
    pub async fn shutdown(&self) {
        self.cooldowns.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Bounded live countdown after an on-cooldown rejection: one notice per
    /// second for at most `max_ticks`, stopping early when the cooldown
    /// clears or the actor stops listening.
    fn spawn_cooldown_countdown(
        &self,
        actor: ActorId,
        capabilities: CapabilitySet,
        max_ticks: u32,
    ) {
        let cooldowns = Arc::clone(&self.cooldowns);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            for tick in 0..max_ticks {
                let remaining = cooldowns.remaining_cooldown(actor, &capabilities).await;
                if remaining == 0 {
                    break;
                }
                let delivered = notifier.tell(
                    actor,
                    Notice::OnCooldown {
                        remaining_secs: remaining,
                        formatted: timefmt::format_seconds(remaining),
                    },
                );
                if !delivered {
                    break;
                }
                if tick + 1 < max_ticks {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ManualClock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<(ActorId, Notice)>>,
        alerts: Mutex<Vec<(String, Notice)>>,
        unreachable: AtomicBool,
    }

    impl RecordingNotifier {
        fn notices_for(&self, actor: ActorId) -> Vec<Notice> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| *a == actor)
                .map(|(_, n)| n.clone())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn tell(&self, actor: ActorId, notice: Notice) -> bool {
            self.notices.lock().unwrap().push((actor, notice));
            !self.unreachable.load(Ordering::SeqCst)
        }

        fn alert(&self, capability: &str, notice: Notice) {
            self.alerts
                .lock()
                .unwrap()
                .push((capability.to_string(), notice));
        }
    }

    #[derive(Default)]
    struct RecordingBroadcaster {
        sent: Mutex<Vec<(ActorId, String, Option<String>)>>,
    }

    impl Broadcaster for RecordingBroadcaster {
        fn broadcast(&self, source: ActorId, message: &str, audience: Option<&str>) {
            self.sent.lock().unwrap().push((
                source,
                message.to_string(),
                audience.map(str::to_string),
            ));
        }
    }

    struct Harness {
        _dir: TempDir,
        service: AdService,
        notifier: Arc<RecordingNotifier>,
        broadcaster: Arc<RecordingBroadcaster>,
        clock: Arc<ManualClock>,
    }

    async fn harness(mutate: impl FnOnce(&mut Config)) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database_path = dir.path().join("ads.db");
        mutate(&mut config);

        let notifier = Arc::new(RecordingNotifier::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let clock = Arc::new(ManualClock::at_ms(1_000_000));

        let service = AdService::start(
            config,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&broadcaster) as Arc<dyn Broadcaster>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .await
        .unwrap();

        Harness {
            _dir: dir,
            service,
            notifier,
            broadcaster,
            clock,
        }
    }

    fn user_caps() -> CapabilitySet {
        [caps::USE].into_iter().collect()
    }

    const AD: &str = "selling enchanted pickaxes at spawn";

    #[tokio::test]
    async fn submit_confirm_broadcasts_and_starts_cooldown() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        let outcome = h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::PendingConfirmation { ref preview, timeout_secs: 60 } if preview == AD
        ));

        let confirmed = h.service.confirm(actor);
        assert_eq!(
            confirmed,
            ConfirmOutcome::Broadcast {
                message: AD.to_string()
            }
        );

        let sent = h.broadcaster.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(actor, AD.to_string(), None)]);

        let remaining = h.service.remaining_cooldown(actor, &user_caps()).await;
        assert!(remaining >= 299 && remaining <= 300);
        assert!(h
            .notifier
            .notices_for(actor)
            .contains(&Notice::Broadcasted));
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_rejected() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        let second = h
            .service
            .submit(actor, &user_caps(), "another ad entirely".to_string())
            .await;
        assert_eq!(second, SubmitOutcome::AlreadyPending);
    }

    #[tokio::test]
    async fn submit_on_cooldown_reports_remaining() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        h.service.confirm(actor);

        h.clock.advance_secs(100);
        let outcome = h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::OnCooldown {
                remaining_secs: 200
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_notices_stop_when_actor_unreachable() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        h.service.confirm(actor);
        h.notifier.notices.lock().unwrap().clear();
        h.notifier.unreachable.store(true, Ordering::SeqCst);

        let outcome = h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert!(matches!(outcome, SubmitOutcome::OnCooldown { .. }));

        // Give the countdown task room for all of its ticks.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let countdowns = h
            .notifier
            .notices_for(actor)
            .into_iter()
            .filter(|n| matches!(n, Notice::OnCooldown { .. }))
            .count();
        assert_eq!(countdowns, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_emits_bounded_ticks() {
        let h = harness(|c| c.settings.countdown_notice_ticks = 2).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        h.service.confirm(actor);
        h.notifier.notices.lock().unwrap().clear();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let countdowns = h
            .notifier
            .notices_for(actor)
            .into_iter()
            .filter(|n| matches!(n, Notice::OnCooldown { .. }))
            .count();
        assert_eq!(countdowns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_expiry_frees_the_slot() {
        let h = harness(|c| c.confirmation_timeout_secs = 30).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(h.notifier.notices_for(actor).contains(&Notice::Expired));
        // No broadcast happened, no cooldown recorded.
        assert!(h.broadcaster.sent.lock().unwrap().is_empty());
        assert_eq!(h.service.remaining_cooldown(actor, &user_caps()).await, 0);

        let again = h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert!(matches!(again, SubmitOutcome::PendingConfirmation { .. }));
    }

    #[tokio::test]
    async fn invalid_message_is_rejected_before_admission() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        let outcome = h.service.submit(actor, &user_caps(), "short".to_string()).await;
        assert!(matches!(outcome, SubmitOutcome::Invalid { ref reason } if reason.contains("at least")));

        // Nothing pending afterwards.
        assert_eq!(h.service.cancel(actor), CancelOutcome::NoPending);
    }

    #[tokio::test]
    async fn review_mode_skips_confirmation_and_alerts_staff() {
        let h = harness(|c| c.moderation.require_review = true).await;
        let actor = ActorId::new();

        let outcome = h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert_eq!(outcome, SubmitOutcome::QueuedForReview);
        assert_eq!(h.service.confirm(actor), ConfirmOutcome::NoPending);

        let alerts = h.notifier.alerts.lock().unwrap().clone();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, caps::REVIEW);

        // The insert is async; poll for it.
        let mut entries = Vec::new();
        for _ in 0..50 {
            entries = h.service.reviews().list(1).await.unwrap();
            if !entries.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].submitter, actor);
    }

    #[tokio::test]
    async fn bypass_holder_skips_cooldown_and_is_told() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();
        let bypass: CapabilitySet = [caps::USE, caps::BYPASS].into_iter().collect();

        h.service.submit(actor, &bypass, AD.to_string()).await;
        h.service.confirm(actor);

        // Immediately submit again: bypass means no cooldown gate.
        let outcome = h.service.submit(actor, &bypass, AD.to_string()).await;
        assert!(matches!(outcome, SubmitOutcome::PendingConfirmation { .. }));
        assert!(h
            .notifier
            .notices_for(actor)
            .contains(&Notice::CooldownBypassed));
    }

    #[tokio::test]
    async fn cancel_twice_reports_no_pending() {
        let h = harness(|_| {}).await;
        let actor = ActorId::new();

        h.service.submit(actor, &user_caps(), AD.to_string()).await;
        assert_eq!(h.service.cancel(actor), CancelOutcome::Cancelled);
        assert_eq!(h.service.cancel(actor), CancelOutcome::NoPending);
    }

    #[tokio::test]
    async fn admin_broadcast_validates_and_targets_audience() {
        let h = harness(|_| {}).await;
        let admin = ActorId::new();

        h.service
            .broadcast_now(admin, AD, Some(caps::USE))
            .unwrap();
        let sent = h.broadcaster.sent.lock().unwrap().clone();
        assert_eq!(sent[0].2.as_deref(), Some(caps::USE));

        let err = h.service.broadcast_now(admin, "nope", None).unwrap_err();
        assert!(matches!(err, Rejection::TooShort { .. }));
    }

    #[tokio::test]
    async fn reload_swaps_rank_table() {
        let dir = TempDir::new().unwrap();
        let h = harness(|_| {}).await;

        let mut fresh = h.service.config();
        fresh.cooldowns.ranks.insert("vip".to_string(), 10);
        let path = dir.path().join("adboard.yaml");
        fresh.save(&path).unwrap();

        let warnings = h.service.reload(&path).unwrap();
        assert!(warnings.is_empty());

        let vip: CapabilitySet = [caps::USE.to_string(), caps::rank("vip")]
            .into_iter()
            .collect();
        let actor = ActorId::new();
        h.service.submit(actor, &vip, AD.to_string()).await;
        h.service.confirm(actor);

        h.clock.advance_secs(11);
        assert_eq!(h.service.remaining_cooldown(actor, &vip).await, 0);
    }
}
