//! Cooldown store: in-memory authoritative cache over the durable store,
//! rank-based effective-duration resolution, write-behind persistence.
//!
//! The cache is the source of truth for the life of the process. A confirmed
//! action updates the cache synchronously and enqueues the durable write;
//! the write-behind worker applies it off the interactive path. A durable
//! read happens at most once per actor per process lifetime (first lookup,
//! cache miss).

use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tracing::warn;

use crate::actor::{caps, ActorId, CapabilitySet, Clock};
use crate::config::Config;
use crate::store::{Database, WriteBehind};

// ---------------------------------------------------------------------------
// RankTable
// ---------------------------------------------------------------------------

/// Precomputed capability → cooldown-seconds pairs, replaced wholesale on
/// config reload so readers never observe a partially rebuilt table.
#[derive(Debug, Clone)]
pub struct RankTable {
    entries: Vec<(String, u64)>,
    default_secs: u64,
}

impl RankTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            entries: config.rank_table(),
            default_secs: config.cooldowns.default_secs,
        }
    }

    /// Minimum duration among entries whose capability is held; the config
    /// default when none match. Minimum wins exactly — a user with several
    /// qualifying ranks gets the shortest cooldown.
    fn effective_secs(&self, capabilities: &CapabilitySet) -> u64 {
        self.entries
            .iter()
            .filter(|(capability, _)| capabilities.has(capability))
            .map(|(_, secs)| *secs)
            .min()
            .unwrap_or(self.default_secs)
    }
}

// ---------------------------------------------------------------------------
// CooldownStore
// ---------------------------------------------------------------------------

pub struct CooldownStore {
    cache: DashMap<ActorId, i64>,
    table: RwLock<RankTable>,
    db: Database,
    /// Taken once on shutdown; `None` afterwards means the store is closed.
    write_behind: Mutex<Option<WriteBehind>>,
    clock: Arc<dyn Clock>,
}

impl CooldownStore {
    pub fn new(
        db: Database,
        write_behind: WriteBehind,
        table: RankTable,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache: DashMap::new(),
            table: RwLock::new(table),
            db,
            write_behind: Mutex::new(Some(write_behind)),
            clock,
        }
    }

    pub fn effective_cooldown_secs(&self, capabilities: &CapabilitySet) -> u64 {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .effective_secs(capabilities)
    }

    /// Swap in a freshly built rank table (config reload).
    pub fn replace_table(&self, table: RankTable) {
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = table;
    }

    /// Remaining cooldown in whole seconds, floor-divided; zero when clear.
    ///
    /// The bypass capability short-circuits before any lookup. A durable read
    /// failure on cache miss degrades to "no prior record" — the actor is not
    /// held hostage to a broken disk.
    pub async fn remaining_cooldown(&self, actor: ActorId, capabilities: &CapabilitySet) -> u64 {
        if capabilities.has(caps::BYPASS) {
            return 0;
        }

        let cached = self.cache.get(&actor).map(|entry| *entry);
        let last_ad_time = match cached {
            Some(t) => t,
            None => match self.db.load_cooldown(actor).await {
                Ok(Some(t)) => {
                    self.cache.insert(actor, t);
                    t
                }
                Ok(None) => 0,
                Err(e) => {
                    warn!(actor = %actor, error = %e, "cooldown load failed; treating as clear");
                    0
                }
            },
        };

        if last_ad_time == 0 {
            return 0;
        }

        let cooldown_end = last_ad_time + self.effective_cooldown_secs(capabilities) as i64 * 1000;
        let now = self.clock.now_ms();
        if now < cooldown_end {
            ((cooldown_end - now) / 1000) as u64
        } else {
            0
        }
    }

    /// Record a confirmed action: the cache update is synchronous and visible
    /// to the very next `remaining_cooldown` for this actor; the durable
    /// write is enqueued behind it.
    pub fn record_action(&self, actor: ActorId, now_ms: i64) {
        self.cache.insert(actor, now_ms);
        let guard = self.write_behind.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(wb) => {
                if wb.tx.send((actor, now_ms)).is_err() {
                    warn!(actor = %actor, "write-behind worker gone; cooldown not persisted");
                }
            }
            None => warn!(actor = %actor, "cooldown store closed; cooldown not persisted"),
        }
    }

    /// Durably write every cached entry. Shutdown only; best-effort — a
    /// failed write is logged and the iteration continues.
    pub async fn flush_all(&self) {
        let snapshot: Vec<(ActorId, i64)> = self
            .cache
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        for (actor, millis) in snapshot {
            if let Err(e) = self.db.save_cooldown(actor, millis).await {
                warn!(actor = %actor, error = %e, "cooldown flush failed");
            }
        }
    }

    /// Drain the write-behind worker, flush the cache, and release the pool.
    /// Idempotent: only the first call touches the store.
    pub async fn shutdown(&self) {
        let write_behind = self
            .write_behind
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(WriteBehind { tx, worker }) = write_behind else {
            return;
        };
        drop(tx);
        if let Err(e) = worker.await {
            warn!(error = %e, "write-behind worker terminated abnormally");
        }
        self.flush_all().await;
        self.db.close().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
