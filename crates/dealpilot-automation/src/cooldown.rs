//! Per-(rule, deal) cooldown enforcement.
//!
//! Cooldown state is derived from the execution log: a pair is cooling down
//! while its newest `success` entry is younger than the rule's window.
//! Checking and recording must not interleave with another evaluation of
//! the same pair, so each pair has an async mutex in a shared lock table.
//! A [`CooldownSlot`] holds that mutex from the check until the log entry
//! is written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{AutomationRule, Timestamp};

use crate::capability::RuleLogStore;

type PairKey = (Uuid, Uuid);

#[derive(Default)]
struct LockTable {
    slots: Mutex<HashMap<PairKey, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    fn entry(&self, key: PairKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // A waiter cancelled after the holder released leaves an entry
        // only the table references.
        slots.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(slots.entry(key).or_default())
    }

    fn release(&self, key: PairKey, guard: OwnedMutexGuard<()>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        drop(guard);
        // Only the table itself still references the mutex: nobody is
        // holding or waiting on it.
        if slots
            .get(&key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            slots.remove(&key);
        }
    }

    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive claim on one (rule, deal) pair. Released on drop.
pub struct CooldownSlot {
    key: PairKey,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl CooldownSlot {
    pub fn rule_id(&self) -> Uuid {
        self.key.0
    }

    pub fn deal_id(&self) -> Uuid {
        self.key.1
    }
}

impl Drop for CooldownSlot {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.table.release(self.key, guard);
        }
    }
}

impl std::fmt::Debug for CooldownSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownSlot")
            .field("rule_id", &self.key.0)
            .field("deal_id", &self.key.1)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    CoolingDown {
        last_success: Timestamp,
        retry_after: Timestamp,
    },
}

/// Decide eligibility from the newest success of a pair.
///
/// A zero-hour window never blocks. A success timestamped after `now`
/// (clock skew) counts as inside the window.
pub fn evaluate(last_success: Option<Timestamp>, cooldown_secs: i64, now: Timestamp) -> Eligibility {
    match last_success {
        Some(last) if cooldown_secs > 0 && now.seconds_since(last) < cooldown_secs => {
            Eligibility::CoolingDown {
                last_success: last,
                retry_after: Timestamp(last.0 + cooldown_secs),
            }
        }
        _ => Eligibility::Eligible,
    }
}

pub struct CooldownTracker {
    store: Arc<dyn RuleLogStore>,
    table: Arc<LockTable>,
}

impl CooldownTracker {
    pub fn new(store: Arc<dyn RuleLogStore>) -> Self {
        Self {
            store,
            table: Arc::new(LockTable::default()),
        }
    }

    /// Wait until no other evaluation holds the pair, then claim it.
    pub async fn claim(&self, rule_id: Uuid, deal_id: Uuid) -> CooldownSlot {
        let key = (rule_id, deal_id);
        let lock = self.table.entry(key);
        let guard = lock.lock_owned().await;
        CooldownSlot {
            key,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Check the rule's window for the claimed pair.
    pub async fn check(
        &self,
        slot: &CooldownSlot,
        rule: &AutomationRule,
        now: Timestamp,
    ) -> Result<Eligibility, DealpilotError> {
        debug_assert_eq!(slot.rule_id(), rule.id);
        if rule.cooldown_hours == 0 {
            return Ok(Eligibility::Eligible);
        }
        let last = self
            .store
            .last_successful_execution(slot.rule_id(), slot.deal_id())
            .await?;
        Ok(evaluate(last, rule.cooldown_secs(), now))
    }

    /// Pairs in the lock table: claimed, waited on, or left by a waiter
    /// cancelled since the last claim.
    pub fn in_flight(&self) -> usize {
        self.table.len()
    }
}
