//! Shared in-process state: per-contact activity and the dedup ledger.
//!
//! Request handlers and the background loops all go through [`RelayState`].
//! Every method takes the lock, does its read-modify-write, and releases it
//! before returning, so no guard ever crosses an `.await`.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::dedup::DedupLedger;

/// Timing of the latest exchange with one contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityState {
    pub last_user_at: Option<DateTime<Utc>>,
    pub last_bot_at: Option<DateTime<Utc>>,
    /// Set once the nudge for the current silence episode went out.
    pub followup_sent: bool,
}

impl ActivityState {
    /// Whether a nudge should go out at `now`.
    ///
    /// The bot must have spoken after the user's last message, and the
    /// silence since that message must lie within `[min, max]`.
    pub fn followup_due(&self, now: DateTime<Utc>, min: Duration, max: Duration) -> bool {
        if self.followup_sent {
            return false;
        }
        let Some(user_at) = self.last_user_at else {
            return false;
        };
        match self.last_bot_at {
            Some(bot_at) if bot_at > user_at => {}
            _ => return false,
        }
        let silence = now - user_at;
        silence >= min && silence <= max
    }
}

#[derive(Default)]
pub struct RelayState {
    activity: Mutex<HashMap<String, ActivityState>>,
    dedup: Mutex<DedupLedger>,
}

/// A poisoned lock only means another task panicked mid-update; the maps are
/// still structurally valid, so keep serving.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound id. Returns `false` when it was already seen.
    ///
    /// An empty id cannot be deduplicated and is always accepted.
    pub fn mark_processed(&self, message_id: &str) -> bool {
        if message_id.is_empty() {
            return true;
        }
        lock(&self.dedup).insert(message_id)
    }

    /// A user message opens a new silence episode.
    pub fn record_user_message(&self, contact: &str, at: DateTime<Utc>) {
        let mut activity = lock(&self.activity);
        let entry = activity.entry(contact.to_string()).or_default();
        entry.last_user_at = Some(at);
        entry.followup_sent = false;
    }

    pub fn record_bot_reply(&self, contact: &str, at: DateTime<Utc>) {
        let mut activity = lock(&self.activity);
        activity.entry(contact.to_string()).or_default().last_bot_at = Some(at);
    }

    /// Contacts owed a nudge at `now`, with the `last_user_at` of the episode.
    pub fn due_followups(
        &self,
        now: DateTime<Utc>,
        min: Duration,
        max: Duration,
    ) -> Vec<(String, DateTime<Utc>)> {
        let activity = lock(&self.activity);
        let mut due: Vec<(String, DateTime<Utc>)> = activity
            .iter()
            .filter(|(_, state)| state.followup_due(now, min, max))
            .filter_map(|(contact, state)| state.last_user_at.map(|at| (contact.clone(), at)))
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1));
        due
    }

    /// Close the episode that started at `episode_user_at`.
    ///
    /// Does nothing, and returns `false`, if the user wrote again in the
    /// meantime: that newer message owns a fresh episode.
    pub fn complete_followup(
        &self,
        contact: &str,
        episode_user_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> bool {
        let mut activity = lock(&self.activity);
        match activity.get_mut(contact) {
            Some(state) if state.last_user_at == Some(episode_user_at) => {
                state.followup_sent = true;
                state.last_bot_at = Some(at);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn activity(&self, contact: &str) -> Option<ActivityState> {
        lock(&self.activity).get(contact).cloned()
    }

    pub fn contact_count(&self) -> usize {
        lock(&self.activity).len()
    }

    pub fn processed_count(&self) -> usize {
        lock(&self.dedup).len()
    }
}
