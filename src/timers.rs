//! Keyed, cancellable scheduler driven by room-local time.
//!
//! Every timer a room owns lives here under a [`TimerKey`]. Scheduling under a
//! key that is already present replaces the old entry, so at most one timer per
//! key can ever be pending. Due timers are popped one at a time by the owning
//! room inside its tick, which keeps timer side effects serialized with the
//! simulation step.

use std::collections::BTreeMap;

use crate::types::Ability;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKey {
    PowerWindow,
    FruitSpawn,
    MatchClock,
    Ability { player_id: String, ability: Ability },
}

impl TimerKey {
    pub fn ability(player_id: &str, ability: Ability) -> Self {
        Self::Ability {
            player_id: player_id.to_string(),
            ability,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    due_ms: u64,
    period_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct Timers {
    entries: BTreeMap<TimerKey, Entry>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires once at `now_ms + delay_ms`. Replaces any timer under `key`.
    pub fn schedule_once(&mut self, key: TimerKey, now_ms: u64, delay_ms: u64) {
        self.entries.insert(
            key,
            Entry {
                due_ms: now_ms.saturating_add(delay_ms),
                period_ms: None,
            },
        );
    }

    /// Fires every `period_ms`, first at `now_ms + period_ms`.
    pub fn schedule_every(&mut self, key: TimerKey, now_ms: u64, period_ms: u64) {
        let period_ms = period_ms.max(1);
        self.entries.insert(
            key,
            Entry {
                due_ms: now_ms.saturating_add(period_ms),
                period_ms: Some(period_ms),
            },
        );
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every ability timer held for `player_id`.
    pub fn cancel_player(&mut self, player_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            !matches!(key, TimerKey::Ability { player_id: owner, .. } if owner == player_id)
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remaining_ms(&self, key: &TimerKey, now_ms: u64) -> Option<u64> {
        self.entries
            .get(key)
            .map(|entry| entry.due_ms.saturating_sub(now_ms))
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn pending_abilities(&self) -> usize {
        self.entries
            .keys()
            .filter(|key| matches!(key, TimerKey::Ability { .. }))
            .count()
    }

    /// Removes and returns the earliest timer due at or before `now_ms`.
    ///
    /// Interval timers are re-armed one period later before being returned.
    /// Callers loop until `None`, so a handler that cancels another timer
    /// prevents it from firing in the same pass.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerKey> {
        let key = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.due_ms <= now_ms)
            .min_by_key(|(_, entry)| entry.due_ms)
            .map(|(key, _)| key.clone())?;

        let entry = self.entries.get_mut(&key)?;
        match entry.period_ms {
            Some(period) => entry.due_ms = entry.due_ms.saturating_add(period),
            None => {
                self.entries.remove(&key);
            }
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(timers: &mut Timers, now_ms: u64) -> Vec<TimerKey> {
        let mut fired = Vec::new();
        while let Some(key) = timers.pop_due(now_ms) {
            fired.push(key);
        }
        fired
    }

    #[test]
    fn one_shot_fires_exactly_once() {
        let mut timers = Timers::new();
        timers.schedule_once(TimerKey::PowerWindow, 0, 100);
        assert!(drain(&mut timers, 99).is_empty());
        assert_eq!(drain(&mut timers, 100), vec![TimerKey::PowerWindow]);
        assert!(drain(&mut timers, 1_000).is_empty());
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn rescheduling_replaces_instead_of_stacking() {
        let mut timers = Timers::new();
        let key = TimerKey::ability("p1", Ability::EliminationPower);
        timers.schedule_once(key.clone(), 0, 10_000);
        timers.schedule_once(key.clone(), 1_000, 10_000);
        assert_eq!(timers.pending_abilities(), 1);
        assert_eq!(timers.remaining_ms(&key, 1_000), Some(10_000));
        assert!(drain(&mut timers, 10_999).is_empty());
        assert_eq!(drain(&mut timers, 11_000), vec![key]);
    }

    #[test]
    fn intervals_rearm_and_catch_up_in_order() {
        let mut timers = Timers::new();
        timers.schedule_every(TimerKey::MatchClock, 0, 1_000);
        timers.schedule_once(TimerKey::PowerWindow, 0, 1_500);
        let fired = drain(&mut timers, 2_000);
        assert_eq!(
            fired,
            vec![
                TimerKey::MatchClock,
                TimerKey::PowerWindow,
                TimerKey::MatchClock
            ]
        );
        assert_eq!(timers.remaining_ms(&TimerKey::MatchClock, 2_000), Some(1_000));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = Timers::new();
        timers.schedule_every(TimerKey::FruitSpawn, 0, 30_000);
        assert!(timers.cancel(&TimerKey::FruitSpawn));
        assert!(!timers.cancel(&TimerKey::FruitSpawn));
        assert!(drain(&mut timers, 90_000).is_empty());
    }

    #[test]
    fn cancel_player_only_touches_that_players_abilities() {
        let mut timers = Timers::new();
        timers.schedule_once(TimerKey::ability("a", Ability::SpeedBoost), 0, 5_000);
        timers.schedule_once(TimerKey::ability("a", Ability::EliminationPower), 0, 5_000);
        timers.schedule_once(TimerKey::ability("b", Ability::SpeedBoost), 0, 5_000);
        timers.schedule_every(TimerKey::MatchClock, 0, 1_000);
        assert_eq!(timers.cancel_player("a"), 2);
        assert_eq!(timers.pending(), 2);
        assert!(timers.is_scheduled(&TimerKey::ability("b", Ability::SpeedBoost)));
    }
}
