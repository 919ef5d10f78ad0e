use rand::Rng;

use super::*;
use crate::constants::FRUIT_CELLS;

impl Room {
    pub(super) fn fire_due_timers(&mut self) {
        while let Some(key) = self.timers.pop_due(self.now_ms) {
            match key {
                TimerKey::PowerWindow => self.end_power_window(),
                TimerKey::FruitSpawn => self.spawn_fruit(),
                TimerKey::MatchClock => self.advance_clock(),
                TimerKey::Ability { player_id, ability } => {
                    self.expire_ability(&player_id, ability)
                }
            }
        }
    }

    fn expire_ability(&mut self, player_id: &str, ability: Ability) {
        let Some(idx) = self.player_index(player_id) else {
            debug!("ability timer for {} outlived the player", player_id);
            return;
        };
        let view = &mut self.players[idx].view;
        let flag = match ability {
            Ability::EliminationPower => &mut view.elimination_power,
            Ability::SpeedBoost => &mut view.speed_boost,
        };
        if !*flag {
            debug!("{:?} for {} already inactive", ability, player_id);
            return;
        }
        *flag = false;
        match ability {
            Ability::EliminationPower => view.elimination_power_ms = 0,
            Ability::SpeedBoost => view.speed_boost_ms = 0,
        }
        self.push_room(ServerEvent::AbilityDeactivated {
            player_id: player_id.to_string(),
            ability,
        });
    }

    fn end_power_window(&mut self) {
        if !self.power_window {
            debug!("power window in room {} already closed", self.id);
            return;
        }
        self.power_window = false;
        for pursuer in &mut self.pursuers {
            pursuer.view.vulnerable = false;
        }
        self.push_room(ServerEvent::PowerWindowEnded);
    }

    fn spawn_fruit(&mut self) {
        if !self.active {
            return;
        }
        let open: Vec<(i32, i32)> = FRUIT_CELLS
            .iter()
            .copied()
            .filter(|&(col, row)| self.grid.get(col, row) == Some(Cell::Empty))
            .collect();
        if open.is_empty() {
            debug!("no free fruit cell in room {}", self.id);
            return;
        }
        let (col, row) = open[self.rng.random_range(0..open.len())];
        self.grid.set(col, row, Cell::Fruit);
        self.fruits.insert((col, row));
        debug!("fruit spawned at ({}, {}) in room {}", col, row, self.id);
        self.push_room(ServerEvent::FruitSpawned { x: col, y: row });
    }

    /// Cancels the fruit cadence and clears any fruit still on the grid.
    pub(super) fn stop_fruit_spawner(&mut self) {
        self.timers.cancel(&TimerKey::FruitSpawn);
        let fruits = std::mem::take(&mut self.fruits);
        for (col, row) in fruits {
            if self.grid.get(col, row) == Some(Cell::Fruit) {
                self.grid.set(col, row, Cell::Empty);
                self.push_room(ServerEvent::MapDelta {
                    x: col,
                    y: row,
                    cell: Cell::Empty,
                });
            }
        }
    }

    fn advance_clock(&mut self) {
        if !self.clock.running {
            self.timers.cancel(&TimerKey::MatchClock);
            return;
        }
        self.clock.remaining = self.clock.remaining.saturating_sub(1);
        self.push_room(ServerEvent::ClockTick {
            remaining: self.clock.remaining,
            total: self.clock.duration,
        });
        if self.clock.remaining > 0 {
            return;
        }

        self.stop_clock();
        if self.active {
            let leader = self.leader_index();
            self.end_match(leader, EndReason::TimeUp);
        }
    }

    /// Highest-scoring contender; ties keep the earlier roster entry.
    fn leader_index(&self) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for idx in self.contender_indices() {
            let score = self.players[idx].view.score;
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }
}
