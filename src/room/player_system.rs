use tracing::debug;

use super::utils::{centre_cell, distance};
use super::*;
use crate::constants::PLAYER_CONTACT_DISTANCE;
use crate::movement::{is_effective, resolve_move};

impl Room {
    pub(super) fn update_players(&mut self) {
        let movers: Vec<String> = self
            .players
            .iter()
            .filter(|player| !player.view.spectator)
            .map(|player| player.view.id.clone())
            .collect();

        for member_id in movers {
            if !self.active {
                break;
            }
            // Eliminated earlier in this tick.
            let Some(idx) = self.player_index(&member_id) else {
                continue;
            };
            self.advance_player(idx);
        }
    }

    fn advance_player(&mut self, idx: usize) {
        let view = &self.players[idx].view;
        if view.direction == Direction::None {
            return;
        }
        let speed = if view.speed_boost {
            self.rules.boosted_speed
        } else {
            self.rules.player_speed
        };
        let from = (view.x, view.y);
        let Some(to) = resolve_move(&self.grid, from.0, from.1, view.direction, speed) else {
            return;
        };

        let view = &mut self.players[idx].view;
        view.x = to.0;
        view.y = to.1;
        if !is_effective(from, to) {
            return;
        }
        let moved = ServerEvent::PlayerMoved {
            id: view.id.clone(),
            x: view.x,
            y: view.y,
            direction: view.direction,
        };
        self.push_room(moved);

        self.apply_pickup(idx);
        if self.active && self.players[idx].view.elimination_power {
            self.check_eliminations(idx);
        }
    }

    pub(super) fn apply_pickup(&mut self, idx: usize) {
        let view = &self.players[idx].view;
        let (col, row) = centre_cell(view.x, view.y);
        let Some(cell) = self.grid.get(col, row) else {
            return;
        };

        match cell {
            Cell::Pellet => {
                self.grid.set(col, row, Cell::Empty);
                self.award(idx, self.rules.pellet_score);
                self.players[idx].stats.pellets += 1;
                self.pellets_remaining = self.pellets_remaining.saturating_sub(1);
                self.push_cell(col, row);
                self.push_scores();
                if self.pellets_remaining == 0 {
                    self.end_match(Some(idx), EndReason::PelletsCleared);
                }
            }
            Cell::PowerPellet => {
                self.grid.set(col, row, Cell::Empty);
                self.award(idx, self.rules.power_score);
                self.push_cell(col, row);
                self.activate_ability(idx, Ability::EliminationPower);
                self.start_power_window();
                self.push_scores();
            }
            Cell::Fruit => {
                self.grid.set(col, row, Cell::Empty);
                self.fruits.remove(&(col, row));
                self.award(idx, self.rules.power_score);
                self.push_cell(col, row);
                let view = &self.players[idx].view;
                let eaten = ServerEvent::FruitEaten {
                    x: col,
                    y: row,
                    player_id: view.id.clone(),
                    player_name: view.name.clone(),
                };
                self.push_room(eaten);
                self.activate_ability(idx, Ability::SpeedBoost);
                self.push_scores();
            }
            Cell::Empty | Cell::Wall => {}
        }
    }

    /// Removes the first other contender in roster order within reach of a
    /// player holding elimination-power.
    pub(super) fn check_eliminations(&mut self, idx: usize) {
        let actor = &self.players[idx].view;
        let actor_id = actor.id.clone();
        let actor_name = actor.name.clone();
        let actor_pos = (actor.x, actor.y);

        let target = self.players.iter().position(|other| {
            other.view.id != actor_id
                && !other.view.spectator
                && other.view.lives > 0
                && distance(actor_pos, (other.view.x, other.view.y)) < PLAYER_CONTACT_DISTANCE
        });
        let Some(target_idx) = target else {
            return;
        };

        self.players[target_idx].view.lives = 0;
        let removed = self.remove_defeated(target_idx, Some(actor_name));
        let Some(actor_idx) = self.player_index(&actor_id) else {
            return;
        };
        self.award(actor_idx, self.rules.elimination_bonus);
        self.players[actor_idx].stats.eliminations += 1;
        debug!(
            "{} removed {} from room {}",
            actor_id, removed.view.id, self.id
        );
        self.push_scores();
        self.check_survivors();
    }

    fn push_cell(&mut self, col: i32, row: i32) {
        let cell = self.grid.get(col, row).unwrap_or(Cell::Empty);
        self.push_room(ServerEvent::MapDelta { x: col, y: row, cell });
    }
}
