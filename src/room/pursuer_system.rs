use rand::Rng;

use super::utils::{direction_toward, distance, random_direction};
use super::*;
use crate::constants::PURSUER_CONTACT_DISTANCE;
use crate::movement::resolve_move;

impl Room {
    pub(super) fn update_pursuers(&mut self) {
        for idx in 0..self.pursuers.len() {
            if !self.active {
                break;
            }
            self.advance_pursuer(idx);
        }
    }

    fn advance_pursuer(&mut self, idx: usize) {
        let view = &self.pursuers[idx].view;
        let speed = if view.vulnerable {
            self.rules.vulnerable_speed
        } else {
            self.rules.pursuer_speed
        };
        match resolve_move(&self.grid, view.x, view.y, view.direction, speed) {
            Some((x, y)) => {
                let view = &mut self.pursuers[idx].view;
                view.x = x;
                view.y = y;
            }
            None => {
                self.pursuers[idx].view.direction = random_direction(&mut self.rng);
                return;
            }
        }

        if self.rng.random_bool(self.rules.retarget_probability.clamp(0.0, 1.0)) {
            self.retarget(idx);
        }

        let pos = (self.pursuers[idx].view.x, self.pursuers[idx].view.y);
        let victim = self.players.iter().position(|player| {
            !player.view.spectator
                && distance(pos, (player.view.x, player.view.y)) < PURSUER_CONTACT_DISTANCE
        });
        if let Some(player_idx) = victim {
            self.resolve_contact(idx, player_idx);
        }
    }

    /// Points the pursuer at the nearest non-spectator player.
    fn retarget(&mut self, idx: usize) {
        let pos = (self.pursuers[idx].view.x, self.pursuers[idx].view.y);
        let mut nearest: Option<((i32, i32), f64)> = None;
        for player in self.players.iter().filter(|p| !p.view.spectator) {
            let target = (player.view.x, player.view.y);
            let dist = distance(pos, target);
            if nearest.is_none_or(|(_, best)| dist < best) {
                nearest = Some((target, dist));
            }
        }
        if let Some((target, _)) = nearest {
            self.pursuers[idx].view.direction = direction_toward(pos, target);
        }
    }

    fn resolve_contact(&mut self, pursuer_idx: usize, player_idx: usize) {
        if self.pursuers[pursuer_idx].view.vulnerable {
            self.award(player_idx, self.rules.pursuer_score);
            self.players[player_idx].stats.pursuers_eaten += 1;
            let pursuer = &mut self.pursuers[pursuer_idx];
            pursuer.view.x = pursuer.home.0;
            pursuer.view.y = pursuer.home.1;
            pursuer.view.vulnerable = false;
            let eaten = ServerEvent::PursuerEaten {
                pursuer_id: pursuer.view.id,
                player_id: self.players[player_idx].view.id.clone(),
            };
            self.push_room(eaten);
            self.push_scores();
            return;
        }

        let player = &mut self.players[player_idx];
        player.view.lives = player.view.lives.saturating_sub(1);
        player.stats.hits += 1;
        if player.view.lives == 0 {
            self.remove_defeated(player_idx, None);
            self.check_survivors();
            return;
        }

        let (x, y) = self.spawn_position();
        let view = &mut self.players[player_idx].view;
        view.x = x;
        view.y = y;
        let hit = ServerEvent::PlayerHit {
            player_id: view.id.clone(),
            lives: view.lives,
            x,
            y,
        };
        self.push_room(hit);
    }
}
