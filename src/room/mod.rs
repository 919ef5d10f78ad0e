use std::collections::{BTreeSet, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GameRules;
use crate::constants::{cell_origin, CELL_SIZE, CLOCK_PERIOD_MS, SPAWN_CELLS};
use crate::error::{GameError, Result};
use crate::grid::{generate, Grid};
use crate::server_utils::{is_valid_duration, sanitize_name};
use crate::timers::{TimerKey, Timers};
use crate::types::{
    Ability, Cell, CellPos, ClockView, Direction, EndReason, JoinMode, PlayerView, PursuerView,
    RoomInfo, RoomState, ScoreEntry, ServerEvent, Snapshot,
};

mod player_system;
mod pursuer_system;
mod schedule_system;
mod utils;

use self::utils::PURSUER_HOMES;

/// Who an outbound event is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Room,
    Member(String),
}

#[derive(Clone, Debug)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PlayerStats {
    pub pellets: u32,
    #[serde(rename = "pursuersEaten")]
    pub pursuers_eaten: u32,
    pub eliminations: u32,
    pub hits: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Standing {
    pub player: PlayerView,
    pub stats: PlayerStats,
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    view: PlayerView,
    stats: PlayerStats,
}

#[derive(Clone, Debug)]
struct PursuerInternal {
    view: PursuerView,
    home: (i32, i32),
}

#[derive(Clone, Copy, Debug)]
struct MatchClock {
    duration: u32,
    remaining: u32,
    running: bool,
}

/// One independent match: grid, roster, pursuers and every timer they own.
///
/// A room never touches the network. Mutators and [`Room::tick`] append
/// [`Outbound`] events that the caller drains and delivers.
#[derive(Debug)]
pub struct Room {
    id: String,
    rules: GameRules,
    rng: StdRng,
    template: Grid,
    grid: Grid,
    players: Vec<PlayerInternal>,
    pursuers: Vec<PursuerInternal>,
    fruits: BTreeSet<(i32, i32)>,
    pellets_remaining: usize,
    power_window: bool,
    clock: MatchClock,
    champion: Option<String>,
    active: bool,
    closed: bool,
    audience: BTreeSet<String>,
    eliminated: HashSet<String>,
    timers: Timers,
    outbox: Vec<Outbound>,
    now_ms: u64,
    tick_counter: u64,
}

impl Room {
    pub fn new(id: impl Into<String>, rules: GameRules) -> Self {
        let rng = match rules.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let template = generate();
        let grid = template.clone();
        let pellets_remaining = grid.count(Cell::Pellet);
        let clock = MatchClock {
            duration: rules.match_seconds,
            remaining: rules.match_seconds,
            running: false,
        };

        Self {
            id: id.into(),
            rules,
            rng,
            template,
            grid,
            players: Vec::new(),
            pursuers: spawn_pursuers(),
            fruits: BTreeSet::new(),
            pellets_remaining,
            power_window: false,
            clock,
            champion: None,
            active: false,
            closed: false,
            audience: BTreeSet::new(),
            eliminated: HashSet::new(),
            timers: Timers::new(),
            outbox: Vec::new(),
            now_ms: 0,
            tick_counter: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn champion(&self) -> Option<&str> {
        self.champion.as_deref()
    }

    pub fn pellets_remaining(&self) -> usize {
        self.pellets_remaining
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn roster_len(&self) -> usize {
        self.players.len()
    }

    pub fn audience(&self) -> Vec<String> {
        self.audience.iter().cloned().collect()
    }

    pub fn has_audience(&self) -> bool {
        !self.audience.is_empty()
    }

    pub fn player(&self, member_id: &str) -> Option<&PlayerView> {
        self.players
            .iter()
            .find(|player| player.view.id == member_id)
            .map(|player| &player.view)
    }

    pub fn join(&mut self, member_id: &str, name: &str, mode: JoinMode) -> Result<PlayerView> {
        let name = sanitize_name(name).ok_or(GameError::InvalidName)?;
        if !mode.is_spectator() {
            if self.active {
                return Err(GameError::JoinWhileRunning);
            }
            if self.eliminated.contains(member_id) {
                return Err(GameError::EliminatedThisMatch);
            }
        }

        let view = match self.player(member_id) {
            Some(existing) => existing.clone(),
            None => {
                let (x, y) = self.spawn_position();
                let view = PlayerView {
                    id: member_id.to_string(),
                    name,
                    x,
                    y,
                    direction: Direction::Right,
                    lives: if mode.is_spectator() {
                        0
                    } else {
                        self.rules.initial_lives
                    },
                    score: 0,
                    spectator: mode.is_spectator(),
                    elimination_power: false,
                    elimination_power_ms: 0,
                    speed_boost: false,
                    speed_boost_ms: 0,
                };
                self.players.push(PlayerInternal {
                    view: view.clone(),
                    stats: PlayerStats::default(),
                });
                info!(
                    "{} {} joined room {}",
                    if view.spectator { "spectator" } else { "player" },
                    view.name,
                    self.id
                );
                view
            }
        };

        self.audience.insert(member_id.to_string());
        let state = self.room_state();
        self.push_to(
            member_id,
            ServerEvent::RoomState {
                me_id: Some(view.id.clone()),
                spectator: view.spectator,
                state,
            },
        );
        self.push_roster();
        Ok(view)
    }

    /// Drops a member from the roster and the audience. Returns whether the
    /// member was known to this room.
    pub fn leave(&mut self, member_id: &str) -> bool {
        let was_listening = self.audience.remove(member_id);
        let Some(idx) = self.player_index(member_id) else {
            return was_listening;
        };
        let player = self.players.remove(idx);
        self.timers.cancel_player(member_id);
        info!("{} left room {}", player.view.name, self.id);
        self.push_roster();
        true
    }

    /// Applies a movement intent. Intents from unknown members, spectators or
    /// outside a running match are ignored.
    pub fn set_direction(&mut self, member_id: &str, direction: Direction) -> bool {
        if !self.active {
            return false;
        }
        let Some(idx) = self.player_index(member_id) else {
            debug!("ignoring move from {} not in room {}", member_id, self.id);
            return false;
        };
        let player = &mut self.players[idx].view;
        if player.spectator {
            return false;
        }
        player.direction = direction;
        true
    }

    pub fn restart(&mut self) {
        self.timers.clear();
        self.grid = self.template.clone();
        self.pursuers = spawn_pursuers();
        self.fruits.clear();
        self.power_window = false;
        self.pellets_remaining = self.grid.count(Cell::Pellet);
        self.champion = None;
        self.active = true;
        self.clock.remaining = self.clock.duration;
        self.clock.running = false;
        self.eliminated.clear();

        self.players
            .retain(|player| player.view.spectator || player.view.lives > 0);
        let (x, y) = self.spawn_position();
        let lives = self.rules.initial_lives;
        for player in self.players.iter_mut().filter(|p| !p.view.spectator) {
            let view = &mut player.view;
            view.x = x;
            view.y = y;
            view.direction = Direction::Right;
            view.lives = lives;
            view.score = 0;
            view.elimination_power = false;
            view.elimination_power_ms = 0;
            view.speed_boost = false;
            view.speed_boost_ms = 0;
            player.stats = PlayerStats::default();
        }

        self.timers.schedule_every(
            TimerKey::FruitSpawn,
            self.now_ms,
            self.rules.fruit_interval_ms,
        );

        info!(
            "match started in room {} with {} players",
            self.id,
            self.contender_count()
        );
        let state = self.room_state();
        self.push_room(ServerEvent::MatchStarted { state });
        let statuses: Vec<(String, u32, u32)> = self
            .players
            .iter()
            .map(|p| (p.view.id.clone(), p.view.lives, p.view.score))
            .collect();
        for (id, lives, score) in statuses {
            self.push_to(&id, ServerEvent::PlayerStatus { lives, score });
        }
    }

    pub fn set_duration(&mut self, seconds: i64) -> Result<()> {
        if !is_valid_duration(seconds) {
            return Err(GameError::InvalidDuration(seconds));
        }
        let seconds = seconds as u32;
        self.clock.duration = seconds;
        self.clock.remaining = seconds;
        info!("room {} match duration set to {}s", self.id, seconds);
        self.push_room(ServerEvent::ClockSet {
            duration: seconds,
            remaining: seconds,
        });
        Ok(())
    }

    pub fn start_clock(&mut self) {
        self.clock.remaining = self.clock.duration;
        self.clock.running = true;
        self.timers
            .schedule_every(TimerKey::MatchClock, self.now_ms, CLOCK_PERIOD_MS);
        info!("room {} clock started at {}s", self.id, self.clock.duration);
    }

    pub fn stop_clock(&mut self) {
        self.timers.cancel(&TimerKey::MatchClock);
        self.clock.running = false;
    }

    /// Cancels every timer. A closed room ignores further ticks.
    pub fn shutdown(&mut self) {
        self.timers.clear();
        self.active = false;
        self.closed = true;
        info!("room {} closed", self.id);
    }

    /// Advances room time by `dt_ms`, fires due timers, then runs one
    /// simulation step if a match is running.
    pub fn tick(&mut self, dt_ms: u64) {
        if self.closed {
            return;
        }
        self.now_ms = self.now_ms.saturating_add(dt_ms);
        self.fire_due_timers();
        if self.active {
            self.step(dt_ms);
        }
    }

    fn step(&mut self, dt_ms: u64) {
        self.tick_counter += 1;
        self.decay_ability_displays(dt_ms);
        self.sweep_defeated();

        if self.contender_count() == 0 {
            self.end_match(None, EndReason::Abandoned);
            return;
        }

        self.update_players();
        if self.active {
            self.update_pursuers();
        }
    }

    /// Counts down the displayed ability time. Expiry itself belongs to the
    /// ability timers.
    fn decay_ability_displays(&mut self, dt_ms: u64) {
        for player in &mut self.players {
            let view = &mut player.view;
            if view.elimination_power {
                view.elimination_power_ms = view.elimination_power_ms.saturating_sub(dt_ms);
            }
            if view.speed_boost {
                view.speed_boost_ms = view.speed_boost_ms.saturating_sub(dt_ms);
            }
        }
    }

    /// Defeated players leave the roster the moment they lose their last
    /// life, so this should never find anyone.
    fn sweep_defeated(&mut self) {
        let before = self.players.len();
        self.players
            .retain(|player| player.view.spectator || player.view.lives > 0);
        let swept = before - self.players.len();
        if swept > 0 {
            warn!("room {} swept {} defeated players left in roster", self.id, swept);
            self.push_roster();
        }
    }

    pub(crate) fn activate_ability(&mut self, idx: usize, ability: Ability) {
        let duration_ms = match ability {
            Ability::EliminationPower => self.rules.elimination_power_ms,
            Ability::SpeedBoost => self.rules.speed_boost_ms,
        };
        let view = &mut self.players[idx].view;
        match ability {
            Ability::EliminationPower => {
                view.elimination_power = true;
                view.elimination_power_ms = duration_ms;
            }
            Ability::SpeedBoost => {
                view.speed_boost = true;
                view.speed_boost_ms = duration_ms;
            }
        }
        let player_id = view.id.clone();
        let player_name = view.name.clone();
        self.timers
            .schedule_once(TimerKey::ability(&player_id, ability), self.now_ms, duration_ms);
        debug!("{} gained {:?} in room {}", player_name, ability, self.id);
        self.push_room(ServerEvent::AbilityActivated {
            player_id,
            player_name,
            ability,
            duration_ms,
        });
    }

    fn start_power_window(&mut self) {
        self.power_window = true;
        for pursuer in &mut self.pursuers {
            pursuer.view.vulnerable = true;
        }
        self.timers
            .schedule_once(TimerKey::PowerWindow, self.now_ms, self.rules.power_window_ms);
        self.push_room(ServerEvent::PowerWindowStarted {
            duration_ms: self.rules.power_window_ms,
        });
    }

    /// Removes a defeated player and records that they may not rejoin until
    /// the next restart.
    fn remove_defeated(&mut self, idx: usize, eliminated_by: Option<String>) -> PlayerInternal {
        let player = self.players.remove(idx);
        self.timers.cancel_player(&player.view.id);
        self.eliminated.insert(player.view.id.clone());
        info!(
            "{} eliminated in room {}{}",
            player.view.name,
            self.id,
            eliminated_by
                .as_deref()
                .map(|by| format!(" by {by}"))
                .unwrap_or_default()
        );
        self.push_room(ServerEvent::PlayerEliminated {
            player_id: player.view.id.clone(),
            player_name: player.view.name.clone(),
            eliminated_by,
        });
        self.push_roster();
        player
    }

    /// Ends the match once at most one contender is left.
    fn check_survivors(&mut self) {
        let contenders: Vec<usize> = self.contender_indices();
        match contenders.as_slice() {
            [] => self.end_match(None, EndReason::AllEliminated),
            [last] => self.end_match(Some(*last), EndReason::LastSurvivor),
            _ => {}
        }
    }

    pub(crate) fn end_match(&mut self, winner: Option<usize>, reason: EndReason) {
        if !self.active {
            return;
        }
        self.active = false;
        self.stop_fruit_spawner();
        self.stop_clock();

        let winner = winner.and_then(|idx| self.players.get(idx));
        match winner {
            Some(player) => {
                let champion = player.view.name.clone();
                let score = player.view.score;
                info!(
                    "room {} won by {} with {} points ({:?})",
                    self.id, champion, score, reason
                );
                self.champion = Some(champion.clone());
                self.push_room(ServerEvent::MatchWon {
                    champion,
                    score,
                    reason,
                });
            }
            None => {
                info!("room {} ended without a champion ({:?})", self.id, reason);
                self.champion = None;
                self.push_room(ServerEvent::MatchEndedNoChampion { reason });
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            active: self.active,
            pellets_remaining: self.pellets_remaining,
            players: self.roster(),
            pursuers: self.pursuers.iter().map(|p| p.view.clone()).collect(),
            clock: self.clock_view(),
        }
    }

    pub fn room_state(&self) -> RoomState {
        RoomState {
            room_id: self.id.clone(),
            width: self.grid.width() as usize,
            height: self.grid.height() as usize,
            cell_size: CELL_SIZE,
            tiles: self.grid.to_tiles(),
            active: self.active,
            champion: self.champion.clone(),
            pellets_remaining: self.pellets_remaining,
            power_window: self.power_window,
            fruits: self
                .fruits
                .iter()
                .map(|&(x, y)| CellPos { x, y })
                .collect(),
            players: self.roster(),
            pursuers: self.pursuers.iter().map(|p| p.view.clone()).collect(),
            clock: self.clock_view(),
        }
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            players: self.players.len(),
            active: self.active,
            champion: self.champion.clone(),
            remaining_seconds: self.clock.remaining,
        }
    }

    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .players
            .iter()
            .filter(|player| !player.view.spectator)
            .map(|player| Standing {
                player: player.view.clone(),
                stats: player.stats.clone(),
            })
            .collect();
        standings.sort_by(|a, b| b.player.score.cmp(&a.player.score));
        standings
    }

    pub fn drain_events(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(|p| p.view.clone()).collect()
    }

    fn clock_view(&self) -> ClockView {
        ClockView {
            duration: self.clock.duration,
            remaining: self.clock.remaining,
            running: self.clock.running,
        }
    }

    fn player_index(&self, member_id: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|player| player.view.id == member_id)
    }

    fn contender_indices(&self) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, player)| !player.view.spectator && player.view.lives > 0)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn contender_count(&self) -> usize {
        self.players
            .iter()
            .filter(|player| !player.view.spectator)
            .count()
    }

    /// First spawn candidate whose cell is not a wall.
    fn spawn_position(&self) -> (i32, i32) {
        let (col, row) = SPAWN_CELLS
            .iter()
            .copied()
            .find(|&(col, row)| matches!(self.grid.get(col, row), Some(cell) if cell != Cell::Wall))
            .unwrap_or(SPAWN_CELLS[0]);
        cell_origin(col, row)
    }

    fn award(&mut self, idx: usize, points: u32) {
        let view = &mut self.players[idx].view;
        view.score = view.score.saturating_add(points);
    }

    fn push_room(&mut self, event: ServerEvent) {
        self.outbox.push(Outbound {
            recipient: Recipient::Room,
            event,
        });
    }

    fn push_to(&mut self, member_id: &str, event: ServerEvent) {
        self.outbox.push(Outbound {
            recipient: Recipient::Member(member_id.to_string()),
            event,
        });
    }

    fn push_roster(&mut self) {
        let players = self.roster();
        self.push_room(ServerEvent::RosterUpdate { players });
    }

    fn push_scores(&mut self) {
        let scores = self
            .players
            .iter()
            .map(|p| ScoreEntry {
                id: p.view.id.clone(),
                score: p.view.score,
            })
            .collect();
        self.push_room(ServerEvent::ScoreUpdate {
            scores,
            pellets_remaining: self.pellets_remaining,
        });
    }
}

fn spawn_pursuers() -> Vec<PursuerInternal> {
    PURSUER_HOMES
        .iter()
        .map(|&(id, col, row, direction, color)| {
            let home = cell_origin(col, row);
            PursuerInternal {
                view: PursuerView {
                    id,
                    x: home.0,
                    y: home.1,
                    direction,
                    vulnerable: false,
                    color,
                },
                home,
            }
        })
        .collect()
}
