use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const MOVING: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Unit step along the movement axis, in pixels.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::None => (0, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Wall,
    Empty,
    Pellet,
    PowerPellet,
    Fruit,
}

impl Cell {
    pub fn glyph(self) -> char {
        match self {
            Self::Wall => '#',
            Self::Empty => ' ',
            Self::Pellet => '.',
            Self::PowerPellet => 'o',
            Self::Fruit => '%',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    EliminationPower,
    SpeedBoost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    PelletsCleared,
    LastSurvivor,
    AllEliminated,
    TimeUp,
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinMode {
    Player,
    Spectator,
}

impl JoinMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "player" => Some(Self::Player),
            "spectator" => Some(Self::Spectator),
            _ => None,
        }
    }

    pub fn is_spectator(self) -> bool {
        self == Self::Spectator
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub lives: u32,
    pub score: u32,
    pub spectator: bool,
    #[serde(rename = "eliminationPower")]
    pub elimination_power: bool,
    #[serde(rename = "eliminationPowerMs")]
    pub elimination_power_ms: u64,
    #[serde(rename = "speedBoost")]
    pub speed_boost: bool,
    #[serde(rename = "speedBoostMs")]
    pub speed_boost_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PursuerView {
    pub id: u8,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub vulnerable: bool,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub id: String,
    pub score: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClockView {
    pub duration: u32,
    pub remaining: u32,
    pub running: bool,
}

/// Per-tick state broadcast; the grid travels separately as deltas.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub active: bool,
    #[serde(rename = "pelletsRemaining")]
    pub pellets_remaining: usize,
    pub players: Vec<PlayerView>,
    pub pursuers: Vec<PursuerView>,
    pub clock: ClockView,
}

/// Everything a client needs to render a room from scratch.
#[derive(Clone, Debug, Serialize)]
pub struct RoomState {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub width: usize,
    pub height: usize,
    #[serde(rename = "cellSize")]
    pub cell_size: i32,
    pub tiles: Vec<String>,
    pub active: bool,
    pub champion: Option<String>,
    #[serde(rename = "pelletsRemaining")]
    pub pellets_remaining: usize,
    #[serde(rename = "powerWindow")]
    pub power_window: bool,
    pub fruits: Vec<CellPos>,
    pub players: Vec<PlayerView>,
    pub pursuers: Vec<PursuerView>,
    pub clock: ClockView,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    RoomState {
        #[serde(rename = "meId")]
        me_id: Option<String>,
        spectator: bool,
        state: RoomState,
    },
    StateSnapshot {
        snapshot: Snapshot,
    },
    MapDelta {
        x: i32,
        y: i32,
        cell: Cell,
    },
    ScoreUpdate {
        scores: Vec<ScoreEntry>,
        #[serde(rename = "pelletsRemaining")]
        pellets_remaining: usize,
    },
    RosterUpdate {
        players: Vec<PlayerView>,
    },
    AbilityActivated {
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "playerName")]
        player_name: String,
        ability: Ability,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    AbilityDeactivated {
        #[serde(rename = "playerId")]
        player_id: String,
        ability: Ability,
    },
    PowerWindowStarted {
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    PowerWindowEnded,
    FruitSpawned {
        x: i32,
        y: i32,
    },
    FruitEaten {
        x: i32,
        y: i32,
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "playerName")]
        player_name: String,
    },
    PlayerMoved {
        id: String,
        x: i32,
        y: i32,
        direction: Direction,
    },
    PursuerEaten {
        #[serde(rename = "pursuerId")]
        pursuer_id: u8,
        #[serde(rename = "playerId")]
        player_id: String,
    },
    PlayerHit {
        #[serde(rename = "playerId")]
        player_id: String,
        lives: u32,
        x: i32,
        y: i32,
    },
    PlayerEliminated {
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "playerName")]
        player_name: String,
        #[serde(rename = "eliminatedBy")]
        eliminated_by: Option<String>,
    },
    MatchStarted {
        state: RoomState,
    },
    PlayerStatus {
        lives: u32,
        score: u32,
    },
    MatchWon {
        champion: String,
        score: u32,
        reason: EndReason,
    },
    MatchEndedNoChampion {
        reason: EndReason,
    },
    ClockTick {
        remaining: u32,
        total: u32,
    },
    ClockSet {
        duration: u32,
        remaining: u32,
    },
    HostAuth {
        granted: bool,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Terminal events close a match; nothing but timers and lobby traffic
    /// follows them until the next restart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MatchWon { .. } | Self::MatchEndedNoChampion { .. })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RoomInfo {
    pub id: String,
    pub players: usize,
    pub active: bool,
    pub champion: Option<String>,
    #[serde(rename = "remainingSeconds")]
    pub remaining_seconds: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub rooms: usize,
    pub players: usize,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_move_accepts_known_directions_only() {
        assert_eq!(Direction::parse_move("up"), Some(Direction::Up));
        assert_eq!(Direction::parse_move(" LEFT "), Some(Direction::Left));
        assert_eq!(Direction::parse_move("none"), Some(Direction::None));
        assert_eq!(Direction::parse_move("sideways"), None);
    }

    #[test]
    fn events_serialize_with_kebab_tags_and_camel_fields() {
        let value = serde_json::to_value(ServerEvent::AbilityActivated {
            player_id: "p1".to_string(),
            player_name: "Ana".to_string(),
            ability: Ability::SpeedBoost,
            duration_ms: 5_000,
        })
        .expect("serializable");
        assert_eq!(
            value,
            json!({
                "type": "ability-activated",
                "playerId": "p1",
                "playerName": "Ana",
                "ability": "speed_boost",
                "durationMs": 5000,
            })
        );

        let ended = serde_json::to_value(ServerEvent::MatchEndedNoChampion {
            reason: EndReason::AllEliminated,
        })
        .expect("serializable");
        assert_eq!(ended["type"], "match-ended-no-champion");
        assert_eq!(ended["reason"], "all_eliminated");
    }

    #[test]
    fn only_match_endings_are_terminal() {
        assert!(ServerEvent::MatchWon {
            champion: "A".into(),
            score: 1,
            reason: EndReason::TimeUp,
        }
        .is_terminal());
        assert!(!ServerEvent::PowerWindowEnded.is_terminal());
    }
}
