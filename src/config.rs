use serde::Serialize;
use tracing::warn;

use crate::constants::{
    DEFAULT_MATCH_SECONDS, DEFAULT_ROOM_ID, ELIMINATION_BONUS, ELIMINATION_POWER_MS,
    FRUIT_INTERVAL_MS, INITIAL_LIVES, MAX_TICK_RATE, PELLET_SCORE, PLAYER_BOOSTED_SPEED,
    PLAYER_SPEED, POWER_SCORE, POWER_WINDOW_MS, PURSUER_SCORE, PURSUER_SPEED,
    PURSUER_VULNERABLE_SPEED, RETARGET_PROBABILITY, SPEED_BOOST_MS, TICK_RATE,
};

/// Per-room tuning. Every room created by a registry shares one copy.
#[derive(Clone, Debug, Serialize)]
pub struct GameRules {
    #[serde(rename = "pelletScore")]
    pub pellet_score: u32,
    #[serde(rename = "powerScore")]
    pub power_score: u32,
    #[serde(rename = "pursuerScore")]
    pub pursuer_score: u32,
    #[serde(rename = "eliminationBonus")]
    pub elimination_bonus: u32,
    #[serde(rename = "playerSpeed")]
    pub player_speed: i32,
    #[serde(rename = "boostedSpeed")]
    pub boosted_speed: i32,
    #[serde(rename = "pursuerSpeed")]
    pub pursuer_speed: i32,
    #[serde(rename = "vulnerableSpeed")]
    pub vulnerable_speed: i32,
    #[serde(rename = "powerWindowMs")]
    pub power_window_ms: u64,
    #[serde(rename = "eliminationPowerMs")]
    pub elimination_power_ms: u64,
    #[serde(rename = "speedBoostMs")]
    pub speed_boost_ms: u64,
    #[serde(rename = "fruitIntervalMs")]
    pub fruit_interval_ms: u64,
    #[serde(rename = "initialLives")]
    pub initial_lives: u32,
    #[serde(rename = "matchSeconds")]
    pub match_seconds: u32,
    #[serde(rename = "retargetProbability")]
    pub retarget_probability: f64,
    #[serde(skip)]
    pub seed: Option<u64>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            pellet_score: PELLET_SCORE,
            power_score: POWER_SCORE,
            pursuer_score: PURSUER_SCORE,
            elimination_bonus: ELIMINATION_BONUS,
            player_speed: PLAYER_SPEED,
            boosted_speed: PLAYER_BOOSTED_SPEED,
            pursuer_speed: PURSUER_SPEED,
            vulnerable_speed: PURSUER_VULNERABLE_SPEED,
            power_window_ms: POWER_WINDOW_MS,
            elimination_power_ms: ELIMINATION_POWER_MS,
            speed_boost_ms: SPEED_BOOST_MS,
            fruit_interval_ms: FRUIT_INTERVAL_MS,
            initial_lives: INITIAL_LIVES,
            match_seconds: DEFAULT_MATCH_SECONDS,
            retarget_probability: RETARGET_PROBABILITY,
            seed: None,
        }
    }
}

impl GameRules {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct HostCredentials {
    pub login: String,
    pub password: String,
}

impl HostCredentials {
    pub fn matches(&self, login: &str, password: &str) -> bool {
        self.login == login && self.password == password
    }
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub default_room: String,
    pub tick_rate: u32,
    pub host: Option<HostCredentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            default_room: DEFAULT_ROOM_ID.to_string(),
            tick_rate: TICK_RATE,
            host: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            None => defaults.port,
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!("ignoring invalid PORT {:?}", raw);
                defaults.port
            }),
        };

        let tick_rate = match lookup("TICK_RATE") {
            None => defaults.tick_rate,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(rate) => rate.clamp(1, MAX_TICK_RATE),
                Err(_) => {
                    warn!("ignoring invalid TICK_RATE {:?}", raw);
                    defaults.tick_rate
                }
            },
        };

        let default_room = lookup("DEFAULT_ROOM")
            .map(|raw| raw.trim().to_string())
            .filter(|room| !room.is_empty())
            .unwrap_or(defaults.default_room);

        let host = match lookup("HOST_PASSWORD").filter(|password| !password.is_empty()) {
            Some(password) => Some(HostCredentials {
                login: lookup("HOST_LOGIN").unwrap_or_else(|| "admin".to_string()),
                password,
            }),
            None => {
                warn!("HOST_PASSWORD is not set; host login is disabled");
                None
            }
        };

        Self {
            port,
            default_room,
            tick_rate,
            host,
        }
    }
}
