use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use maze_chase_server::config::GameRules;
use maze_chase_server::constants::{CELL_SIZE, GRID_HEIGHT, GRID_WIDTH, TICK_MS};
use maze_chase_server::room::{Room, Standing};
use maze_chase_server::types::{Direction, EndReason, JoinMode, ServerEvent, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of random bot players.
    #[arg(long, default_value_t = 4)]
    bots: usize,
    /// Tick budget; the run stops early once the match ends.
    #[arg(long, default_value_t = 20 * 60 * 5)]
    ticks: u64,
    /// Match clock in seconds.
    #[arg(long)]
    seconds: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    /// Chance per tick that a bot picks a new direction.
    #[arg(long, default_value_t = 0.05)]
    turn_chance: f64,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Outcome {
    champion: Option<String>,
    score: Option<u32>,
    reason: EndReason,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    seed: u64,
    bots: usize,
    ticks: u64,
    #[serde(rename = "elapsedMs")]
    elapsed_ms: u64,
    outcome: Option<Outcome>,
    #[serde(rename = "pelletsRemaining")]
    pellets_remaining: usize,
    #[serde(rename = "eventCounts")]
    event_counts: BTreeMap<String, usize>,
    standings: Vec<Standing>,
    anomalies: Vec<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    info!("simulating {} bots for up to {} ticks (seed {})", cli.bots, cli.ticks, seed);

    let summary = run(&cli, seed);
    for anomaly in &summary.anomalies {
        warn!("anomaly: {}", anomaly);
    }

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("failed to serialize summary: {err}");
            std::process::exit(2);
        }
    }

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            eprintln!("failed to write {}: {err}", path.to_string_lossy());
            std::process::exit(2);
        }
    }

    if !summary.anomalies.is_empty() {
        std::process::exit(1);
    }
}

fn run(cli: &Cli, seed: u64) -> RunSummary {
    let mut rules = GameRules::seeded(seed);
    if let Some(seconds) = cli.seconds {
        rules.match_seconds = seconds;
    }
    let mut room = Room::new("simulation", rules);
    let mut bot_rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    let bot_ids: Vec<String> = (1..=cli.bots).map(|idx| format!("bot_{idx}")).collect();
    for (idx, id) in bot_ids.iter().enumerate() {
        if let Err(err) = room.join(id, &format!("Bot-{:02}", idx + 1), JoinMode::Player) {
            warn!("bot {} could not join: {}", id, err);
        }
    }
    room.restart();
    room.start_clock();

    let mut event_counts = BTreeMap::new();
    let mut anomalies = Vec::new();
    let mut outcome = None;
    let mut last_pellets = room.pellets_remaining();
    let mut ticks = 0;

    while ticks < cli.ticks {
        for id in &bot_ids {
            if bot_rng.random_bool(cli.turn_chance.clamp(0.0, 1.0)) {
                let direction = Direction::MOVING[bot_rng.random_range(0..Direction::MOVING.len())];
                room.set_direction(id, direction);
            }
        }

        room.tick(TICK_MS);
        ticks += 1;

        for outbound in room.drain_events() {
            *event_counts.entry(event_type(&outbound.event)).or_insert(0) += 1;
            match outbound.event {
                ServerEvent::MatchWon {
                    champion,
                    score,
                    reason,
                } => {
                    outcome = Some(Outcome {
                        champion: Some(champion),
                        score: Some(score),
                        reason,
                    })
                }
                ServerEvent::MatchEndedNoChampion { reason } => {
                    outcome = Some(Outcome {
                        champion: None,
                        score: None,
                        reason,
                    })
                }
                _ => {}
            }
        }

        let snapshot = room.snapshot();
        for anomaly in collect_snapshot_anomalies(&snapshot, last_pellets) {
            anomalies.push(format!("tick {ticks}: {anomaly}"));
        }
        last_pellets = snapshot.pellets_remaining;

        if outcome.is_some() {
            break;
        }
    }

    RunSummary {
        seed,
        bots: cli.bots,
        ticks,
        elapsed_ms: room.now_ms(),
        outcome,
        pellets_remaining: room.pellets_remaining(),
        event_counts,
        standings: room.standings(),
        anomalies,
    }
}

fn event_type(event: &ServerEvent) -> String {
    serde_json::to_value(event)
        .ok()
        .and_then(|value| value.get("type")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, last_pellets: usize) -> Vec<String> {
    let mut anomalies = Vec::new();
    if snapshot.pellets_remaining > last_pellets {
        anomalies.push(format!(
            "pellet count grew: {} -> {}",
            last_pellets, snapshot.pellets_remaining
        ));
    }

    let max_x = GRID_WIDTH as i32 * CELL_SIZE;
    let max_y = GRID_HEIGHT as i32 * CELL_SIZE;
    for player in &snapshot.players {
        if player.x < -CELL_SIZE || player.x > max_x || player.y < 0 || player.y > max_y {
            anomalies.push(format!(
                "player out of bounds: {} ({}, {})",
                player.id, player.x, player.y
            ));
        }
        if !player.spectator && player.lives == 0 {
            anomalies.push(format!("defeated player left in roster: {}", player.id));
        }
    }

    for pursuer in &snapshot.pursuers {
        if pursuer.x < -CELL_SIZE || pursuer.x > max_x || pursuer.y < 0 || pursuer.y > max_y {
            anomalies.push(format!(
                "pursuer out of bounds: {} ({}, {})",
                pursuer.id, pursuer.x, pursuer.y
            ));
        }
    }
    anomalies
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(bots: usize, ticks: u64) -> Cli {
        Cli {
            bots,
            ticks,
            seconds: Some(5),
            seed: Some(7),
            turn_chance: 0.2,
            summary_out: None,
        }
    }

    #[test]
    fn clock_ends_a_short_match() {
        let summary = run(&cli(3, 20 * 10), 7);
        let outcome = summary.outcome.expect("match should end within the budget");
        assert!(matches!(
            outcome.reason,
            EndReason::TimeUp | EndReason::LastSurvivor | EndReason::AllEliminated
        ));
        assert!(summary.ticks <= 20 * 10);
        assert!(summary.anomalies.is_empty(), "{:?}", summary.anomalies);
        assert_eq!(summary.event_counts.get("match-started"), Some(&1));
    }

    #[test]
    fn same_seed_gives_same_run() {
        let first = run(&cli(2, 200), 11);
        let second = run(&cli(2, 200), 11);
        assert_eq!(first.ticks, second.ticks);
        assert_eq!(first.pellets_remaining, second.pellets_remaining);
        assert_eq!(first.event_counts, second.event_counts);
    }

    #[test]
    fn empty_room_is_abandoned_on_first_tick() {
        let summary = run(&cli(0, 100), 3);
        let outcome = summary.outcome.expect("abandoned");
        assert_eq!(outcome.reason, EndReason::Abandoned);
        assert_eq!(summary.ticks, 1);
    }

    #[test]
    fn pellet_growth_is_flagged() {
        let mut room = Room::new("t", GameRules::seeded(1));
        let snapshot = room.snapshot();
        let anomalies = collect_snapshot_anomalies(&snapshot, 0);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("pellet count grew"));
        room.shutdown();
    }

    #[test]
    fn event_type_uses_wire_tag() {
        assert_eq!(event_type(&ServerEvent::PowerWindowEnded), "power-window-ended");
    }
}
