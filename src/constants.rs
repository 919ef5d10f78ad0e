pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;
pub const MAX_TICK_RATE: u32 = 60;

pub const GRID_HEIGHT: usize = 31;
pub const GRID_WIDTH: usize = 28;
pub const CELL_SIZE: i32 = 20;
pub const HALF_CELL: i32 = CELL_SIZE / 2;
pub const COLLISION_INSET: i32 = 5;
pub const TUNNEL_ROW: i32 = 15;

pub const PELLET_SCORE: u32 = 10;
pub const POWER_SCORE: u32 = 50;
pub const PURSUER_SCORE: u32 = 200;
pub const ELIMINATION_BONUS: u32 = PURSUER_SCORE * 2;

pub const PLAYER_SPEED: i32 = 5;
pub const PLAYER_BOOSTED_SPEED: i32 = 10;
pub const PURSUER_SPEED: i32 = 3;
pub const PURSUER_VULNERABLE_SPEED: i32 = 2;

pub const POWER_WINDOW_MS: u64 = 8_000;
pub const ELIMINATION_POWER_MS: u64 = 10_000;
pub const SPEED_BOOST_MS: u64 = 5_000;
pub const FRUIT_INTERVAL_MS: u64 = 30_000;
pub const CLOCK_PERIOD_MS: u64 = 1_000;

pub const INITIAL_LIVES: u32 = 3;
pub const DEFAULT_MATCH_SECONDS: u32 = 180;
pub const MAX_MATCH_SECONDS: u32 = 3_600;
pub const RETARGET_PROBABILITY: f64 = 0.1;

/// Player/player contact distance while elimination-power is active.
pub const PLAYER_CONTACT_DISTANCE: f64 = CELL_SIZE as f64;
/// Pursuer/player contact distance.
pub const PURSUER_CONTACT_DISTANCE: f64 = 15.0;

pub const MAX_NAME_CHARS: usize = 15;
pub const DEFAULT_ROOM_ID: &str = "default";

/// Interior wall blocks as `(row, col, height, width)` in cells.
pub const WALL_BLOCKS: [(usize, usize, usize, usize); 33] = [
    (1, 13, 4, 2),
    (2, 2, 3, 4),
    (2, 7, 3, 5),
    (2, 16, 3, 5),
    (2, 22, 3, 4),
    (6, 2, 2, 4),
    (6, 7, 15, 2),
    (6, 10, 2, 8),
    (6, 19, 15, 2),
    (6, 22, 2, 4),
    (8, 13, 15, 2),
    (9, 1, 6, 5),
    (9, 9, 12, 4),
    (9, 15, 12, 4),
    (9, 22, 6, 5),
    (16, 1, 5, 5),
    (16, 22, 5, 5),
    (22, 2, 1, 4),
    (22, 7, 1, 5),
    (22, 16, 1, 5),
    (22, 22, 1, 4),
    (23, 3, 3, 3),
    (23, 22, 3, 3),
    (24, 1, 2, 2),
    (24, 7, 5, 2),
    (24, 10, 2, 8),
    (24, 19, 5, 2),
    (24, 25, 2, 2),
    (26, 13, 3, 2),
    (27, 2, 2, 5),
    (27, 9, 2, 3),
    (27, 16, 2, 3),
    (27, 21, 2, 5),
];

/// Pursuers' home base, inclusive `(row_start, row_end, col_start, col_end)`.
pub const HOME_BASE: (usize, usize, usize, usize) = (11, 19, 7, 20);

/// Power cells as `(row, col)`.
pub const POWER_CELLS: [(usize, usize); 4] = [(3, 1), (3, 26), (23, 1), (23, 26)];

/// Bonus fruit candidates as `(col, row)`.
pub const FRUIT_CELLS: [(i32, i32); 12] = [
    (3, 1),
    (24, 1),
    (3, 26),
    (24, 26),
    (1, 5),
    (26, 5),
    (1, 22),
    (26, 22),
    (8, 17),
    (19, 17),
    (9, 8),
    (18, 8),
];

/// Player spawn candidates in priority order, as `(col, row)`.
pub const SPAWN_CELLS: [(i32, i32); 4] = [(14, 23), (12, 26), (10, 23), (18, 23)];

pub fn cell_origin(col: i32, row: i32) -> (i32, i32) {
    (col * CELL_SIZE, row * CELL_SIZE)
}

pub fn tick_ms_for_rate(tick_rate: u32) -> u64 {
    1000 / u64::from(tick_rate.clamp(1, MAX_TICK_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_matches_rate() {
        assert_eq!(TICK_MS, 50);
        assert_eq!(tick_ms_for_rate(20), 50);
        assert_eq!(tick_ms_for_rate(0), 1000);
        assert_eq!(tick_ms_for_rate(500), 1000 / 60);
    }

    #[test]
    fn wall_blocks_fit_inside_the_perimeter() {
        for (row, col, height, width) in WALL_BLOCKS {
            assert!(row >= 1 && row + height < GRID_HEIGHT, "row block {row}");
            assert!(col >= 1 && col + width < GRID_WIDTH, "col block {col}");
        }
    }
}
