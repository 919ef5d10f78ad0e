use rand::Rng;

use crate::constants::HALF_CELL;
use crate::grid::pixel_to_cell;
use crate::types::Direction;

/// Canonical pursuers as `(id, col, row, direction, color)`.
pub(super) const PURSUER_HOMES: [(u8, i32, i32, Direction, &str); 4] = [
    (1, 14, 11, Direction::Right, "red"),
    (2, 14, 14, Direction::Left, "pink"),
    (3, 12, 14, Direction::Up, "cyan"),
    (4, 16, 14, Direction::Down, "orange"),
];

pub(super) fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(a.0 - b.0);
    let dy = f64::from(a.1 - b.1);
    (dx * dx + dy * dy).sqrt()
}

/// Cell under the centre of an entity box anchored at `(x, y)`.
pub(super) fn centre_cell(x: i32, y: i32) -> (i32, i32) {
    pixel_to_cell(x + HALF_CELL, y + HALF_CELL)
}

pub(super) fn random_direction(rng: &mut impl Rng) -> Direction {
    match rng.random_range(0..4) {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

/// Direction from `from` toward `to` along the axis with the larger offset.
/// Equal offsets resolve horizontally.
pub(super) fn direction_toward(from: (i32, i32), to: (i32, i32)) -> Direction {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx.abs() >= dy.abs() {
        if dx > 0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if dy > 0 {
        Direction::Down
    } else {
        Direction::Up
    }
}
