use crate::constants::{CELL_SIZE, COLLISION_INSET, TUNNEL_ROW};
use crate::grid::Grid;
use crate::types::Direction;

/// The four sampled corners of an entity box anchored at `(x, y)`, pulled in
/// by the inset so diagonal wall corners do not snag corridor travel.
pub fn inset_corners(x: i32, y: i32) -> [(i32, i32); 4] {
    let near = COLLISION_INSET;
    let far = CELL_SIZE - COLLISION_INSET;
    [
        (x + near, y + near),
        (x + far, y + near),
        (x + near, y + far),
        (x + far, y + far),
    ]
}

pub fn collides(grid: &Grid, x: i32, y: i32) -> bool {
    inset_corners(x, y)
        .iter()
        .any(|&(px, py)| grid.is_blocked_pixel(px, py))
}

/// Moves an entity `speed` pixels along `direction`.
///
/// Returns `None` when any inset corner of the tentative box lands on a wall;
/// the caller keeps its previous position. Accepted moves past either tunnel
/// mouth re-enter from the opposite side on the tunnel row.
pub fn resolve_move(
    grid: &Grid,
    x: i32,
    y: i32,
    direction: Direction,
    speed: i32,
) -> Option<(i32, i32)> {
    let (dx, dy) = direction.delta();
    let nx = x + dx * speed;
    let ny = y + dy * speed;
    if collides(grid, nx, ny) {
        return None;
    }

    let right_edge = grid.width() * CELL_SIZE;
    if nx < -CELL_SIZE {
        return Some((right_edge - CELL_SIZE, TUNNEL_ROW * CELL_SIZE));
    }
    if nx > right_edge {
        return Some((-CELL_SIZE, TUNNEL_ROW * CELL_SIZE));
    }
    Some((nx, ny))
}

/// A move counts only if it shifted the entity by more than a pixel.
pub fn is_effective(from: (i32, i32), to: (i32, i32)) -> bool {
    (from.0 - to.0).abs() > 1 || (from.1 - to.1).abs() > 1
}
