use std::collections::{HashSet, VecDeque};

use crate::constants::{
    CELL_SIZE, GRID_HEIGHT, GRID_WIDTH, HOME_BASE, POWER_CELLS, TUNNEL_ROW, WALL_BLOCKS,
};
use crate::types::Cell;

/// Cell matrix indexed as `cells[row][col]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
}

/// Builds the fixed maze layout. Always returns the same grid.
pub fn generate() -> Grid {
    let mut cells = vec![vec![Cell::Empty; GRID_WIDTH]; GRID_HEIGHT];

    for col in 0..GRID_WIDTH {
        cells[0][col] = Cell::Wall;
        cells[GRID_HEIGHT - 1][col] = Cell::Wall;
    }
    for row in cells.iter_mut() {
        row[0] = Cell::Wall;
        row[GRID_WIDTH - 1] = Cell::Wall;
    }

    for (row, col, height, width) in WALL_BLOCKS {
        for line in cells.iter_mut().skip(row).take(height) {
            for cell in line.iter_mut().skip(col).take(width) {
                *cell = Cell::Wall;
            }
        }
    }

    let tunnel = TUNNEL_ROW as usize;
    cells[tunnel][0] = Cell::Empty;
    cells[tunnel][GRID_WIDTH - 1] = Cell::Empty;

    for (row, col) in POWER_CELLS {
        cells[row][col] = Cell::PowerPellet;
    }

    for cell in cells.iter_mut().flatten() {
        if *cell == Cell::Empty {
            *cell = Cell::Pellet;
        }
    }

    let (row_start, row_end, col_start, col_end) = HOME_BASE;
    for line in &mut cells[row_start..=row_end] {
        for cell in &mut line[col_start..=col_end] {
            *cell = Cell::Empty;
        }
    }

    Grid { cells }
}

impl Grid {
    pub fn width(&self) -> i32 {
        GRID_WIDTH as i32
    }

    pub fn height(&self) -> i32 {
        GRID_HEIGHT as i32
    }

    pub fn in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && col < self.width() && row < self.height()
    }

    pub fn get(&self, col: i32, row: i32) -> Option<Cell> {
        if !self.in_bounds(col, row) {
            return None;
        }
        Some(self.cells[row as usize][col as usize])
    }

    /// Writes a cell; returns the previous code, or `None` when out of bounds.
    pub fn set(&mut self, col: i32, row: i32, cell: Cell) -> Option<Cell> {
        if !self.in_bounds(col, row) {
            return None;
        }
        let slot = &mut self.cells[row as usize][col as usize];
        Some(std::mem::replace(slot, cell))
    }

    pub fn count(&self, wanted: Cell) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == wanted)
            .count()
    }

    pub fn cells_of(&self, wanted: Cell) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for (row, line) in self.cells.iter().enumerate() {
            for (col, cell) in line.iter().enumerate() {
                if *cell == wanted {
                    out.push((col as i32, row as i32));
                }
            }
        }
        out
    }

    /// Collision predicate for a single pixel.
    ///
    /// Off-grid pixels on the tunnel row are open so entities can slide
    /// through the edge and wrap; any other off-grid pixel is solid.
    pub fn is_blocked_pixel(&self, px: i32, py: i32) -> bool {
        let (col, row) = pixel_to_cell(px, py);
        if row == TUNNEL_ROW && (col < 0 || col >= self.width()) {
            return false;
        }
        match self.get(col, row) {
            Some(cell) => cell == Cell::Wall,
            None => true,
        }
    }

    pub fn to_tiles(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|line| line.iter().map(|cell| cell.glyph()).collect::<String>())
            .collect()
    }

    /// Size of the open region reachable from `start`, honouring the tunnel wrap.
    pub fn reachable_from(&self, start: (i32, i32)) -> HashSet<(i32, i32)> {
        let mut seen = HashSet::new();
        if !matches!(self.get(start.0, start.1), Some(cell) if cell != Cell::Wall) {
            return seen;
        }
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);

        while let Some((col, row)) = queue.pop_front() {
            for (dc, dr) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                let mut next = (col + dc, row + dr);
                if next.1 == TUNNEL_ROW {
                    next.0 = next.0.rem_euclid(self.width());
                }
                let open = matches!(self.get(next.0, next.1), Some(cell) if cell != Cell::Wall);
                if open && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}

pub fn pixel_to_cell(px: i32, py: i32) -> (i32, i32) {
    (px.div_euclid(CELL_SIZE), py.div_euclid(CELL_SIZE))
}

#[cfg(test)]
mod tests {
    use crate::constants::{FRUIT_CELLS, SPAWN_CELLS};

    use super::*;

    #[test]
    fn generated_layout_has_expected_collectibles() {
        let grid = generate();
        assert_eq!(grid.count(Cell::Pellet), 244);
        assert_eq!(grid.count(Cell::PowerPellet), 4);
        assert_eq!(grid.count(Cell::Fruit), 0);
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(generate(), generate());
    }

    #[test]
    fn open_cells_form_one_region() {
        let grid = generate();
        let open: HashSet<(i32, i32)> = (0..grid.height())
            .flat_map(|row| (0..grid.width()).map(move |col| (col, row)))
            .filter(|&(col, row)| grid.get(col, row) != Some(Cell::Wall))
            .collect();
        let reachable = grid.reachable_from(SPAWN_CELLS[0]);
        assert_eq!(reachable, open);
    }

    #[test]
    fn tunnel_cells_are_open_and_carry_pellets() {
        let grid = generate();
        assert_eq!(grid.get(0, TUNNEL_ROW), Some(Cell::Pellet));
        assert_eq!(grid.get(grid.width() - 1, TUNNEL_ROW), Some(Cell::Pellet));
        assert_eq!(grid.get(0, TUNNEL_ROW - 1), Some(Cell::Wall));
    }

    #[test]
    fn home_base_is_cleared() {
        let grid = generate();
        let (row_start, row_end, col_start, col_end) = HOME_BASE;
        for row in row_start..=row_end {
            for col in col_start..=col_end {
                assert_eq!(grid.get(col as i32, row as i32), Some(Cell::Empty));
            }
        }
    }

    #[test]
    fn collision_predicate_exempts_only_the_tunnel_row() {
        let grid = generate();
        let tunnel_y = TUNNEL_ROW * CELL_SIZE + 5;
        assert!(!grid.is_blocked_pixel(-3, tunnel_y));
        assert!(!grid.is_blocked_pixel(grid.width() * CELL_SIZE + 7, tunnel_y));
        assert!(grid.is_blocked_pixel(-3, CELL_SIZE * 2));
        assert!(grid.is_blocked_pixel(CELL_SIZE * 5, -1));
        assert!(grid.is_blocked_pixel(5, 5));
        assert!(!grid.is_blocked_pixel(CELL_SIZE + 5, CELL_SIZE + 5));
    }

    #[test]
    fn fixed_candidates_are_open_cells() {
        let grid = generate();
        for (col, row) in FRUIT_CELLS.iter().chain(SPAWN_CELLS.iter()) {
            assert_ne!(grid.get(*col, *row), Some(Cell::Wall), "({col},{row})");
            assert!(grid.get(*col, *row).is_some());
        }
    }

    #[test]
    fn set_reports_previous_cell_and_ignores_out_of_bounds() {
        let mut grid = generate();
        assert_eq!(grid.set(1, 1, Cell::Empty), Some(Cell::Pellet));
        assert_eq!(grid.get(1, 1), Some(Cell::Empty));
        assert_eq!(grid.set(-1, 1, Cell::Empty), None);
        assert_eq!(grid.count(Cell::Pellet), 243);
    }

    #[test]
    fn tiles_render_one_string_per_row() {
        let tiles = generate().to_tiles();
        assert_eq!(tiles.len(), GRID_HEIGHT);
        assert!(tiles.iter().all(|row| row.chars().count() == GRID_WIDTH));
        assert_eq!(tiles[3].chars().nth(1), Some('o'));
    }
}
