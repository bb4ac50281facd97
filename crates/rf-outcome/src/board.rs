//! Board shape, cell coordinates and symbol grids

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Row-major symbol matrix (outer index = row)
pub type SymbolGrid = Vec<Vec<Symbol>>;

/// Board dimensions (rows × cols)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardShape {
    /// Visible rows
    pub rows: usize,
    /// Columns (reels)
    pub cols: usize,
}

impl BoardShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Standard 3 rows × 5 columns
    pub fn standard_3x5() -> Self {
        Self::new(3, 5)
    }

    /// 5 rows × 6 columns tumble board
    pub fn tumble_5x6() -> Self {
        Self::new(5, 6)
    }

    /// Total grid positions
    pub fn total_cells(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.total_cells() == 0
    }

    /// Is the coordinate inside this board?
    pub fn contains(&self, coord: CellCoordinate) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    /// All coordinates in row-major order
    pub fn coordinates(&self) -> impl Iterator<Item = CellCoordinate> + '_ {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| CellCoordinate::new(row, col)))
    }

    /// A grid of blank symbols with this shape
    pub fn blank_grid(&self) -> SymbolGrid {
        vec![vec![Symbol::blank(); self.cols]; self.rows]
    }

    /// Does the grid have exactly this shape?
    pub fn matches(&self, grid: &SymbolGrid) -> bool {
        grid.len() == self.rows && grid.iter().all(|row| row.len() == self.cols)
    }
}

impl Default for BoardShape {
    fn default() -> Self {
        Self::standard_3x5()
    }
}

/// Cell position, 0-indexed. Ordering is row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "WireCoordinate")]
pub struct CellCoordinate {
    pub row: usize,
    pub col: usize,
}

/// Coordinate as sent by the server. Negative indices decode to a position
/// outside every board, which normalization then drops.
#[derive(Deserialize)]
struct WireCoordinate {
    row: i64,
    col: i64,
}

impl From<WireCoordinate> for CellCoordinate {
    fn from(wire: WireCoordinate) -> Self {
        let index = |raw: i64| usize::try_from(raw).unwrap_or(usize::MAX);
        Self::new(index(wire.row), index(wire.col))
    }
}

impl CellCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for CellCoordinate {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

/// Symbol at a coordinate, if present
pub fn symbol_at(grid: &SymbolGrid, coord: CellCoordinate) -> Option<&Symbol> {
    grid.get(coord.row).and_then(|row| row.get(coord.col))
}

/// Symbols of one column, top to bottom
pub fn column_symbols(grid: &SymbolGrid, col: usize) -> Vec<Symbol> {
    grid.iter().filter_map(|row| row.get(col).cloned()).collect()
}

/// Build a grid from string rows (fixtures and tooling)
pub fn grid_from_rows(rows: &[&[&str]]) -> SymbolGrid {
    rows.iter()
        .map(|row| row.iter().map(|s| Symbol::new(*s)).collect())
        .collect()
}
