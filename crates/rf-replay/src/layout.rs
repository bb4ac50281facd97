//! Metrics/Layout resolution
//!
//! Pure mapping from board shape and container size to cell geometry.

use serde::{Deserialize, Serialize};

use rf_outcome::{BoardShape, CellCoordinate};

/// Available drawing area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for ContainerSize {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Layout limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Smallest allowed cell (px)
    pub min_cell_size: f64,
    /// Largest allowed cell (px)
    pub max_cell_size: f64,
    /// Space between cells (px)
    pub gap: f64,
    /// Space around the board (px)
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_cell_size: 32.0,
            max_cell_size: 128.0,
            gap: 6.0,
            padding: 12.0,
        }
    }
}

/// Resolved board geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub cell_size: f64,
    pub gap: f64,
    /// Left edge of column 0 inside the canvas
    pub offset_x: f64,
    /// Top edge of row 0 inside the canvas
    pub offset_y: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Metrics {
    /// Distance between the origins of adjacent cells
    pub fn pitch(&self) -> f64 {
        self.cell_size + self.gap
    }

    /// Top-left corner of a cell
    pub fn cell_origin(&self, coord: CellCoordinate) -> (f64, f64) {
        (
            self.offset_x + coord.col as f64 * self.pitch(),
            self.offset_y + coord.row as f64 * self.pitch(),
        )
    }

    /// Centre of a cell
    pub fn cell_center(&self, coord: CellCoordinate) -> (f64, f64) {
        let (x, y) = self.cell_origin(coord);
        let half = self.cell_size / 2.0;
        (x + half, y + half)
    }

    /// Y of a row's top edge. Negative rows sit above the board and are
    /// where dropping visuals spawn.
    pub fn row_y(&self, row: isize) -> f64 {
        self.offset_y + row as f64 * self.pitch()
    }
}

/// Resolve metrics so the whole board fits the container.
///
/// The cell size is the smaller of the width- and height-constrained sizes,
/// clamped to `[min_cell_size, max_cell_size]`. When the minimum forces the
/// board past the container, the canvas grows instead of cropping.
pub fn resolve_metrics(shape: BoardShape, container: ContainerSize, config: &LayoutConfig) -> Metrics {
    let min_cell = config.min_cell_size.max(1.0);
    let max_cell = config.max_cell_size.max(min_cell);
    let gap = config.gap.max(0.0);
    let padding = config.padding.max(0.0);

    let fit = |extent: f64, count: usize| -> f64 {
        if count == 0 {
            return f64::INFINITY;
        }
        let gaps = gap * (count - 1) as f64;
        (extent - 2.0 * padding - gaps) / count as f64
    };

    let width_constrained = fit(container.width, shape.cols);
    let height_constrained = fit(container.height, shape.rows);
    let raw = width_constrained.min(height_constrained);
    let cell_size = if raw.is_finite() { raw.clamp(min_cell, max_cell) } else { max_cell };

    let board_width = board_extent(cell_size, gap, shape.cols);
    let board_height = board_extent(cell_size, gap, shape.rows);

    let canvas_width = container.width.max(board_width + 2.0 * padding);
    let canvas_height = container.height.max(board_height + 2.0 * padding);

    Metrics {
        cell_size,
        gap,
        offset_x: (canvas_width - board_width) / 2.0,
        offset_y: (canvas_height - board_height) / 2.0,
        canvas_width,
        canvas_height,
    }
}

fn board_extent(cell_size: f64, gap: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    cell_size * count as f64 + gap * (count - 1) as f64
}
