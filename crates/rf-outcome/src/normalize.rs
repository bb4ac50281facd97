//! Normalization of malformed outcome data
//!
//! Server data that disagrees with the configured board is a data-integrity
//! fault, never a crash. Grids are padded or truncated to the board shape,
//! out-of-range coordinates are dropped and numeric fields are clamped.

use serde::Serialize;

use crate::board::{BoardShape, CellCoordinate, SymbolGrid};
use crate::outcome::{CascadeStep, Outcome};
use crate::symbol::Symbol;
use crate::{MAX_TRIGGER_COUNT, OutcomeError, OutcomeResult};

/// Counts of every fault corrected by [`Outcome::normalize`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// Grids whose dimensions did not match the board
    pub grids_reshaped: usize,
    /// Cells added while padding grids
    pub cells_padded: usize,
    /// Remove/trigger coordinates outside the board
    pub coordinates_dropped: usize,
    /// Drop-in columns beyond the board width
    pub drop_in_columns_dropped: usize,
    /// Trigger counts outside 1..=3
    pub trigger_counts_clamped: usize,
    /// Negative or non-finite step wins
    pub wins_clamped: usize,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Total number of corrections
    pub fn total_faults(&self) -> usize {
        self.grids_reshaped
            + self.coordinates_dropped
            + self.drop_in_columns_dropped
            + self.trigger_counts_clamped
            + self.wins_clamped
    }
}

impl Outcome {
    /// Decode from JSON and normalize against `shape`
    pub fn from_json_normalized(json: &str, shape: BoardShape) -> OutcomeResult<(Self, NormalizationReport)> {
        if shape.is_empty() {
            return Err(OutcomeError::EmptyBoard {
                rows: shape.rows,
                cols: shape.cols,
            });
        }
        let mut outcome = Self::from_json(json)?;
        let report = outcome.normalize(shape);
        Ok((outcome, report))
    }

    /// Bring the outcome in line with `shape`, returning what was corrected.
    ///
    /// Padding cells of `initial_grid` are blank. Padding cells of a step's
    /// `grid_after` copy the symbol the board held before that step.
    pub fn normalize(&mut self, shape: BoardShape) -> NormalizationReport {
        let mut report = NormalizationReport::default();

        reshape_grid(&mut self.initial_grid, shape, &mut report, |_| Symbol::blank());
        let mut previous = self.initial_grid.clone();

        for step in &mut self.steps {
            match step {
                CascadeStep::Match(m) => {
                    reshape_grid(&mut m.grid_after, shape, &mut report, |coord| {
                        previous[coord.row][coord.col].clone()
                    });

                    let before = m.remove_cells.len();
                    m.remove_cells.retain(|coord| shape.contains(*coord));
                    report.coordinates_dropped += before - m.remove_cells.len();

                    if m.drop_in.len() > shape.cols {
                        report.drop_in_columns_dropped += m.drop_in.len() - shape.cols;
                        m.drop_in.truncate(shape.cols);
                    }

                    if !m.win_for_step.is_finite() || m.win_for_step < 0.0 {
                        report.wins_clamped += 1;
                        m.win_for_step = 0.0;
                    }

                    previous = m.grid_after.clone();
                }
                CascadeStep::Bonus(b) => {
                    let clamped = b.trigger_count.clamp(1, MAX_TRIGGER_COUNT);
                    if clamped != b.trigger_count {
                        report.trigger_counts_clamped += 1;
                        b.trigger_count = clamped;
                    }

                    if let Some(cells) = b.trigger_cells.as_mut() {
                        let before = cells.len();
                        cells.retain(|coord| shape.contains(*coord));
                        report.coordinates_dropped += before - cells.len();
                    }
                }
            }
        }

        if !report.is_clean() {
            log::debug!(
                "[Outcome] Normalized {} against {}x{}: {:?}",
                self.id,
                shape.rows,
                shape.cols,
                report
            );
        }

        report
    }
}

/// Pad/truncate `grid` to `shape`, filling new cells with `fill(coord)`
fn reshape_grid<F>(grid: &mut SymbolGrid, shape: BoardShape, report: &mut NormalizationReport, fill: F)
where
    F: Fn(CellCoordinate) -> Symbol,
{
    if shape.matches(grid) {
        return;
    }
    report.grids_reshaped += 1;

    grid.truncate(shape.rows);
    for row in 0..shape.rows {
        if row == grid.len() {
            grid.push(Vec::with_capacity(shape.cols));
        }
        let cells = &mut grid[row];
        cells.truncate(shape.cols);
        while cells.len() < shape.cols {
            let col = cells.len();
            cells.push(fill(CellCoordinate::new(row, col)));
            report.cells_padded += 1;
        }
    }
}
