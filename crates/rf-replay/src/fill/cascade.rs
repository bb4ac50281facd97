//! Cascade fill: survivors fall, new symbols drop in from above
//!
//! The grid and the handle map are updated as soon as the refill starts;
//! only the visuals travel later, one column every `column_stagger_ms`.

use std::collections::{BTreeMap, BTreeSet};

use rf_outcome::{CellCoordinate, Symbol, SymbolGrid};

use super::{FillContext, FillMode, FillStrategy, FillTask, target_symbol};
use crate::render::{Easing, Tween, VisualHandle};
use crate::timing::Millis;

/// One visual travelling within a column. Rows above the board are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DropMove {
    handle: VisualHandle,
    from_row: isize,
    to_row: usize,
}

#[derive(Debug, Default)]
pub struct CascadeFill {
    pending: BTreeMap<usize, Vec<DropMove>>,
}

impl CascadeFill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns whose drop has not started yet
    pub fn pending_columns(&self) -> Vec<usize> {
        self.pending.keys().copied().collect()
    }

    fn schedule_columns(&mut self, ctx: &mut FillContext<'_>, columns: BTreeMap<usize, Vec<DropMove>>) {
        let stagger = ctx.timing.column_stagger_ms;
        for (column, moves) in columns {
            // Park visuals at their start position until the column drops
            for m in &moves {
                let y = ctx.metrics.row_y(m.from_row);
                ctx.renderer.animate(m.handle, &[Tween::y(y, y)], 0, Easing::Linear);
            }
            self.pending.insert(column, moves);
            ctx.defer(column as Millis * stagger, FillTask::DropColumn { column });
        }
    }

    fn drop_column(&mut self, ctx: &mut FillContext<'_>, column: usize) {
        let Some(moves) = self.pending.remove(&column) else {
            return;
        };
        for m in moves {
            let from = ctx.metrics.row_y(m.from_row);
            let to = ctx.metrics.row_y(m.to_row as isize);
            ctx.renderer.animate(
                m.handle,
                &[Tween::y(from, to), Tween::alpha(1.0, 1.0)],
                ctx.timing.drop_ms,
                Easing::EaseOutBounce,
            );
        }
    }
}

impl FillStrategy for CascadeFill {
    fn mode(&self) -> FillMode {
        FillMode::Cascade
    }

    fn intro(&mut self, ctx: &mut FillContext<'_>) -> Millis {
        let shape = ctx.grid.shape();
        let rows = shape.rows as isize;
        let mut columns: BTreeMap<usize, Vec<DropMove>> = BTreeMap::new();
        for (&coord, &handle) in ctx.grid.handles() {
            columns.entry(coord.col).or_default().push(DropMove {
                handle,
                from_row: coord.row as isize - rows,
                to_row: coord.row,
            });
        }
        self.schedule_columns(ctx, columns);
        ctx.timing.cascade_duration(shape.cols)
    }

    fn apply_refill(
        &mut self,
        ctx: &mut FillContext<'_>,
        removed: &BTreeSet<CellCoordinate>,
        drop_in: &[Vec<Symbol>],
        grid_after: &SymbolGrid,
    ) -> Millis {
        if removed.is_empty() {
            return ctx.timing.settle_ms;
        }

        let shape = ctx.grid.shape();
        let mut removed_rows: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for coord in removed.iter().filter(|c| shape.contains(**c)) {
            removed_rows.entry(coord.col).or_default().insert(coord.row);
        }

        let mut columns = BTreeMap::new();
        for (col, rows_out) in removed_rows {
            // Removed visuals go away now
            for &row in &rows_out {
                if let Some(handle) = ctx.grid.take_handle(CellCoordinate::new(row, col)) {
                    ctx.renderer.destroy_visual(handle);
                }
            }

            // Survivors keep their order and compact downward
            let survivors: Vec<(usize, Option<VisualHandle>, Symbol)> = (0..shape.rows)
                .filter(|row| !rows_out.contains(row))
                .map(|row| {
                    let coord = CellCoordinate::new(row, col);
                    let symbol = ctx.grid.symbol(coord).cloned().unwrap_or_default();
                    (row, ctx.grid.take_handle(coord), symbol)
                })
                .collect();

            let freed = shape.rows - survivors.len();
            let mut moves = Vec::with_capacity(shape.rows);

            for (offset, (from_row, handle, symbol)) in survivors.into_iter().enumerate() {
                let to = CellCoordinate::new(freed + offset, col);
                ctx.grid.set_symbol(to, symbol);
                // A survivor without a visual is left for reconciliation
                if let Some(handle) = handle {
                    ctx.grid.insert_handle(to, handle);
                    if from_row != to.row {
                        moves.push(DropMove {
                            handle,
                            from_row: from_row as isize,
                            to_row: to.row,
                        });
                    }
                }
            }

            // The lowest freed slot takes the last drop-in entry
            let incoming = drop_in.get(col).map(Vec::as_slice).unwrap_or(&[]);
            for slot in 0..freed {
                let coord = CellCoordinate::new(slot, col);
                let from_bottom = freed - 1 - slot;
                let symbol = incoming
                    .len()
                    .checked_sub(1 + from_bottom)
                    .and_then(|i| incoming.get(i))
                    .cloned()
                    .unwrap_or_else(|| target_symbol(grid_after, ctx.grid, coord));

                let from_row = slot as isize - freed as isize;
                let (x, _) = ctx.metrics.cell_origin(coord);
                let handle = ctx.renderer.create_cell_visual(&symbol, x, ctx.metrics.row_y(from_row));
                ctx.grid.insert_handle(coord, handle);
                ctx.grid.set_symbol(coord, symbol);
                moves.push(DropMove {
                    handle,
                    from_row,
                    to_row: slot,
                });
            }

            columns.insert(col, moves);
        }

        self.schedule_columns(ctx, columns);
        ctx.timing.cascade_duration(shape.cols)
    }

    fn on_task(&mut self, ctx: &mut FillContext<'_>, task: FillTask) {
        if let FillTask::DropColumn { column } = task {
            self.drop_column(ctx, column);
        }
    }

    fn finish(&mut self, ctx: &mut FillContext<'_>) {
        let columns: Vec<usize> = self.pending.keys().copied().collect();
        for column in columns {
            self.drop_column(ctx, column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::test_support::Board;
    use rf_outcome::grid_from_rows;

    fn cells(coords: &[(usize, usize)]) -> BTreeSet<CellCoordinate> {
        coords.iter().map(|&c| CellCoordinate::from(c)).collect()
    }

    fn syms(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|&n| Symbol::new(n)).collect()
    }

    #[test]
    fn test_survivors_compact_and_drop_in_fills_top() {
        let mut board = Board::new(&[&["A", "X"], &["B", "Y"], &["C", "Z"]]);
        let survivor = board.grid.handle(CellCoordinate::new(0, 0)).unwrap();

        // Remove B and C from column 0
        let removed = cells(&[(1, 0), (2, 0)]);
        let drop_in = vec![syms(&["N1", "N2"]), vec![]];
        let after = grid_from_rows(&[&["N1", "X"], &["N2", "Y"], &["A", "Z"]]);

        let mut strategy = CascadeFill::new();
        let mut ctx = board.ctx();
        let duration = strategy.apply_refill(&mut ctx, &removed, &drop_in, &after);
        let deferred = ctx.take_deferred();

        assert_eq!(duration, board.timing.cascade_duration(2));
        assert_eq!(deferred, vec![(0, FillTask::DropColumn { column: 0 })]);
        assert_eq!(board.symbols(), vec![vec!["N1", "X"], vec!["N2", "Y"], vec!["A", "Z"]]);
        assert_eq!(board.grid.handle(CellCoordinate::new(2, 0)), Some(survivor));
        assert!(board.grid.is_consistent());
        assert_eq!(strategy.pending_columns(), vec![0]);

        board.run_deferred(&mut strategy, deferred);
        assert!(strategy.pending_columns().is_empty());
        let landed = board.renderer.visual(survivor).unwrap();
        assert_eq!(landed.y, board.metrics.cell_origin(CellCoordinate::new(2, 0)).1);
    }

    #[test]
    fn test_drop_in_is_consumed_from_the_bottom() {
        let mut board = Board::new(&[&["A"], &["B"], &["C"]]);
        // One freed slot but three listed symbols: the last entry lands
        let removed = cells(&[(2, 0)]);
        let drop_in = vec![syms(&["P", "Q", "R"])];
        let after = grid_from_rows(&[&["R"], &["A"], &["B"]]);

        CascadeFill::new().apply_refill(&mut board.ctx(), &removed, &drop_in, &after);
        assert_eq!(board.symbols(), vec![vec!["R"], vec!["A"], vec!["B"]]);
    }

    #[test]
    fn test_short_drop_in_falls_back_to_grid_after() {
        let mut board = Board::new(&[&["A"], &["B"], &["C"]]);
        let removed = cells(&[(0, 0), (1, 0)]);
        let drop_in = vec![syms(&["Q"])];
        let after = grid_from_rows(&[&["G"], &["Q"], &["C"]]);

        CascadeFill::new().apply_refill(&mut board.ctx(), &removed, &drop_in, &after);
        assert_eq!(board.symbols(), vec![vec!["G"], vec!["Q"], vec!["C"]]);
    }

    #[test]
    fn test_columns_are_staggered() {
        let mut board = Board::new(&[&["A", "B", "C"]]);
        board.timing.column_stagger_ms = 50;
        let removed = cells(&[(0, 0), (0, 2)]);
        let after = grid_from_rows(&[&["X", "B", "Y"]]);

        let mut strategy = CascadeFill::new();
        let mut ctx = board.ctx();
        let duration = strategy.apply_refill(&mut ctx, &removed, &[], &after);
        let deferred = ctx.take_deferred();

        assert_eq!(
            deferred,
            vec![
                (0, FillTask::DropColumn { column: 0 }),
                (100, FillTask::DropColumn { column: 2 }),
            ]
        );
        assert_eq!(duration, 2 * 50 + board.timing.drop_ms);
    }

    #[test]
    fn test_intro_drops_every_column() {
        let mut board = Board::new(&[&["A", "B"], &["C", "D"]]);
        let mut strategy = CascadeFill::new();
        let mut ctx = board.ctx();
        let duration = strategy.intro(&mut ctx);
        let deferred = ctx.take_deferred();

        assert_eq!(deferred.len(), 2);
        assert_eq!(duration, board.timing.cascade_duration(2));

        strategy.finish(&mut board.ctx());
        assert!(strategy.pending_columns().is_empty());
        for (&coord, &handle) in board.grid.handles() {
            let y = board.metrics.cell_origin(coord).1;
            assert_eq!(board.renderer.visual(handle).unwrap().y, y);
        }
    }

    #[test]
    fn test_empty_removal_is_a_settle_noop() {
        let mut board = Board::new(&[&["A", "B"], &["C", "D"]]);
        let mut strategy = CascadeFill::new();
        let after = grid_from_rows(&[&["A", "B"], &["C", "D"]]);
        let mut ctx = board.ctx();
        let duration = strategy.apply_refill(&mut ctx, &BTreeSet::new(), &[], &after);
        let deferred = ctx.take_deferred();

        assert_eq!(duration, board.timing.settle_ms);
        assert!(deferred.is_empty());
        assert!(strategy.pending_columns().is_empty());
        assert_eq!(board.renderer.stats().created, 0);
        assert_eq!(board.renderer.stats().destroyed, 0);
        assert_eq!(board.renderer.stats().animated, 0);
    }

    #[test]
    fn test_removed_cell_without_visual_still_cascades() {
        let mut board = Board::new(&[&["A", "B"], &["C", "D"]]);
        board.lose_visual(CellCoordinate::new(1, 0));

        let mut strategy = CascadeFill::new();
        let after = grid_from_rows(&[&["X", "B"], &["A", "D"]]);
        let mut ctx = board.ctx();
        strategy.apply_refill(&mut ctx, &cells(&[(1, 0)]), &[syms(&["X"])], &after);
        let deferred = ctx.take_deferred();
        board.run_deferred(&mut strategy, deferred);

        assert_eq!(board.grid.symbols(), &after);
        assert!(board.grid.is_consistent());
        assert_eq!(board.renderer.stats().destroyed, 0);
        assert_eq!(board.renderer.stats().stale_ops, 0);
    }

    #[test]
    fn test_survivor_without_visual_is_left_for_reconcile() {
        let mut board = Board::new(&[&["A", "B"], &["C", "D"]]);
        board.lose_visual(CellCoordinate::new(0, 0));

        let mut strategy = CascadeFill::new();
        let after = grid_from_rows(&[&["X", "B"], &["A", "D"]]);
        let mut ctx = board.ctx();
        strategy.apply_refill(&mut ctx, &cells(&[(1, 0)]), &[syms(&["X"])], &after);
        let deferred = ctx.take_deferred();
        board.run_deferred(&mut strategy, deferred);

        assert_eq!(board.grid.symbols(), &after);
        assert_eq!(board.grid.handle(CellCoordinate::new(1, 0)), None);
        assert_eq!(board.renderer.stats().stale_ops, 0);

        let corrections = board.grid.reconcile(&after, &mut board.renderer, &board.metrics);
        assert_eq!(corrections, 1);
        assert!(board.grid.is_consistent());
    }
}
