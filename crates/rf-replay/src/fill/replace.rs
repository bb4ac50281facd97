//! Replace fill: removed cells pop back in place

use std::collections::BTreeSet;

use rf_outcome::{CellCoordinate, Symbol, SymbolGrid};

use super::{FillContext, FillMode, FillStrategy, target_symbol};
use crate::render::{Easing, Tween};
use crate::timing::Millis;

#[derive(Debug, Default)]
pub struct ReplaceFill;

impl ReplaceFill {
    pub fn new() -> Self {
        Self
    }
}

impl FillStrategy for ReplaceFill {
    fn mode(&self) -> FillMode {
        FillMode::Replace
    }

    fn intro(&mut self, ctx: &mut FillContext<'_>) -> Millis {
        let pop_ms = ctx.timing.pop_ms;
        for &handle in ctx.grid.handles().values() {
            ctx.renderer.animate(
                handle,
                &[Tween::scale(0.0, 1.0), Tween::alpha(0.0, 1.0)],
                pop_ms,
                Easing::EaseOutBack,
            );
        }
        pop_ms
    }

    fn apply_refill(
        &mut self,
        ctx: &mut FillContext<'_>,
        removed: &BTreeSet<CellCoordinate>,
        _drop_in: &[Vec<Symbol>],
        grid_after: &SymbolGrid,
    ) -> Millis {
        if removed.is_empty() {
            return ctx.timing.settle_ms;
        }

        let pop_ms = ctx.timing.pop_ms;
        for &coord in removed {
            if !ctx.grid.shape().contains(coord) {
                continue;
            }
            if let Some(old) = ctx.grid.take_handle(coord) {
                ctx.renderer.destroy_visual(old);
            }
            let symbol = target_symbol(grid_after, ctx.grid, coord);
            let (x, y) = ctx.metrics.cell_origin(coord);
            let handle = ctx.renderer.create_cell_visual(&symbol, x, y);
            ctx.renderer.animate(
                handle,
                &[Tween::scale(0.0, 1.0), Tween::alpha(0.0, 1.0)],
                pop_ms,
                Easing::EaseOutBack,
            );
            ctx.grid.insert_handle(coord, handle);
            ctx.grid.set_symbol(coord, symbol);
        }
        pop_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::test_support::Board;
    use crate::render::CellRenderer;
    use rf_outcome::grid_from_rows;

    #[test]
    fn test_replace_recreates_only_removed_cells() {
        let mut board = Board::new(&[&["A", "B", "C"], &["D", "E", "F"]]);
        let kept = board.grid.handle(CellCoordinate::new(0, 0)).unwrap();
        let gone = board.grid.handle(CellCoordinate::new(1, 1)).unwrap();

        let removed: BTreeSet<_> = [CellCoordinate::new(1, 1)].into_iter().collect();
        let after = grid_from_rows(&[&["A", "B", "C"], &["D", "X", "F"]]);
        let mut strategy = ReplaceFill::new();
        let duration = strategy.apply_refill(&mut board.ctx(), &removed, &[], &after);

        assert_eq!(duration, board.timing.pop_ms);
        assert_eq!(board.grid.symbols(), &after);
        assert_eq!(board.grid.handle(CellCoordinate::new(0, 0)), Some(kept));
        assert!(!board.renderer.is_live(gone));
        assert_eq!(board.renderer.stats().created, 1);
        assert!(board.grid.is_consistent());
    }

    #[test]
    fn test_empty_removal_is_a_settle_noop() {
        let mut board = Board::new(&[&["A", "B"]]);
        let mut strategy = ReplaceFill::new();
        let after = grid_from_rows(&[&["A", "B"]]);
        let duration = strategy.apply_refill(&mut board.ctx(), &BTreeSet::new(), &[], &after);

        assert_eq!(duration, board.timing.settle_ms);
        assert_eq!(board.renderer.stats().created, 0);
        assert_eq!(board.renderer.stats().destroyed, 0);
    }

    #[test]
    fn test_missing_handle_is_skipped() {
        let mut board = Board::new(&[&["A", "B"]]);
        let coord = CellCoordinate::new(0, 1);
        let lost = board.grid.take_handle(coord).unwrap();
        board.renderer.destroy_visual(lost);
        board.renderer.reset_stats();
        assert!(!board.renderer.is_live(lost));

        let removed: BTreeSet<_> = [coord].into_iter().collect();
        let after = grid_from_rows(&[&["A", "Z"]]);
        ReplaceFill::new().apply_refill(&mut board.ctx(), &removed, &[], &after);

        assert_eq!(board.renderer.stats().stale_ops, 0);
        assert_eq!(board.symbols(), vec![vec!["A", "Z"]]);
        assert!(board.grid.is_consistent());
    }

    #[test]
    fn test_intro_pops_every_cell() {
        let mut board = Board::new(&[&["A", "B"], &["C", "D"]]);
        let duration = ReplaceFill::new().intro(&mut board.ctx());
        assert_eq!(duration, board.timing.pop_ms);
        assert_eq!(board.renderer.stats().animated, 4);
    }
}
