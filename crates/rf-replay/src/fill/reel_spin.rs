//! Reel-spin fill: affected columns spin and stop left to right
//!
//! Spinning columns cycle a symbol pool every `tick_ms`. Column `i` of the
//! spinning set stops at tick `min_spin_ticks + i * stop_stagger_ticks`.
//! A stop is only issued once the rightmost spinning column has completed
//! `min_spin_ticks` ticks.

use std::collections::BTreeSet;

use serde::Serialize;

use rf_outcome::{CellCoordinate, Symbol, SymbolGrid};

use super::{FillContext, FillMode, FillStrategy, FillTask, target_symbol};
use crate::config::ReelSpinConfig;
use crate::render::{Easing, Tween};
use crate::timing::Millis;

/// Record of one reel stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReelStop {
    pub column: usize,
    /// Ticks the column had spun when it stopped
    pub ticks_spun: u32,
    /// Stopped by `finish` rather than by its own tick
    pub forced: bool,
}

#[derive(Debug, Clone)]
struct SpinColumn {
    column: usize,
    stop_tick: u32,
    ticks_spun: u32,
    finals: Vec<Symbol>,
    stopped: bool,
}

#[derive(Debug, Clone)]
struct SpinPlan {
    pool: Vec<Symbol>,
    columns: Vec<SpinColumn>,
}

#[derive(Debug)]
pub struct ReelSpinFill {
    config: ReelSpinConfig,
    plan: Option<SpinPlan>,
    stops: Vec<ReelStop>,
}

impl ReelSpinFill {
    pub fn new(config: ReelSpinConfig) -> Self {
        Self {
            config,
            plan: None,
            stops: Vec::new(),
        }
    }

    /// Columns still spinning
    pub fn spinning_columns(&self) -> Vec<usize> {
        self.plan
            .iter()
            .flat_map(|p| p.columns.iter())
            .filter(|c| !c.stopped)
            .map(|c| c.column)
            .collect()
    }

    /// Start spinning `columns` (column index, final symbols top to bottom)
    fn start_spin(&mut self, ctx: &mut FillContext<'_>, columns: Vec<(usize, Vec<Symbol>)>) -> Millis {
        if columns.is_empty() {
            return ctx.timing.settle_ms;
        }

        let mut pool = ctx.grid.distinct_symbols();
        if pool.is_empty() {
            pool = Symbol::fallback_alphabet();
        }

        let spin_columns: Vec<SpinColumn> = columns
            .into_iter()
            .enumerate()
            .map(|(i, (column, finals))| SpinColumn {
                column,
                stop_tick: self.config.min_spin_ticks + i as u32 * self.config.stop_stagger_ticks,
                ticks_spun: 0,
                finals,
                stopped: false,
            })
            .collect();

        let last_tick = spin_columns.iter().map(|c| c.stop_tick).max().unwrap_or(0).max(1);
        let tick_ms = ctx.timing.tick_ms.max(1);
        for tick in 1..=last_tick {
            ctx.defer(tick as Millis * tick_ms, FillTask::ReelTick { tick });
        }

        log::debug!(
            "[ReelSpin] Spinning {} column(s), last stop at tick {}",
            spin_columns.len(),
            last_tick
        );
        self.plan = Some(SpinPlan {
            pool,
            columns: spin_columns,
        });
        last_tick as Millis * tick_ms + ctx.timing.settle_ms
    }

    fn tick(&mut self, ctx: &mut FillContext<'_>, tick: u32) {
        let Some(plan) = self.plan.as_mut() else {
            return;
        };
        let rows = ctx.grid.shape().rows;

        for col in plan.columns.iter_mut().filter(|c| !c.stopped) {
            col.ticks_spun = tick;
            for row in 0..rows {
                let index = (tick as usize + row + col.column) % plan.pool.len();
                if let Some(handle) = ctx.grid.handle(CellCoordinate::new(row, col.column)) {
                    ctx.renderer.update_cell_visual(handle, &plan.pool[index]);
                }
            }
        }

        let gate_open = plan
            .columns
            .iter()
            .rev()
            .find(|c| !c.stopped)
            .is_some_and(|c| c.ticks_spun >= self.config.min_spin_ticks);

        let due: Vec<usize> = plan
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.stopped && c.stop_tick <= tick)
            .map(|(i, _)| i)
            .collect();

        if !due.is_empty() && !gate_open {
            log::debug!("[ReelSpin] Stop gate closed at tick {}, deferring", tick);
            return;
        }
        for i in due {
            Self::stop_column(ctx, &self.config, &mut plan.columns[i], &mut self.stops, false);
        }
    }

    fn stop_column(
        ctx: &mut FillContext<'_>,
        config: &ReelSpinConfig,
        col: &mut SpinColumn,
        stops: &mut Vec<ReelStop>,
        forced: bool,
    ) {
        let overshoot = config.settle_overshoot * ctx.metrics.cell_size;
        for (row, symbol) in col.finals.iter().enumerate() {
            let coord = CellCoordinate::new(row, col.column);
            ctx.grid.set_symbol(coord, symbol.clone());
            if let Some(handle) = ctx.grid.handle(coord) {
                let (_, y) = ctx.metrics.cell_origin(coord);
                ctx.renderer.update_cell_visual(handle, symbol);
                ctx.renderer.animate(
                    handle,
                    &[Tween::y(y - overshoot, y)],
                    ctx.timing.settle_ms,
                    Easing::EaseOutBack,
                );
            }
        }
        col.stopped = true;
        stops.push(ReelStop {
            column: col.column,
            ticks_spun: col.ticks_spun,
            forced,
        });
        log::trace!("[ReelSpin] Column {} stopped after {} ticks", col.column, col.ticks_spun);
    }
}

impl FillStrategy for ReelSpinFill {
    fn mode(&self) -> FillMode {
        FillMode::ReelSpin
    }

    fn intro(&mut self, ctx: &mut FillContext<'_>) -> Millis {
        let cols = ctx.grid.shape().cols;
        let columns = (0..cols).map(|col| (col, ctx.grid.column(col))).collect();
        self.start_spin(ctx, columns)
    }

    fn apply_refill(
        &mut self,
        ctx: &mut FillContext<'_>,
        removed: &BTreeSet<CellCoordinate>,
        _drop_in: &[Vec<Symbol>],
        grid_after: &SymbolGrid,
    ) -> Millis {
        let shape = ctx.grid.shape();
        let affected: BTreeSet<usize> = removed
            .iter()
            .filter(|c| shape.contains(**c))
            .map(|c| c.col)
            .collect();

        // Removed visuals come back to spin with their column
        for coord in removed {
            if let Some(handle) = ctx.grid.handle(*coord) {
                ctx.renderer.animate(handle, &[Tween::scale(0.0, 1.0), Tween::alpha(0.0, 1.0)], 0, Easing::Linear);
            }
        }

        let columns = affected
            .into_iter()
            .map(|col| {
                let finals = (0..shape.rows)
                    .map(|row| target_symbol(grid_after, ctx.grid, CellCoordinate::new(row, col)))
                    .collect();
                (col, finals)
            })
            .collect();
        self.start_spin(ctx, columns)
    }

    fn on_task(&mut self, ctx: &mut FillContext<'_>, task: FillTask) {
        if let FillTask::ReelTick { tick } = task {
            self.tick(ctx, tick);
        }
    }

    fn finish(&mut self, ctx: &mut FillContext<'_>) {
        let Some(mut plan) = self.plan.take() else {
            return;
        };
        for col in plan.columns.iter_mut().filter(|c| !c.stopped) {
            log::warn!("[ReelSpin] Column {} forced to stop", col.column);
            Self::stop_column(ctx, &self.config, col, &mut self.stops, true);
        }
    }

    fn stop_log(&self) -> &[ReelStop] {
        &self.stops
    }
}
