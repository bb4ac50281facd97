//! Fill-mode strategies
//!
//! A strategy animates the board into its next state after removal, and
//! once at the start of a run (intro). Strategies mutate the grid and the
//! renderer only through [`FillContext`] and report how long their
//! animation takes; the sequencer waits that long before moving on.

mod cascade;
mod reel_spin;
mod replace;

pub use cascade::CascadeFill;
pub use reel_spin::{ReelSpinFill, ReelStop};
pub use replace::ReplaceFill;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use rf_outcome::{CellCoordinate, Symbol, SymbolGrid};

use crate::config::ReplayConfig;
use crate::grid::GridState;
use crate::layout::Metrics;
use crate::render::CellRenderer;
use crate::timing::{Millis, TimingConfig};

/// How removed cells are refilled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillMode {
    /// Removed cells pop in place
    Replace,
    /// Survivors fall, new symbols drop in from above
    #[default]
    Cascade,
    /// Affected columns spin and stop left to right
    ReelSpin,
}

impl FillMode {
    pub const ALL: [FillMode; 3] = [FillMode::Replace, FillMode::Cascade, FillMode::ReelSpin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Cascade => "cascade",
            Self::ReelSpin => "reel-spin",
        }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FillMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "replace" => Ok(Self::Replace),
            "cascade" => Ok(Self::Cascade),
            "reel-spin" | "reelspin" => Ok(Self::ReelSpin),
            other => Err(format!("unknown fill mode '{}'", other)),
        }
    }
}

/// Strategy-internal timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTask {
    /// Start the drop animation of one cascade column
    DropColumn { column: usize },
    /// One reel-spin symbol tick
    ReelTick { tick: u32 },
}

/// What a strategy may touch while filling
pub struct FillContext<'a> {
    pub grid: &'a mut GridState,
    pub renderer: &'a mut dyn CellRenderer,
    pub metrics: &'a Metrics,
    pub timing: &'a TimingConfig,
    deferred: Vec<(Millis, FillTask)>,
}

impl<'a> FillContext<'a> {
    pub fn new(
        grid: &'a mut GridState,
        renderer: &'a mut dyn CellRenderer,
        metrics: &'a Metrics,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            grid,
            renderer,
            metrics,
            timing,
            deferred: Vec::new(),
        }
    }

    /// Ask for `task` to be delivered back after `delay_ms`
    pub fn defer(&mut self, delay_ms: Millis, task: FillTask) {
        self.deferred.push((delay_ms, task));
    }

    /// Deferred tasks in request order
    pub fn take_deferred(&mut self) -> Vec<(Millis, FillTask)> {
        std::mem::take(&mut self.deferred)
    }
}

/// Animation policy for refilling the board
pub trait FillStrategy: fmt::Debug {
    fn mode(&self) -> FillMode;

    /// Animate the initial board in, returning the intro duration
    fn intro(&mut self, ctx: &mut FillContext<'_>) -> Millis;

    /// Refill `removed` so the board ends as `grid_after`, returning the
    /// refill duration. `drop_in[col]` lists incoming symbols top to bottom.
    fn apply_refill(
        &mut self,
        ctx: &mut FillContext<'_>,
        removed: &BTreeSet<CellCoordinate>,
        drop_in: &[Vec<Symbol>],
        grid_after: &SymbolGrid,
    ) -> Millis;

    /// Deliver a task scheduled through [`FillContext::defer`]
    fn on_task(&mut self, _ctx: &mut FillContext<'_>, _task: FillTask) {}

    /// Complete anything still in flight before the sequencer moves on
    fn finish(&mut self, _ctx: &mut FillContext<'_>) {}

    /// Reel stops issued so far (reel-spin only)
    fn stop_log(&self) -> &[ReelStop] {
        &[]
    }
}

/// Build a fresh strategy for one run
pub fn build_strategy(mode: FillMode, config: &ReplayConfig) -> Box<dyn FillStrategy> {
    match mode {
        FillMode::Replace => Box::new(ReplaceFill::new()),
        FillMode::Cascade => Box::new(CascadeFill::new()),
        FillMode::ReelSpin => Box::new(ReelSpinFill::new(config.reel_spin.clone())),
    }
}

/// Target symbol for a refilled cell: `grid_after`, else what the board holds
pub(crate) fn target_symbol(grid_after: &SymbolGrid, grid: &GridState, coord: CellCoordinate) -> Symbol {
    rf_outcome::symbol_at(grid_after, coord)
        .or_else(|| grid.symbol(coord))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::layout::{ContainerSize, LayoutConfig, resolve_metrics};
    use crate::render::HeadlessRenderer;
    use rf_outcome::{BoardShape, grid_from_rows};

    /// Grid, renderer and layout for strategy tests
    pub struct Board {
        pub grid: GridState,
        pub renderer: HeadlessRenderer,
        pub metrics: Metrics,
        pub timing: TimingConfig,
    }

    impl Board {
        pub fn new(rows: &[&[&str]]) -> Self {
            let symbols = grid_from_rows(rows);
            let shape = BoardShape::new(symbols.len(), symbols[0].len());
            let metrics = resolve_metrics(shape, ContainerSize::default(), &LayoutConfig::default());
            let mut renderer = HeadlessRenderer::new();
            let mut grid = GridState::new(shape);
            grid.rebuild(shape, &symbols, &mut renderer, &metrics);
            renderer.reset_stats();
            Self {
                grid,
                renderer,
                metrics,
                timing: TimingConfig::normal(),
            }
        }

        /// Drop the visual at `coord` behind the strategy's back
        pub fn lose_visual(&mut self, coord: CellCoordinate) {
            if let Some(handle) = self.grid.take_handle(coord) {
                self.renderer.destroy_visual(handle);
            }
            self.renderer.reset_stats();
        }

        pub fn ctx(&mut self) -> FillContext<'_> {
            FillContext::new(&mut self.grid, &mut self.renderer, &self.metrics, &self.timing)
        }

        /// Deliver deferred tasks in due order, draining anything they defer
        pub fn run_deferred(&mut self, strategy: &mut dyn FillStrategy, first: Vec<(Millis, FillTask)>) {
            let mut queue: Vec<(Millis, u64, FillTask)> = Vec::new();
            let mut seq = 0;
            for (delay, task) in first {
                queue.push((delay, seq, task));
                seq += 1;
            }
            while !queue.is_empty() {
                queue.sort_by_key(|&(due, s, _)| (due, s));
                let (now, _, task) = queue.remove(0);
                let mut ctx = self.ctx();
                strategy.on_task(&mut ctx, task);
                for (delay, next) in ctx.take_deferred() {
                    queue.push((now + delay, seq, next));
                    seq += 1;
                }
            }
        }

        pub fn symbols(&self) -> Vec<Vec<String>> {
            self.grid
                .symbols()
                .iter()
                .map(|row| row.iter().map(|s| s.as_str().to_string()).collect())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_mode_parse_and_display() {
        for mode in FillMode::ALL {
            assert_eq!(mode.to_string().parse::<FillMode>().unwrap(), mode);
        }
        assert_eq!("reel_spin".parse::<FillMode>().unwrap(), FillMode::ReelSpin);
        assert!("tumble".parse::<FillMode>().is_err());
    }

    #[test]
    fn test_fill_mode_serde_is_kebab_case() {
        assert_eq!(serde_json::to_string(&FillMode::ReelSpin).unwrap(), "\"reel-spin\"");
    }

    #[test]
    fn test_build_strategy_matches_mode() {
        let config = ReplayConfig::default();
        for mode in FillMode::ALL {
            assert_eq!(build_strategy(mode, &config).mode(), mode);
        }
    }
}
