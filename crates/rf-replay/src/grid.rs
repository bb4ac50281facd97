//! Grid state: the symbol matrix and its cell → visual handle map

use std::collections::{BTreeMap, BTreeSet};

use rf_outcome::{BoardShape, CellCoordinate, Symbol, SymbolGrid};

use crate::event::BoardSnapshot;
use crate::layout::Metrics;
use crate::render::{CellRenderer, Easing, Tween, VisualHandle};
use crate::RunId;

/// Current board contents
///
/// Between phases every coordinate of the shape has exactly one symbol and
/// one live handle. During a fill the map may be temporarily incomplete.
#[derive(Debug, Clone)]
pub struct GridState {
    shape: BoardShape,
    symbols: SymbolGrid,
    handles: BTreeMap<CellCoordinate, VisualHandle>,
}

impl GridState {
    /// Blank board without visuals
    pub fn new(shape: BoardShape) -> Self {
        Self {
            shape,
            symbols: shape.blank_grid(),
            handles: BTreeMap::new(),
        }
    }

    pub fn shape(&self) -> BoardShape {
        self.shape
    }

    pub fn symbols(&self) -> &SymbolGrid {
        &self.symbols
    }

    pub fn handles(&self) -> &BTreeMap<CellCoordinate, VisualHandle> {
        &self.handles
    }

    /// Replace the whole board, recreating every visual
    ///
    /// `grid` must already have `shape`; missing cells become blank.
    pub fn rebuild(
        &mut self,
        shape: BoardShape,
        grid: &SymbolGrid,
        renderer: &mut dyn CellRenderer,
        metrics: &Metrics,
    ) {
        self.destroy_all(renderer);
        self.shape = shape;
        self.symbols = shape.blank_grid();
        for coord in shape.coordinates() {
            let symbol = rf_outcome::symbol_at(grid, coord).cloned().unwrap_or_default();
            let (x, y) = metrics.cell_origin(coord);
            let handle = renderer.create_cell_visual(&symbol, x, y);
            self.handles.insert(coord, handle);
            self.symbols[coord.row][coord.col] = symbol;
        }
    }

    /// Destroy every tracked visual
    pub fn destroy_all(&mut self, renderer: &mut dyn CellRenderer) {
        for handle in std::mem::take(&mut self.handles).into_values() {
            renderer.destroy_visual(handle);
        }
    }

    pub fn symbol(&self, coord: CellCoordinate) -> Option<&Symbol> {
        rf_outcome::symbol_at(&self.symbols, coord)
    }

    /// Set a symbol; coordinates outside the shape are ignored
    pub fn set_symbol(&mut self, coord: CellCoordinate, symbol: Symbol) {
        if let Some(slot) = self.symbols.get_mut(coord.row).and_then(|r| r.get_mut(coord.col)) {
            *slot = symbol;
        }
    }

    pub fn handle(&self, coord: CellCoordinate) -> Option<VisualHandle> {
        self.handles.get(&coord).copied()
    }

    pub fn take_handle(&mut self, coord: CellCoordinate) -> Option<VisualHandle> {
        self.handles.remove(&coord)
    }

    /// Track a handle at a coordinate, returning the one it displaced
    pub fn insert_handle(&mut self, coord: CellCoordinate, handle: VisualHandle) -> Option<VisualHandle> {
        self.handles.insert(coord, handle)
    }

    /// Symbols of one column, top to bottom
    pub fn column(&self, col: usize) -> Vec<Symbol> {
        rf_outcome::column_symbols(&self.symbols, col)
    }

    /// Every cell has a symbol and exactly one handle
    pub fn is_consistent(&self) -> bool {
        self.shape.matches(&self.symbols)
            && self.handles.len() == self.shape.total_cells()
            && self.shape.coordinates().all(|c| self.handles.contains_key(&c))
    }

    /// First `limit` cells holding `symbol`, row-major
    pub fn find_symbol(&self, symbol: &Symbol, limit: usize) -> Vec<CellCoordinate> {
        self.shape
            .coordinates()
            .filter(|&c| self.symbol(c) == Some(symbol))
            .take(limit)
            .collect()
    }

    /// Distinct non-blank symbols in row-major first-appearance order
    pub fn distinct_symbols(&self) -> Vec<Symbol> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for row in &self.symbols {
            for symbol in row {
                if !symbol.is_blank() && seen.insert(symbol.clone()) {
                    out.push(symbol.clone());
                }
            }
        }
        out
    }

    /// Move every live handle to its coordinate under `metrics`
    pub fn reposition(&self, renderer: &mut dyn CellRenderer, metrics: &Metrics) {
        for (&coord, &handle) in &self.handles {
            let (x, y) = metrics.cell_origin(coord);
            renderer.animate(handle, &[Tween::x(x, x), Tween::y(y, y)], 0, Easing::Linear);
        }
    }

    /// Force the board to `target`, returning how many cells had to change.
    ///
    /// Cells without a handle get a fresh visual.
    pub fn reconcile(
        &mut self,
        target: &SymbolGrid,
        renderer: &mut dyn CellRenderer,
        metrics: &Metrics,
    ) -> usize {
        let mut corrections = 0;
        let shape = self.shape;
        for coord in shape.coordinates() {
            let Some(wanted) = rf_outcome::symbol_at(target, coord) else {
                continue;
            };
            let differs = self.symbol(coord) != Some(wanted);
            match self.handle(coord) {
                Some(handle) => {
                    if differs {
                        renderer.update_cell_visual(handle, wanted);
                    }
                }
                None => {
                    let (x, y) = metrics.cell_origin(coord);
                    let handle = renderer.create_cell_visual(wanted, x, y);
                    self.handles.insert(coord, handle);
                    corrections += usize::from(!differs);
                }
            }
            if differs {
                self.set_symbol(coord, wanted.clone());
                corrections += 1;
            }
        }
        corrections
    }

    pub fn snapshot(&self, run_id: Option<RunId>, outcome_id: Option<String>) -> BoardSnapshot {
        BoardSnapshot {
            shape: self.shape,
            symbols: self.symbols.clone(),
            run_id,
            outcome_id,
        }
    }
}
