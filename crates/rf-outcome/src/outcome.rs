//! Outcome and cascade step definitions

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::board::{BoardShape, CellCoordinate, SymbolGrid};
use crate::symbol::Symbol;
use crate::OutcomeResult;

/// A complete, precomputed play result to be replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Play identifier assigned by the server
    pub id: String,
    /// Game mode the play was made in (e.g. "base", "bonus_buy")
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Bet amount
    #[serde(default)]
    pub bet: f64,
    /// Board before the first cascade
    #[serde(alias = "initialGrid")]
    pub initial_grid: SymbolGrid,
    /// Ordered cascade steps (empty = no cascades)
    #[serde(default)]
    pub steps: Vec<CascadeStep>,
    /// Total win reported by the server
    #[serde(default, alias = "totalWin")]
    pub total_win: f64,
}

fn default_mode() -> String {
    "base".to_string()
}

impl Outcome {
    /// Create an outcome with no cascades
    pub fn new(id: impl Into<String>, initial_grid: SymbolGrid) -> Self {
        Self {
            id: id.into(),
            mode: default_mode(),
            bet: 0.0,
            initial_grid,
            steps: Vec::new(),
            total_win: 0.0,
        }
    }

    /// Builder: append a step
    pub fn with_step(mut self, step: CascadeStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Builder: set bet
    pub fn with_bet(mut self, bet: f64) -> Self {
        self.bet = bet;
        self
    }

    /// Builder: set the server total win
    pub fn with_total_win(mut self, total_win: f64) -> Self {
        self.total_win = total_win;
        self
    }

    /// Builder: total win = sum of match wins
    pub fn with_summed_total_win(mut self) -> Self {
        self.total_win = self.match_win_sum();
        self
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> OutcomeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode to JSON
    pub fn to_json(&self) -> OutcomeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of `win_for_step` over all match steps
    pub fn match_win_sum(&self) -> f64 {
        self.steps.iter().map(CascadeStep::win).sum()
    }

    /// Does the initial grid fit the given shape exactly?
    pub fn fits(&self, shape: BoardShape) -> bool {
        shape.matches(&self.initial_grid)
            && self.steps.iter().all(|step| match step {
                CascadeStep::Match(m) => shape.matches(&m.grid_after),
                CascadeStep::Bonus(_) => true,
            })
    }
}

/// One atomic mutation or bonus event within an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CascadeStep {
    /// Match removal followed by refill
    Match(MatchStep),
    /// Bonus trigger (no grid mutation)
    Bonus(BonusStep),
}

impl CascadeStep {
    pub fn is_bonus(&self) -> bool {
        matches!(self, Self::Bonus(_))
    }

    /// Win carried by this step (0 for bonus steps)
    pub fn win(&self) -> f64 {
        match self {
            Self::Match(m) => m.win_for_step,
            Self::Bonus(_) => 0.0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::Bonus(_) => "bonus",
        }
    }
}

/// Cells removed by a match and the board that results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStep {
    /// Cells removed by this match
    #[serde(alias = "removeCells")]
    pub remove_cells: BTreeSet<CellCoordinate>,
    /// Per-column incoming symbols, top to bottom (may be empty for in-place fills)
    #[serde(default, alias = "dropIn")]
    pub drop_in: Vec<Vec<Symbol>>,
    /// Win paid by this step
    #[serde(default, alias = "winForStep")]
    pub win_for_step: f64,
    /// Board after this step, row-major, fully populated
    #[serde(alias = "gridAfter")]
    pub grid_after: SymbolGrid,
}

impl MatchStep {
    pub fn new(
        remove_cells: impl IntoIterator<Item = CellCoordinate>,
        win_for_step: f64,
        grid_after: SymbolGrid,
    ) -> Self {
        Self {
            remove_cells: remove_cells.into_iter().collect(),
            drop_in: Vec::new(),
            win_for_step,
            grid_after,
        }
    }

    /// Builder: set drop-in columns
    pub fn with_drop_in(mut self, drop_in: Vec<Vec<Symbol>>) -> Self {
        self.drop_in = drop_in;
        self
    }

    /// Incoming symbols for one column (empty when absent)
    pub fn drop_in_for(&self, col: usize) -> &[Symbol] {
        self.drop_in.get(col).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<MatchStep> for CascadeStep {
    fn from(step: MatchStep) -> Self {
        Self::Match(step)
    }
}

/// Bonus trigger event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusStep {
    /// Number of trigger symbols to highlight (1..=3)
    #[serde(alias = "triggerCount", deserialize_with = "saturating_count")]
    pub trigger_count: u8,
    /// Cells holding the trigger symbol, when the server sends them
    #[serde(default, alias = "triggerCells")]
    pub trigger_cells: Option<Vec<CellCoordinate>>,
    /// Opaque pass-through data for the bonus game
    #[serde(default, alias = "bonusPayload")]
    pub bonus_payload: serde_json::Value,
}

/// Decode any integer count, saturating into `u8` so normalization can clamp it
fn saturating_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(u8::try_from(raw.max(0)).unwrap_or(u8::MAX))
}

impl BonusStep {
    pub fn new(trigger_count: u8) -> Self {
        Self {
            trigger_count,
            trigger_cells: None,
            bonus_payload: serde_json::Value::Null,
        }
    }

    /// Builder: explicit trigger cells
    pub fn with_cells(mut self, cells: impl IntoIterator<Item = CellCoordinate>) -> Self {
        self.trigger_cells = Some(cells.into_iter().collect());
        self
    }

    /// Builder: bonus payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.bonus_payload = payload;
        self
    }
}

impl From<BonusStep> for CascadeStep {
    fn from(step: BonusStep) -> Self {
        Self::Bonus(step)
    }
}
