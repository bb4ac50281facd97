//! # rf-outcome — Play outcomes for the ReelForge cascade replayer
//!
//! Typed data describing one precomputed play result: the initial grid,
//! the ordered cascade steps, per-step wins and optional bonus payloads.
//!
//! The client never computes outcomes. Everything here is decoded from the
//! server and, when malformed, normalized against the configured board shape
//! so that replay can always complete.
//!
//! ## Architecture
//!
//! ```text
//! Outcome
//!     │
//!     ├── initial_grid (rows × cols of Symbol)
//!     └── steps: Vec<CascadeStep>
//!           ├── Match { remove_cells, drop_in, win_for_step, grid_after }
//!           └── Bonus { trigger_count, trigger_cells, bonus_payload }
//! ```

pub mod board;
pub mod normalize;
pub mod outcome;
pub mod symbol;

pub use board::*;
pub use normalize::*;
pub use outcome::*;
pub use symbol::*;

use thiserror::Error;

/// Outcome decoding errors
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Board shape {rows}x{cols} has no cells")]
    EmptyBoard { rows: usize, cols: usize },
}

pub type OutcomeResult<T> = Result<T, OutcomeError>;

/// Maximum number of trigger cells a bonus step may highlight
pub const MAX_TRIGGER_COUNT: u8 = 3;
