//! # rf-replay — Cascade Replay Engine
//!
//! Replays server-computed cascade outcomes as a deterministic, timed
//! phase pipeline. The engine never decides wins or generates randomness:
//! it only sequences a given [`Outcome`](rf_outcome::Outcome).
//!
//! ## Architecture
//!
//! ```text
//! ReplayController (lifecycle, session state, virtual clock)
//!     │
//!     ├── GridState (symbol matrix + cell → visual handle map)
//!     ├── Metrics (layout resolved from container size)
//!     ├── Scheduler<SequencerTask> (cancellable timers)
//!     └── StepSequencer
//!           │   Intro → [Highlight | Remove → Refill] → Pause → … → Done
//!           └── FillStrategy (Replace | Cascade | ReelSpin)
//!                 │
//!                 v
//!           CellRenderer + ReplayObserver (external collaborators)
//! ```
//!
//! ## Threading
//!
//! All mutation happens on the thread that owns the controller. Other
//! threads talk to it through [`ReplayCommandSender`].

pub mod config;
pub mod controller;
pub mod event;
pub mod fill;
pub mod grid;
pub mod layout;
pub mod render;
pub mod scheduler;
pub mod sequencer;
pub mod timing;

pub use config::*;
pub use controller::*;
pub use event::*;
pub use fill::*;
pub use grid::*;
pub use layout::*;
pub use render::*;
pub use scheduler::*;
pub use sequencer::*;
pub use timing::*;

use thiserror::Error;

/// Replay engine errors
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Outcome error: {0}")]
    Outcome(#[from] rf_outcome::OutcomeError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Replay command queue is full")]
    CommandQueueFull,
}

pub type ReplayResult<T> = Result<T, ReplayError>;

/// Identifier of one sequence run
pub type RunId = u64;

/// Upper bound on timers processed by a single `run_until_idle` call
pub const MAX_IDLE_TASKS: usize = 1_000_000;
