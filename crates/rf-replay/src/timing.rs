//! Timing profiles for replay phases

use serde::{Deserialize, Serialize};

/// Virtual milliseconds
pub type Millis = u64;

/// Timing profile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Normal gameplay timing
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// No delays (tests, headless verification)
    Instant,
    /// Scaled or hand-edited timing
    Custom,
}

impl TimingProfile {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Turbo => "Turbo",
            Self::Instant => "Instant",
            Self::Custom => "Custom",
        }
    }
}

impl std::str::FromStr for TimingProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "turbo" => Ok(Self::Turbo),
            "instant" => Ok(Self::Instant),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown timing profile '{}'", other)),
        }
    }
}

/// Phase durations used by the sequencer and the fill strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Profile type
    pub profile: TimingProfile,

    /// Removal effect duration (ms)
    pub remove_ms: Millis,

    /// Bonus trigger highlight duration (ms)
    pub highlight_ms: Millis,

    /// Pause between consecutive cascade steps (ms)
    pub inter_step_pause_ms: Millis,

    /// Replace mode pop-in duration (ms)
    pub pop_ms: Millis,

    /// Cascade mode start offset between columns (ms)
    pub column_stagger_ms: Millis,

    /// Cascade mode per-column drop duration (ms)
    pub drop_ms: Millis,

    /// Minimal settle time (reel stops, no-op steps) (ms)
    pub settle_ms: Millis,

    /// Reel-spin symbol tick interval (ms)
    pub tick_ms: Millis,
}

impl TimingConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            remove_ms: 350,
            highlight_ms: 1200,
            inter_step_pause_ms: 250,
            pop_ms: 300,
            column_stagger_ms: 60,
            drop_ms: 420,
            settle_ms: 120,
            tick_ms: 50,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            remove_ms: 150,
            highlight_ms: 500,
            inter_step_pause_ms: 100,
            pop_ms: 120,
            column_stagger_ms: 25,
            drop_ms: 200,
            settle_ms: 60,
            tick_ms: 30,
        }
    }

    /// Instant mode (ordering preserved, no waiting)
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            remove_ms: 0,
            highlight_ms: 0,
            inter_step_pause_ms: 0,
            pop_ms: 0,
            column_stagger_ms: 0,
            drop_ms: 0,
            settle_ms: 0,
            tick_ms: 1,
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Instant => Self::instant(),
            TimingProfile::Custom => Self::normal(),
        }
    }

    /// Scale timing by factor (< 1.0 = faster)
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: Millis| -> Millis { (ms as f64 * factor.max(0.0)).round() as Millis };
        Self {
            profile: TimingProfile::Custom,
            remove_ms: scale(self.remove_ms),
            highlight_ms: scale(self.highlight_ms),
            inter_step_pause_ms: scale(self.inter_step_pause_ms),
            pop_ms: scale(self.pop_ms),
            column_stagger_ms: scale(self.column_stagger_ms),
            drop_ms: scale(self.drop_ms),
            settle_ms: scale(self.settle_ms),
            tick_ms: scale(self.tick_ms).max(1),
        }
    }

    /// Cascade refill duration for a board with `cols` columns
    pub fn cascade_duration(&self, cols: usize) -> Millis {
        self.column_stagger_ms * cols.saturating_sub(1) as Millis + self.drop_ms
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}
