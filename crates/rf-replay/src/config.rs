//! Replay configuration
//!
//! Loaded from JSON or YAML. Every section has defaults, so a config file
//! only needs the fields it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rf_outcome::{BoardShape, Symbol};

use crate::fill::FillMode;
use crate::layout::{ContainerSize, LayoutConfig};
use crate::timing::TimingConfig;
use crate::{ReplayError, ReplayResult};

/// Default bonus trigger symbol
pub const DEFAULT_TRIGGER_SYMBOL: &str = "SCATTER";

/// Maximum accepted config file size (1MB)
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Reel-spin fill parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelSpinConfig {
    /// Ticks every column spins before any stop is allowed
    pub min_spin_ticks: u32,
    /// Extra ticks per column, left to right
    pub stop_stagger_ticks: u32,
    /// Settle overshoot as a fraction of cell size
    pub settle_overshoot: f64,
}

impl Default for ReelSpinConfig {
    fn default() -> Self {
        Self {
            min_spin_ticks: 12,
            stop_stagger_ticks: 4,
            settle_overshoot: 0.25,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub board: BoardShape,
    pub fill_mode: FillMode,
    pub trigger_symbol: Symbol,
    pub timing: TimingConfig,
    pub layout: LayoutConfig,
    pub reel_spin: ReelSpinConfig,
    /// Initial container size
    pub container: ContainerSize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            board: BoardShape::default(),
            fill_mode: FillMode::default(),
            trigger_symbol: Symbol::new(DEFAULT_TRIGGER_SYMBOL),
            timing: TimingConfig::default(),
            layout: LayoutConfig::default(),
            reel_spin: ReelSpinConfig::default(),
            container: ContainerSize::default(),
        }
    }
}

impl ReplayConfig {
    pub fn with_board(mut self, board: BoardShape) -> Self {
        self.board = board;
        self
    }

    pub fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn from_json_str(json: &str) -> ReplayResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> ReplayResult<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> ReplayResult<Self> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ReplayError::InvalidConfig(format!(
                "Config file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config = match extension.as_str() {
            "json" => Self::from_json_str(&text)?,
            "yaml" | "yml" => Self::from_yaml_str(&text)?,
            other => return Err(ReplayError::UnsupportedFormat(other.to_string())),
        };
        log::info!("[Replay] Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ReplayResult<()> {
        if self.board.is_empty() {
            return Err(ReplayError::InvalidConfig(format!(
                "Board must have at least one cell, got {}x{}",
                self.board.rows, self.board.cols
            )));
        }
        if self.layout.min_cell_size <= 0.0 || !self.layout.min_cell_size.is_finite() {
            return Err(ReplayError::InvalidConfig(
                "min_cell_size must be positive".to_string(),
            ));
        }
        if self.layout.max_cell_size < self.layout.min_cell_size {
            return Err(ReplayError::InvalidConfig(format!(
                "Cell size range inverted: min {} > max {}",
                self.layout.min_cell_size, self.layout.max_cell_size
            )));
        }
        if self.layout.gap < 0.0 || self.layout.padding < 0.0 {
            return Err(ReplayError::InvalidConfig(
                "gap and padding must not be negative".to_string(),
            ));
        }
        if self.timing.tick_ms == 0 {
            return Err(ReplayError::InvalidConfig("tick_ms must be at least 1".to_string()));
        }
        if self.trigger_symbol.is_blank() {
            return Err(ReplayError::InvalidConfig(
                "trigger_symbol must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingProfile;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReplayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.board, BoardShape::standard_3x5());
        assert_eq!(config.trigger_symbol.as_str(), "SCATTER");
    }

    #[test]
    fn test_partial_json() {
        let config = ReplayConfig::from_json_str(
            r#"{"board": {"rows": 5, "cols": 6}, "fill_mode": "cascade"}"#,
        )
        .unwrap();
        assert_eq!(config.board, BoardShape::tumble_5x6());
        assert_eq!(config.fill_mode, FillMode::Cascade);
        assert_eq!(config.timing, TimingConfig::normal());
    }

    #[test]
    fn test_yaml() {
        let yaml = "fill_mode: reel-spin\ntrigger_symbol: BONUS\ntiming:\n  profile: turbo\n  tick_ms: 20\nreel_spin:\n  min_spin_ticks: 6\n";
        let config = ReplayConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.fill_mode, FillMode::ReelSpin);
        assert_eq!(config.trigger_symbol.as_str(), "BONUS");
        assert_eq!(config.timing.profile, TimingProfile::Turbo);
        assert_eq!(config.timing.tick_ms, 20);
        assert_eq!(config.reel_spin.min_spin_ticks, 6);
        assert_eq!(config.reel_spin.stop_stagger_ticks, 4);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ReplayConfig::default();
        config.board = BoardShape::new(0, 5);
        assert!(matches!(config.validate(), Err(ReplayError::InvalidConfig(_))));

        let mut config = ReplayConfig::default();
        config.layout.min_cell_size = 200.0;
        assert!(config.validate().is_err());

        let mut config = ReplayConfig::default();
        config.timing.tick_ms = 0;
        assert!(config.validate().is_err());

        assert!(ReplayConfig::from_json_str(r#"{"board": {"rows": 3, "cols": 0}}"#).is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("replay.json");
        std::fs::write(&json_path, r#"{"fill_mode": "replace"}"#).unwrap();
        assert_eq!(ReplayConfig::load(&json_path).unwrap().fill_mode, FillMode::Replace);

        let yml_path = dir.path().join("replay.yml");
        let mut file = std::fs::File::create(&yml_path).unwrap();
        writeln!(file, "fill_mode: cascade").unwrap();
        assert_eq!(ReplayConfig::load(&yml_path).unwrap().fill_mode, FillMode::Cascade);

        let toml_path = dir.path().join("replay.toml");
        std::fs::write(&toml_path, "").unwrap();
        assert!(matches!(
            ReplayConfig::load(&toml_path),
            Err(ReplayError::UnsupportedFormat(_))
        ));
    }
}
