//! Balance constants for the production engine, loaded from YAML.
//!
//! Every section has defaults matching the shipped `assets/balance.yaml`, so
//! a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::resources::ResourceKind;

/// Errors that can occur when loading balance configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A value parsed but violates a balance invariant.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level balance configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Wall-clock length of one live tick.
    pub tick_seconds: f64,
    pub market: ScalingBuilding,
    pub school: SchoolConfig,
    pub treasury: TreasuryConfig,
    pub tool_shortage: ToolShortageConfig,
    pub upgrades: UpgradeConfig,
    pub happiness: HappinessConfig,
    pub seasons: SeasonConfig,
    pub offline: OfflineConfig,
    /// Per-villager consumption per second.
    pub upkeep: BTreeMap<ResourceKind, f64>,
    pub growth: GrowthConfig,
    /// Stock and headcount of a fresh game.
    pub start: StartConfig,
}

/// A building whose count scales every resource's output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalingBuilding {
    pub kind: String,
    /// Additive bonus per counted building.
    pub bonus: f64,
    /// Counts above this are ignored.
    pub max_count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchoolConfig {
    pub kind: String,
    pub bonus: f64,
    pub max_count: u32,
    /// Additive research speed per counted school.
    pub research_speed_bonus: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreasuryConfig {
    pub kind: String,
    /// The only resource the treasury term applies to.
    pub gold_kind: String,
    pub base_gold_bonus: f64,
    pub max_count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolShortageConfig {
    pub tools_kind: String,
    /// Output factor while tools are depleted, in (0, 1].
    pub penalty: f64,
    /// Lowest building tier the penalty applies to.
    pub min_tier: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub bonus_per_level: f64,
    pub max_level: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HappinessConfig {
    pub low_threshold: f64,
    pub low_multiplier: f64,
    pub high_threshold: f64,
    pub high_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub name: String,
    /// Resource kinds absent from the map use 1.0.
    #[serde(default)]
    pub multipliers: BTreeMap<ResourceKind, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub length_seconds: f64,
    pub cycle: Vec<Season>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Absences shorter than this produce no catch-up.
    pub min_seconds: u64,
    /// Hard cap on simulated absence.
    pub max_seconds: u64,
}

/// Newcomers arrive while the village is fed and has room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Headcount housed without any housing building.
    pub base_capacity: u32,
    /// Fed seconds per newcomer.
    pub seconds_per_villager: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartConfig {
    pub population: u32,
    pub happiness: f64,
    pub resources: BTreeMap<ResourceKind, f64>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        let kinds = |pairs: &[(&str, f64)]| -> BTreeMap<ResourceKind, f64> {
            pairs
                .iter()
                .map(|(k, v)| (ResourceKind::new(*k), *v))
                .collect()
        };
        Self {
            tick_seconds: 1.0,
            market: ScalingBuilding {
                kind: "market".into(),
                bonus: 0.05,
                max_count: 10,
            },
            school: SchoolConfig {
                kind: "school".into(),
                bonus: 0.03,
                max_count: 10,
                research_speed_bonus: 0.1,
            },
            treasury: TreasuryConfig {
                kind: "treasury".into(),
                gold_kind: "gold".into(),
                base_gold_bonus: 0.02,
                max_count: 10,
            },
            tool_shortage: ToolShortageConfig {
                tools_kind: "tools".into(),
                penalty: 0.5,
                min_tier: 2,
            },
            upgrades: UpgradeConfig {
                bonus_per_level: 0.25,
                max_level: 5,
            },
            happiness: HappinessConfig {
                low_threshold: 30.0,
                low_multiplier: 0.8,
                high_threshold: 70.0,
                high_multiplier: 1.1,
            },
            seasons: SeasonConfig {
                length_seconds: 600.0,
                cycle: vec![
                    Season {
                        name: "spring".into(),
                        multipliers: kinds(&[("food", 1.1)]),
                    },
                    Season {
                        name: "summer".into(),
                        multipliers: kinds(&[("food", 1.25)]),
                    },
                    Season {
                        name: "autumn".into(),
                        multipliers: kinds(&[("food", 1.0), ("wood", 1.1)]),
                    },
                    Season {
                        name: "winter".into(),
                        multipliers: kinds(&[("food", 0.6), ("wood", 0.9)]),
                    },
                ],
            },
            offline: OfflineConfig {
                min_seconds: 60,
                max_seconds: 28_800,
            },
            upkeep: kinds(&[("food", 0.05)]),
            growth: GrowthConfig {
                base_capacity: 5,
                seconds_per_villager: 60.0,
            },
            start: StartConfig {
                population: 5,
                happiness: 50.0,
                resources: kinds(&[("food", 50.0), ("wood", 60.0)]),
            },
        }
    }
}

impl SeasonConfig {
    /// Index of the season active at `game_time_seconds`.
    pub fn index_at(&self, game_time_seconds: f64) -> Option<usize> {
        if self.cycle.is_empty() || !(self.length_seconds > 0.0) {
            return None;
        }
        let t = if game_time_seconds.is_finite() {
            game_time_seconds.max(0.0)
        } else {
            0.0
        };
        let n = self.cycle.len();
        Some(((t / self.length_seconds).floor() as u64 % n as u64) as usize)
    }

    pub fn current(&self, game_time_seconds: f64) -> Option<&Season> {
        self.index_at(game_time_seconds).and_then(|i| self.cycle.get(i))
    }

    /// Season multiplier for a resource kind; 1.0 when unlisted.
    pub fn multiplier(&self, kind: &str, game_time_seconds: f64) -> f64 {
        self.current(game_time_seconds)
            .and_then(|s| s.multipliers.get(kind).copied())
            .unwrap_or(1.0)
    }
}

impl HappinessConfig {
    pub fn multiplier(&self, happiness: f64) -> f64 {
        if happiness < self.low_threshold {
            self.low_multiplier
        } else if happiness >= self.high_threshold {
            self.high_multiplier
        } else {
            1.0
        }
    }
}

impl BalanceConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(ConfigError::Invalid("tick_seconds must be > 0".into()));
        }
        let p = self.tool_shortage.penalty;
        if !(p.is_finite() && p > 0.0 && p <= 1.0) {
            return Err(ConfigError::Invalid(
                "tool_shortage.penalty must be in (0, 1]".into(),
            ));
        }
        if self.offline.min_seconds > self.offline.max_seconds {
            return Err(ConfigError::Invalid(
                "offline.min_seconds exceeds offline.max_seconds".into(),
            ));
        }
        if !(self.seasons.length_seconds > 0.0) {
            return Err(ConfigError::Invalid(
                "seasons.length_seconds must be > 0".into(),
            ));
        }
        let g = self.growth.seconds_per_villager;
        if !(g.is_finite() && g > 0.0) {
            return Err(ConfigError::Invalid(
                "growth.seconds_per_villager must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn shipped_balance_matches_defaults() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/balance.yaml");
        let cfg = BalanceConfig::load(path).unwrap();
        assert_eq!(cfg, BalanceConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = BalanceConfig::from_yaml_str("tick_seconds: 0.5\n").unwrap();
        assert_eq!(cfg.tick_seconds, 0.5);
        assert_eq!(cfg.offline.max_seconds, 28_800);
    }

    #[test]
    fn invalid_penalty_is_rejected() {
        let text = "tool_shortage:\n  tools_kind: tools\n  penalty: 1.5\n  min_tier: 2\n";
        assert!(matches!(
            BalanceConfig::from_yaml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_growth_interval_is_rejected() {
        let text = "growth:\n  base_capacity: 5\n  seconds_per_villager: 0\n";
        assert!(matches!(
            BalanceConfig::from_yaml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn seasons_cycle_with_game_time() {
        let s = BalanceConfig::default().seasons;
        assert_eq!(s.current(0.0).map(|s| s.name.as_str()), Some("spring"));
        assert_eq!(s.current(1_900.0).map(|s| s.name.as_str()), Some("winter"));
        assert_eq!(s.current(2_400.0).map(|s| s.name.as_str()), Some("spring"));
        assert_eq!(s.multiplier("food", 1_900.0), 0.6);
        assert_eq!(s.multiplier("stone", 1_900.0), 1.0);
    }

    #[test]
    fn happiness_thresholds() {
        let h = BalanceConfig::default().happiness;
        assert_eq!(h.multiplier(10.0), 0.8);
        assert_eq!(h.multiplier(50.0), 1.0);
        assert_eq!(h.multiplier(70.0), 1.1);
    }
}
