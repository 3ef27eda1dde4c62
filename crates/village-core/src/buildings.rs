//! Building definitions (read-only catalog) and built instances.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::resources::{ResourceKind, ResourceRegistry};
use crate::CatalogError;

/// Identifier of a building kind, e.g. "farm", "sawmill".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingKind(pub String);

impl BuildingKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BuildingKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional side effect carried by a building definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildingEffect {
    /// Raises the village's maximum population.
    Housing { capacity: u32 },
}

fn default_max_level() -> u32 {
    5
}

/// Static description of a building kind.
///
/// Rates are per second. Missing maps or numbers deserialize to empty/zero
/// so a malformed entry degrades to "contributes nothing".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingDefinition {
    pub kind: BuildingKind,
    #[serde(default)]
    pub name: String,
    /// Production-chain tier in [1, 3].
    pub tier: u8,
    /// One-off construction cost.
    #[serde(default)]
    pub cost: BTreeMap<ResourceKind, f64>,
    /// Inputs consumed per second while operating.
    #[serde(default)]
    pub consumption: BTreeMap<ResourceKind, f64>,
    /// Base outputs per second before modifiers.
    #[serde(default)]
    pub production: BTreeMap<ResourceKind, f64>,
    #[serde(default)]
    pub workers_needed: u32,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default)]
    pub effect: Option<BuildingEffect>,
}

impl BuildingDefinition {
    pub fn new(kind: &str, tier: u8) -> Self {
        Self {
            kind: BuildingKind::new(kind),
            name: String::new(),
            tier,
            cost: BTreeMap::new(),
            consumption: BTreeMap::new(),
            production: BTreeMap::new(),
            workers_needed: 0,
            max_level: default_max_level(),
            effect: None,
        }
    }

    pub fn producing(mut self, kind: &str, per_second: f64) -> Self {
        self.production.insert(ResourceKind::new(kind), per_second);
        self
    }

    pub fn consuming(mut self, kind: &str, per_second: f64) -> Self {
        self.consumption.insert(ResourceKind::new(kind), per_second);
        self
    }

    pub fn costing(mut self, kind: &str, amount: f64) -> Self {
        self.cost.insert(ResourceKind::new(kind), amount);
        self
    }

    pub fn staffed_by(mut self, workers: u32) -> Self {
        self.workers_needed = workers;
        self
    }

    pub fn with_effect(mut self, effect: BuildingEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Tier used for pass ordering, clamped into the production chain.
    pub fn pass_tier(&self) -> u8 {
        self.tier.clamp(1, 3)
    }

    /// Construction cost of the next upgrade: base cost scaled by the target level.
    pub fn upgrade_cost(&self, current_level: u32) -> BTreeMap<ResourceKind, f64> {
        let factor = f64::from(current_level.saturating_add(1));
        self.cost.iter().map(|(k, v)| (k.clone(), v * factor)).collect()
    }
}

/// Read-only catalog of building definitions keyed by kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildingCatalog {
    defs: BTreeMap<BuildingKind, BuildingDefinition>,
}

impl BuildingCatalog {
    pub fn new(defs: Vec<BuildingDefinition>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for def in defs {
            if !(1..=3).contains(&def.tier) {
                return Err(CatalogError::InvalidTier {
                    id: def.kind.0.clone(),
                    tier: def.tier,
                });
            }
            if map.contains_key(&def.kind) {
                return Err(CatalogError::Duplicate(def.kind.0.clone()));
            }
            map.insert(def.kind.clone(), def);
        }
        Ok(Self { defs: map })
    }

    pub fn get(&self, kind: &str) -> Option<&BuildingDefinition> {
        self.defs.get(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingDefinition> {
        self.defs.values()
    }

    /// Every resource referenced by a definition must exist in the registry.
    pub fn validate(&self, registry: &ResourceRegistry) -> Result<(), CatalogError> {
        for def in self.defs.values() {
            let referenced = def
                .cost
                .keys()
                .chain(def.consumption.keys())
                .chain(def.production.keys());
            for kind in referenced {
                if !registry.contains(kind.as_str()) {
                    return Err(CatalogError::UnknownResource {
                        owner: def.kind.0.clone(),
                        kind: kind.0.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Built-in village buildings.
    pub fn village_default() -> Self {
        let defs = vec![
            BuildingDefinition::new("hut", 1)
                .costing("wood", 20.0)
                .with_effect(BuildingEffect::Housing { capacity: 4 }),
            BuildingDefinition::new("farm", 1)
                .costing("wood", 15.0)
                .producing("food", 1.0)
                .staffed_by(2),
            BuildingDefinition::new("woodcutter", 1)
                .costing("food", 10.0)
                .producing("wood", 0.8)
                .staffed_by(1),
            BuildingDefinition::new("quarry", 1)
                .costing("wood", 25.0)
                .producing("stone", 0.5)
                .staffed_by(2),
            BuildingDefinition::new("mine", 1)
                .costing("wood", 30.0)
                .costing("stone", 10.0)
                .producing("ore", 0.4)
                .staffed_by(2),
            BuildingDefinition::new("sawmill", 2)
                .costing("wood", 40.0)
                .costing("stone", 20.0)
                .consuming("wood", 1.0)
                .producing("lumber", 0.5)
                .staffed_by(2),
            BuildingDefinition::new("smithy", 2)
                .costing("stone", 40.0)
                .costing("lumber", 10.0)
                .consuming("ore", 0.4)
                .consuming("wood", 0.2)
                .producing("tools", 0.2)
                .staffed_by(2),
            BuildingDefinition::new("bakery", 2)
                .costing("stone", 30.0)
                .costing("lumber", 10.0)
                .consuming("food", 1.0)
                .producing("bread", 0.6)
                .staffed_by(1),
            BuildingDefinition::new("workshop", 3)
                .costing("lumber", 50.0)
                .costing("tools", 10.0)
                .consuming("lumber", 0.5)
                .consuming("tools", 0.05)
                .producing("furniture", 0.2)
                .staffed_by(3),
            BuildingDefinition::new("market", 2)
                .costing("lumber", 40.0)
                .costing("stone", 40.0)
                .consuming("bread", 0.1)
                .producing("gold", 0.3)
                .staffed_by(2),
            BuildingDefinition::new("school", 2)
                .costing("lumber", 60.0)
                .costing("stone", 30.0)
                .staffed_by(1),
            BuildingDefinition::new("treasury", 3)
                .costing("stone", 100.0)
                .costing("gold", 50.0)
                .consuming("furniture", 0.05)
                .producing("gold", 0.5)
                .staffed_by(2),
        ];
        let mut map = BTreeMap::new();
        for def in defs {
            map.insert(def.kind.clone(), def);
        }
        Self { defs: map }
    }
}

/// A concrete built unit owned by the game state's roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingInstance {
    pub id: u64,
    pub kind: BuildingKind,
    #[serde(default)]
    pub workers: u32,
    #[serde(default)]
    pub upgrade_level: u32,
}

impl BuildingInstance {
    pub fn new(id: u64, kind: &str) -> Self {
        Self {
            id,
            kind: BuildingKind::new(kind),
            workers: 0,
            upgrade_level: 0,
        }
    }

    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    /// Unstaffed buildings that require workers are inoperative.
    pub fn is_operational(&self, def: &BuildingDefinition) -> bool {
        def.workers_needed == 0 || self.workers > 0
    }
}

/// Per-instance production flag from the most recent tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStatus {
    /// Consumption needs went unmet on the last tick.
    #[serde(default)]
    pub stalled: bool,
}
