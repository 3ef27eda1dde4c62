//! The `GameState` aggregate and its bonus sub-states.
//!
//! Field names follow the persisted save layout (camelCase). Every field has
//! a serde default so a normalized save always decodes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

use crate::buildings::{BuildingCatalog, BuildingEffect, BuildingInstance, BuildingKind, ProductionStatus};
use crate::config::{BalanceConfig, GrowthConfig};
use crate::resources::{ResourceKind, ResourcePool, ResourceRegistry};

/// Errors from roster mutations (construction, upgrade, staffing).
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("unknown building kind: {0}")]
    UnknownKind(String),
    #[error("building {0} does not exist")]
    UnknownBuilding(u64),
    #[error("not enough resources")]
    Unaffordable,
    #[error("building {id} is already at max level {max}")]
    MaxLevel { id: u64, max: u32 },
    #[error("requested {requested} workers but only {available} are free")]
    NotEnoughWorkers { requested: u32, available: u32 },
}

/// Progress of the project currently being researched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProgress {
    pub id: String,
    #[serde(default)]
    pub progress_seconds: f64,
    #[serde(default)]
    pub required_seconds: f64,
}

impl ResearchProgress {
    pub fn is_complete(&self) -> bool {
        self.progress_seconds >= self.required_seconds
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchState {
    pub completed: Vec<String>,
    /// Accumulated fractional bonus per building or resource kind.
    pub bonuses: BTreeMap<String, f64>,
    pub current: Option<ResearchProgress>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TributeState {
    pub completed: Vec<String>,
    /// Fractional bonus applied to every resource, forever.
    pub permanent_bonus: f64,
}

/// A timed event scaling resources and/or buildings while active.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEvent {
    pub id: String,
    #[serde(default)]
    pub remaining_seconds: f64,
    #[serde(default)]
    pub resource_multipliers: BTreeMap<ResourceKind, f64>,
    #[serde(default)]
    pub building_multipliers: BTreeMap<BuildingKind, f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventState {
    pub active: Option<ActiveEvent>,
}

/// Complete mutable simulation state, passed explicitly to every engine call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameState {
    pub resources: ResourcePool,
    pub buildings: Vec<BuildingInstance>,
    pub production_status: BTreeMap<u64, ProductionStatus>,
    pub population: u32,
    /// 0..=100.
    pub happiness: f64,
    /// Simulated seconds since the village was founded; drives seasons.
    pub game_time_seconds: f64,
    pub research: ResearchState,
    pub tribute: TributeState,
    pub events: EventState,
    /// One-time notices raised by save migrations, shown once by the UI.
    pub notices: Vec<String>,
    pub next_building_id: u64,
    /// Population upkeep went unpaid on the last tick.
    pub starving: bool,
    /// Fed seconds accumulated toward the next newcomer.
    pub growth_seconds: f64,
}

impl GameState {
    /// Empty state over a registry: zero stock, no buildings, neutral happiness.
    pub fn new(registry: &ResourceRegistry) -> Self {
        Self {
            resources: ResourcePool::new(registry),
            happiness: 50.0,
            next_building_id: 1,
            ..Self::default()
        }
    }

    /// Fresh game using the configured starting stock and headcount.
    pub fn fresh(registry: &ResourceRegistry, config: &BalanceConfig) -> Self {
        let mut state = Self::new(registry);
        for (kind, amount) in &config.start.resources {
            state.resources.add(kind.as_str(), *amount);
        }
        state.population = config.start.population;
        state.happiness = config.start.happiness;
        state
    }

    /// Repair a decoded save against the live catalogs: re-bind the pool,
    /// clamp upgrade levels, give every building a unique non-zero id, drop
    /// status that no longer belongs to exactly one building and keep
    /// `next_building_id` ahead of every existing id.
    pub fn repair(&mut self, registry: &ResourceRegistry, catalog: &BuildingCatalog, config: &BalanceConfig) {
        self.resources.rebind(registry);
        for b in &mut self.buildings {
            match catalog.get(b.kind.as_str()) {
                Some(def) => {
                    let max = def.max_level.min(config.upgrades.max_level);
                    b.upgrade_level = b.upgrade_level.min(max);
                }
                None => warn!(id = b.id, kind = %b.kind, "building kind missing from catalog"),
            }
        }

        let max_id = self.buildings.iter().map(|b| b.id).max().unwrap_or(0);
        self.next_building_id = self.next_building_id.max(max_id.saturating_add(1)).max(1);
        let mut seen = BTreeSet::new();
        let mut shared = BTreeSet::new();
        for b in &mut self.buildings {
            if b.id != 0 && seen.insert(b.id) {
                continue;
            }
            shared.insert(b.id);
            let fresh = self.next_building_id;
            self.next_building_id = fresh.saturating_add(1);
            warn!(old = b.id, new = fresh, kind = %b.kind, "reassigning building id");
            b.id = fresh;
            seen.insert(fresh);
        }
        self.production_status
            .retain(|id, _| seen.contains(id) && !shared.contains(id));

        if !self.happiness.is_finite() {
            self.happiness = 50.0;
        }
        self.happiness = self.happiness.clamp(0.0, 100.0);
        if !(self.growth_seconds.is_finite() && self.growth_seconds >= 0.0) {
            self.growth_seconds = 0.0;
        }
    }

    pub fn building(&self, id: u64) -> Option<&BuildingInstance> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn count_buildings(&self, kind: &str) -> usize {
        self.buildings.iter().filter(|b| b.kind.as_str() == kind).count()
    }

    pub fn assigned_workers(&self) -> u32 {
        self.buildings.iter().map(|b| b.workers).fold(0, u32::saturating_add)
    }

    pub fn free_workers(&self) -> u32 {
        self.population.saturating_sub(self.assigned_workers())
    }

    /// Headcount the village can house: the base capacity plus every
    /// housing building in the roster.
    pub fn max_population(&self, catalog: &BuildingCatalog, growth: &GrowthConfig) -> u32 {
        self.buildings
            .iter()
            .filter_map(|b| catalog.get(b.kind.as_str()))
            .filter_map(|def| match def.effect {
                Some(BuildingEffect::Housing { capacity }) => Some(capacity),
                None => None,
            })
            .fold(growth.base_capacity, u32::saturating_add)
    }

    /// Accumulate `dt` fed seconds and let newcomers move in while there is
    /// room. Returns how many arrived.
    ///
    /// A starving or full village accumulates nothing. Population above the
    /// capacity (after a hut is demolished) is never evicted.
    pub fn grow_population(&mut self, catalog: &BuildingCatalog, growth: &GrowthConfig, dt: f64) -> u32 {
        let cap = self.max_population(catalog, growth);
        if self.starving || self.population >= cap || !(dt.is_finite() && dt > 0.0) {
            self.growth_seconds = 0.0;
            return 0;
        }
        self.growth_seconds += dt;
        let room = cap - self.population;
        let due = (self.growth_seconds / growth.seconds_per_villager).floor();
        let arrived = if due >= f64::from(room) { room } else { due as u32 };
        self.population += arrived;
        self.growth_seconds -= f64::from(arrived) * growth.seconds_per_villager;
        if self.population >= cap {
            self.growth_seconds = 0.0;
        }
        arrived
    }

    pub fn is_stalled(&self, id: u64) -> bool {
        self.production_status.get(&id).map(|s| s.stalled).unwrap_or(false)
    }

    /// Pay the construction cost and append a new, unstaffed instance.
    pub fn construct(&mut self, catalog: &BuildingCatalog, kind: &str) -> Result<u64, BuildError> {
        let def = catalog
            .get(kind)
            .ok_or_else(|| BuildError::UnknownKind(kind.to_string()))?;
        if !self.resources.spend(&def.cost) {
            return Err(BuildError::Unaffordable);
        }
        let id = self.next_building_id.max(1);
        self.next_building_id = id.saturating_add(1);
        self.buildings.push(BuildingInstance::new(id, kind));
        Ok(id)
    }

    /// Remove an instance; its workers return to the free pool.
    pub fn demolish(&mut self, id: u64) -> Result<BuildingInstance, BuildError> {
        let idx = self
            .buildings
            .iter()
            .position(|b| b.id == id)
            .ok_or(BuildError::UnknownBuilding(id))?;
        self.production_status.remove(&id);
        Ok(self.buildings.remove(idx))
    }

    /// Pay for and apply one upgrade level. Returns the new level.
    pub fn upgrade(
        &mut self,
        catalog: &BuildingCatalog,
        config: &BalanceConfig,
        id: u64,
    ) -> Result<u32, BuildError> {
        let inst = self.building(id).ok_or(BuildError::UnknownBuilding(id))?;
        let def = catalog
            .get(inst.kind.as_str())
            .ok_or_else(|| BuildError::UnknownKind(inst.kind.0.clone()))?;
        let max = def.max_level.min(config.upgrades.max_level);
        if inst.upgrade_level >= max {
            return Err(BuildError::MaxLevel { id, max });
        }
        let cost = def.upgrade_cost(inst.upgrade_level);
        if !self.resources.spend(&cost) {
            return Err(BuildError::Unaffordable);
        }
        let inst = self
            .buildings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(BuildError::UnknownBuilding(id))?;
        inst.upgrade_level += 1;
        Ok(inst.upgrade_level)
    }

    /// Set the worker count of a building, bounded by free population.
    pub fn assign_workers(&mut self, id: u64, workers: u32) -> Result<(), BuildError> {
        let current = self.building(id).ok_or(BuildError::UnknownBuilding(id))?.workers;
        let available = self.free_workers().saturating_add(current);
        if workers > available {
            return Err(BuildError::NotEnoughWorkers {
                requested: workers,
                available,
            });
        }
        if let Some(inst) = self.buildings.iter_mut().find(|b| b.id == id) {
            inst.workers = workers;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ResourceRegistry, BuildingCatalog, BalanceConfig) {
        (
            ResourceRegistry::village_default(),
            BuildingCatalog::village_default(),
            BalanceConfig::default(),
        )
    }

    #[test]
    fn construct_pays_cost_and_assigns_ids() {
        let (reg, cat, cfg) = setup();
        let mut s = GameState::fresh(&reg, &cfg);
        let a = s.construct(&cat, "farm").unwrap();
        let b = s.construct(&cat, "farm").unwrap();
        assert_ne!(a, b);
        assert_eq!(s.resources.get("wood"), 60.0 - 30.0);
        assert_eq!(s.construct(&cat, "castle"), Err(BuildError::UnknownKind("castle".into())));
        assert_eq!(s.construct(&cat, "treasury"), Err(BuildError::Unaffordable));
        assert_eq!(s.count_buildings("farm"), 2);
    }

    #[test]
    fn workers_bounded_by_population() {
        let (reg, cat, cfg) = setup();
        let mut s = GameState::fresh(&reg, &cfg);
        let farm = s.construct(&cat, "farm").unwrap();
        let wc = s.construct(&cat, "woodcutter").unwrap();
        s.assign_workers(farm, 4).unwrap();
        assert_eq!(s.free_workers(), 1);
        assert_eq!(
            s.assign_workers(wc, 2),
            Err(BuildError::NotEnoughWorkers { requested: 2, available: 1 })
        );
        s.assign_workers(farm, 5).unwrap();
        assert_eq!(s.free_workers(), 0);
    }

    #[test]
    fn upgrade_respects_max_level() {
        let (reg, cat, mut cfg) = setup();
        cfg.upgrades.max_level = 1;
        let mut s = GameState::fresh(&reg, &cfg);
        s.resources.add("wood", 1_000.0);
        let farm = s.construct(&cat, "farm").unwrap();
        assert_eq!(s.upgrade(&cat, &cfg, farm), Ok(1));
        assert_eq!(s.upgrade(&cat, &cfg, farm), Err(BuildError::MaxLevel { id: farm, max: 1 }));
    }

    #[test]
    fn demolish_clears_status() {
        let (reg, cat, cfg) = setup();
        let mut s = GameState::fresh(&reg, &cfg);
        let hut = s.construct(&cat, "hut").unwrap();
        s.production_status.insert(hut, ProductionStatus { stalled: true });
        assert_eq!(s.max_population(&cat, &cfg.growth), cfg.growth.base_capacity + 4);
        s.demolish(hut).unwrap();
        assert!(s.production_status.is_empty());
        assert_eq!(s.demolish(hut), Err(BuildError::UnknownBuilding(hut)));
    }

    #[test]
    fn repair_fixes_ids_levels_and_pool() {
        let (reg, cat, cfg) = setup();
        let json = r#"{
            "resources": {"wood": 3, "mana": 1},
            "buildings": [{"id": 9, "kind": "farm", "workers": 1, "upgradeLevel": 42}],
            "productionStatus": {"9": {"stalled": true}, "4": {"stalled": true}},
            "happiness": 250
        }"#;
        let mut s: GameState = serde_json::from_str(json).unwrap();
        s.repair(&reg, &cat, &cfg);
        assert_eq!(s.next_building_id, 10);
        assert_eq!(s.buildings[0].upgrade_level, 5);
        assert!(!s.resources.is_known("mana"));
        assert!(s.resources.is_known("gold"));
        assert_eq!(s.production_status.len(), 1);
        assert_eq!(s.happiness, 100.0);
    }

    #[test]
    fn repair_gives_shared_ids_fresh_ones() {
        let (reg, cat, cfg) = setup();
        let json = r#"{
            "buildings": [
                {"id": 0, "kind": "woodcutter", "workers": 1},
                {"id": 0, "kind": "smithy", "workers": 1},
                {"id": 4, "kind": "farm"},
                {"id": 4, "kind": "quarry"}
            ],
            "productionStatus": {"0": {"stalled": true}, "4": {"stalled": true}},
            "nextBuildingId": 2
        }"#;
        let mut s: GameState = serde_json::from_str(json).unwrap();
        s.repair(&reg, &cat, &cfg);
        let ids: Vec<u64> = s.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![5, 6, 4, 7]);
        assert_eq!(s.next_building_id, 8);
        assert!(s.production_status.is_empty());

        let again = s.clone();
        s.repair(&reg, &cat, &cfg);
        assert_eq!(s, again);
    }

    #[test]
    fn population_grows_into_housing() {
        let (reg, cat, cfg) = setup();
        let mut s = GameState::fresh(&reg, &cfg);
        let step = cfg.growth.seconds_per_villager;
        assert_eq!(s.population, cfg.growth.base_capacity);
        assert_eq!(s.grow_population(&cat, &cfg.growth, step * 3.0), 0);
        assert_eq!(s.growth_seconds, 0.0);

        s.construct(&cat, "hut").unwrap();
        assert_eq!(s.grow_population(&cat, &cfg.growth, step * 0.5), 0);
        assert_eq!(s.grow_population(&cat, &cfg.growth, step * 0.5), 1);
        assert_eq!(s.grow_population(&cat, &cfg.growth, step * 10.0), 3);
        assert_eq!(s.population, s.max_population(&cat, &cfg.growth));
        assert_eq!(s.growth_seconds, 0.0);
    }

    #[test]
    fn starving_village_does_not_grow() {
        let (reg, cat, cfg) = setup();
        let mut s = GameState::fresh(&reg, &cfg);
        s.construct(&cat, "hut").unwrap();
        s.starving = true;
        let step = cfg.growth.seconds_per_villager;
        assert_eq!(s.grow_population(&cat, &cfg.growth, step * 2.0), 0);
        assert_eq!(s.population, cfg.start.population);

        let hut = s.buildings[0].id;
        s.starving = false;
        s.grow_population(&cat, &cfg.growth, step * 2.0);
        s.demolish(hut).unwrap();
        assert_eq!(s.grow_population(&cat, &cfg.growth, step), 0);
        assert_eq!(s.population, cfg.start.population + 2);
    }
}
