//! Tiered production/consumption engine.
//!
//! A tick runs three passes, tier 1 then 2 then 3, each fully applied before
//! the next begins, so a processed good can consume raw output credited in
//! the same tick. Population upkeep is paid after the last pass.
//!
//! [`ProductionEngine::total_rates`] reuses [`ProductionEngine::production_amount`]
//! with `dt = 1`, which keeps live ticks and offline catch-up on one formula.

use std::collections::BTreeMap;
use tracing::debug;
use village_core::{
    BalanceConfig, BuildingDefinition, BuildingInstance, Catalogs, DomainEvent, GameState,
    ResourceKind,
};

use crate::modifiers::{bonus, multiplier, ModifierProviders};

/// Per-second production and consumption for every registry kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductionRates {
    pub production: BTreeMap<ResourceKind, f64>,
    pub consumption: BTreeMap<ResourceKind, f64>,
}

impl ProductionRates {
    fn zeroed<'k>(kinds: impl Iterator<Item = &'k ResourceKind>) -> Self {
        let zero: BTreeMap<ResourceKind, f64> = kinds.map(|k| (k.clone(), 0.0)).collect();
        Self {
            production: zero.clone(),
            consumption: zero,
        }
    }

    /// Production minus consumption for one kind.
    pub fn net(&self, kind: &str) -> f64 {
        self.production.get(kind).copied().unwrap_or(0.0)
            - self.consumption.get(kind).copied().unwrap_or(0.0)
    }

    pub fn net_rates(&self) -> BTreeMap<ResourceKind, f64> {
        self.production
            .keys()
            .chain(self.consumption.keys())
            .map(|k| (k.clone(), self.net(k.as_str())))
            .collect()
    }
}

/// Catalog rate or zero when the authored value is unusable.
fn rate(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

pub struct ProductionEngine<'a> {
    catalogs: &'a Catalogs,
    config: &'a BalanceConfig,
}

impl<'a> ProductionEngine<'a> {
    pub fn new(catalogs: &'a Catalogs, config: &'a BalanceConfig) -> Self {
        Self { catalogs, config }
    }

    pub fn config(&self) -> &BalanceConfig {
        self.config
    }

    pub fn catalogs(&self) -> &Catalogs {
        self.catalogs
    }

    /// Number of `kind` buildings, clamped to `[0, max]`.
    pub fn capped_count(&self, state: &GameState, kind: &str, max: u32) -> f64 {
        let n = state.count_buildings(kind).min(max as usize);
        n as f64
    }

    /// Research speed from the current school count.
    pub fn research_speed_multiplier(&self, state: &GameState) -> f64 {
        let school = &self.config.school;
        1.0 + self.capped_count(state, &school.kind, school.max_count)
            * bonus(school.research_speed_bonus)
    }

    /// Penalty factor while tools are depleted, for buildings at or above the
    /// configured tier. Registries without a tools kind never pay it.
    pub fn tool_shortage_penalty(&self, state: &GameState, tier: u8) -> f64 {
        let ts = &self.config.tool_shortage;
        let depleted = state.resources.is_known(&ts.tools_kind)
            && state.resources.get(&ts.tools_kind) <= 0.0;
        if depleted && tier >= ts.min_tier {
            multiplier(ts.penalty)
        } else {
            1.0
        }
    }

    /// Resource-side multiplier: market/school scaling, the treasury term for
    /// gold, happiness, active event, season and permanent tribute.
    pub fn resource_multiplier(
        &self,
        state: &GameState,
        providers: &dyn ModifierProviders,
        kind: &str,
    ) -> f64 {
        let cfg = self.config;
        let markets = self.capped_count(state, &cfg.market.kind, cfg.market.max_count);
        let schools = self.capped_count(state, &cfg.school.kind, cfg.school.max_count);
        let mut m = 1.0 + markets * bonus(cfg.market.bonus) + schools * bonus(cfg.school.bonus);
        if kind == cfg.treasury.gold_kind {
            let treasuries = self.capped_count(state, &cfg.treasury.kind, cfg.treasury.max_count);
            let per_treasury =
                bonus(cfg.treasury.base_gold_bonus) + bonus(providers.research_bonus(state, kind));
            m *= 1.0 + treasuries * per_treasury;
        }
        m * multiplier(providers.happiness_multiplier(state))
            * multiplier(providers.event_resource_multiplier(state, kind))
            * multiplier(providers.season_multiplier(state, kind, state.game_time_seconds))
            * (1.0 + bonus(providers.permanent_tribute_bonus(state)))
    }

    /// Output of `kind` by one building over `dt` seconds with the full
    /// modifier stack applied. No intermediate rounding.
    #[allow(clippy::too_many_arguments)]
    pub fn production_amount(
        &self,
        state: &GameState,
        providers: &dyn ModifierProviders,
        inst: &BuildingInstance,
        def: &BuildingDefinition,
        kind: &str,
        base: f64,
        dt: f64,
    ) -> f64 {
        rate(base)
            * dt
            * (1.0 + bonus(providers.research_bonus(state, def.kind.as_str())))
            * (1.0 + bonus(providers.upgrade_bonus(state, inst.upgrade_level)))
            * self.resource_multiplier(state, providers, kind)
            * multiplier(providers.event_building_multiplier(state, def.kind.as_str()))
            * self.tool_shortage_penalty(state, def.pass_tier())
    }

    /// Advance production and consumption by `dt` seconds.
    ///
    /// Returns the stall/resume and upkeep events raised by this tick. A
    /// non-finite or non-positive `dt` is a no-op.
    pub fn tick(
        &self,
        state: &mut GameState,
        providers: &dyn ModifierProviders,
        dt: f64,
    ) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        if !(dt.is_finite() && dt > 0.0) {
            return events;
        }
        for tier in 1..=3u8 {
            let pass: Vec<usize> = state
                .buildings
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    self.catalogs
                        .buildings
                        .get(b.kind.as_str())
                        .is_some_and(|def| def.pass_tier() == tier)
                })
                .map(|(i, _)| i)
                .collect();
            for idx in pass {
                self.run_building(state, providers, idx, dt, &mut events);
            }
        }
        self.pay_upkeep(state, dt, &mut events);
        events
    }

    fn run_building(
        &self,
        state: &mut GameState,
        providers: &dyn ModifierProviders,
        idx: usize,
        dt: f64,
        events: &mut Vec<DomainEvent>,
    ) {
        let Some(inst) = state.buildings.get(idx).cloned() else {
            return;
        };
        let Some(def) = self.catalogs.buildings.get(inst.kind.as_str()) else {
            return;
        };
        if !inst.is_operational(def) {
            if let Some(status) = state.production_status.get_mut(&inst.id) {
                status.stalled = false;
            }
            return;
        }

        let required: BTreeMap<ResourceKind, f64> = def
            .consumption
            .iter()
            .map(|(k, v)| (k.clone(), rate(*v) * dt))
            .collect();
        let was_stalled = state.is_stalled(inst.id);
        if !state.resources.has_enough(&required) {
            if !was_stalled {
                debug!(id = inst.id, kind = %inst.kind, "building stalled");
                events.push(DomainEvent::BuildingStalled { id: inst.id });
            }
            state.production_status.entry(inst.id).or_default().stalled = true;
            return;
        }

        // Multipliers read the pool as it stood before this building consumed.
        let outputs: Vec<(ResourceKind, f64)> = def
            .production
            .iter()
            .map(|(k, base)| {
                let amount =
                    self.production_amount(state, providers, &inst, def, k.as_str(), *base, dt);
                (k.clone(), amount)
            })
            .collect();

        for (kind, amount) in &required {
            state.resources.subtract(kind.as_str(), *amount);
        }
        if was_stalled {
            debug!(id = inst.id, kind = %inst.kind, "building resumed");
            events.push(DomainEvent::BuildingResumed { id: inst.id });
        }
        state.production_status.entry(inst.id).or_default().stalled = false;
        for (kind, amount) in outputs {
            state.resources.add(kind.as_str(), amount);
        }
    }

    fn pay_upkeep(&self, state: &mut GameState, dt: f64, events: &mut Vec<DomainEvent>) {
        let population = f64::from(state.population);
        let mut short = Vec::new();
        for (kind, per_capita) in &self.config.upkeep {
            let need = rate(*per_capita) * population * dt;
            if need <= 0.0 || !state.resources.is_known(kind.as_str()) {
                continue;
            }
            if !state.resources.subtract(kind.as_str(), need) {
                state.resources.adjust(kind.as_str(), -need);
                short.push(kind.clone());
            }
        }
        if short.is_empty() {
            if state.starving {
                state.starving = false;
                events.push(DomainEvent::PopulationFed);
            }
        } else if !state.starving {
            state.starving = true;
            for kind in short {
                debug!(kind = %kind, "population upkeep unpaid");
                events.push(DomainEvent::PopulationShortage { kind });
            }
        }
    }

    /// Per-second production and consumption of the current roster, without
    /// mutating anything. Staffed buildings count whether or not they are
    /// stalled; population upkeep is part of consumption.
    pub fn total_rates(
        &self,
        state: &GameState,
        providers: &dyn ModifierProviders,
    ) -> ProductionRates {
        let mut rates = ProductionRates::zeroed(state.resources.kinds());
        for inst in &state.buildings {
            let Some(def) = self.catalogs.buildings.get(inst.kind.as_str()) else {
                continue;
            };
            if !inst.is_operational(def) {
                continue;
            }
            for (kind, v) in &def.consumption {
                if let Some(slot) = rates.consumption.get_mut(kind) {
                    *slot += rate(*v);
                }
            }
            for (kind, base) in &def.production {
                let amount =
                    self.production_amount(state, providers, inst, def, kind.as_str(), *base, 1.0);
                if let Some(slot) = rates.production.get_mut(kind) {
                    *slot += amount;
                }
            }
        }
        let population = f64::from(state.population);
        for (kind, per_capita) in &self.config.upkeep {
            if let Some(slot) = rates.consumption.get_mut(kind) {
                *slot += rate(*per_capita) * population;
            }
        }
        rates
    }
}
