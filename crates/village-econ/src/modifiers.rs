//! Modifier providers: read-only services returning one scalar per bonus type.
//!
//! Each method receives the game state as explicit context. Bonuses are
//! fractions added to 1.0 by the engine; multipliers are applied as-is.
//! The engine sanitizes whatever a provider returns through [`bonus`] and
//! [`multiplier`], so a misbehaving provider degrades to a neutral value.

use village_core::{BalanceConfig, GameState};

pub trait ModifierProviders {
    /// Research bonus for a building kind, or for a resource kind where a
    /// formula asks for one (the treasury's gold term).
    fn research_bonus(&self, state: &GameState, kind: &str) -> f64;
    fn upgrade_bonus(&self, state: &GameState, level: u32) -> f64;
    fn happiness_multiplier(&self, state: &GameState) -> f64;
    fn event_resource_multiplier(&self, state: &GameState, kind: &str) -> f64;
    fn event_building_multiplier(&self, state: &GameState, kind: &str) -> f64;
    fn season_multiplier(&self, state: &GameState, kind: &str, game_time_seconds: f64) -> f64;
    fn permanent_tribute_bonus(&self, state: &GameState) -> f64;
}

/// Non-finite or negative bonuses count as no bonus.
pub fn bonus(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        0.0
    }
}

/// Non-finite or negative multipliers count as neutral.
pub fn multiplier(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        1.0
    }
}

/// Provider with every bonus at 0 and every multiplier at 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeutralModifiers;

impl ModifierProviders for NeutralModifiers {
    fn research_bonus(&self, _: &GameState, _: &str) -> f64 {
        0.0
    }
    fn upgrade_bonus(&self, _: &GameState, _: u32) -> f64 {
        0.0
    }
    fn happiness_multiplier(&self, _: &GameState) -> f64 {
        1.0
    }
    fn event_resource_multiplier(&self, _: &GameState, _: &str) -> f64 {
        1.0
    }
    fn event_building_multiplier(&self, _: &GameState, _: &str) -> f64 {
        1.0
    }
    fn season_multiplier(&self, _: &GameState, _: &str, _: f64) -> f64 {
        1.0
    }
    fn permanent_tribute_bonus(&self, _: &GameState) -> f64 {
        0.0
    }
}

/// Provider backed by the bonus sub-states of [`GameState`] and the balance tables.
#[derive(Clone, Copy, Debug)]
pub struct StateModifiers<'a> {
    config: &'a BalanceConfig,
}

impl<'a> StateModifiers<'a> {
    pub fn new(config: &'a BalanceConfig) -> Self {
        Self { config }
    }
}

impl ModifierProviders for StateModifiers<'_> {
    fn research_bonus(&self, state: &GameState, kind: &str) -> f64 {
        state.research.bonuses.get(kind).copied().unwrap_or(0.0)
    }

    fn upgrade_bonus(&self, _: &GameState, level: u32) -> f64 {
        f64::from(level.min(self.config.upgrades.max_level)) * self.config.upgrades.bonus_per_level
    }

    fn happiness_multiplier(&self, state: &GameState) -> f64 {
        self.config.happiness.multiplier(state.happiness)
    }

    fn event_resource_multiplier(&self, state: &GameState, kind: &str) -> f64 {
        state
            .events
            .active
            .as_ref()
            .and_then(|e| e.resource_multipliers.get(kind).copied())
            .unwrap_or(1.0)
    }

    fn event_building_multiplier(&self, state: &GameState, kind: &str) -> f64 {
        state
            .events
            .active
            .as_ref()
            .and_then(|e| e.building_multipliers.get(kind).copied())
            .unwrap_or(1.0)
    }

    fn season_multiplier(&self, _: &GameState, kind: &str, game_time_seconds: f64) -> f64 {
        self.config.seasons.multiplier(kind, game_time_seconds)
    }

    fn permanent_tribute_bonus(&self, state: &GameState) -> f64 {
        state.tribute.permanent_bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use village_core::{ActiveEvent, ResourceKind, ResourceRegistry};

    #[test]
    fn sanitizers_fall_back_to_neutral() {
        assert_eq!(bonus(f64::NAN), 0.0);
        assert_eq!(bonus(-0.5), 0.0);
        assert_eq!(bonus(0.25), 0.25);
        assert_eq!(multiplier(f64::INFINITY), 1.0);
        assert_eq!(multiplier(-2.0), 1.0);
        assert_eq!(multiplier(0.0), 0.0);
    }

    #[test]
    fn state_provider_reads_sub_states() {
        let cfg = BalanceConfig::default();
        let p = StateModifiers::new(&cfg);
        let mut s = GameState::new(&ResourceRegistry::village_default());
        s.research.bonuses.insert("farm".into(), 0.2);
        s.tribute.permanent_bonus = 0.1;
        s.happiness = 90.0;
        s.events.active = Some(ActiveEvent {
            id: "harvest-festival".into(),
            remaining_seconds: 30.0,
            resource_multipliers: [(ResourceKind::new("food"), 1.5)].into_iter().collect(),
            building_multipliers: Default::default(),
        });
        assert_eq!(p.research_bonus(&s, "farm"), 0.2);
        assert_eq!(p.research_bonus(&s, "mine"), 0.0);
        assert_eq!(p.upgrade_bonus(&s, 0), 0.0);
        assert_eq!(p.upgrade_bonus(&s, 2), 0.5);
        assert_eq!(p.upgrade_bonus(&s, 99), 1.25);
        assert_eq!(p.happiness_multiplier(&s), 1.1);
        assert_eq!(p.event_resource_multiplier(&s, "food"), 1.5);
        assert_eq!(p.event_resource_multiplier(&s, "wood"), 1.0);
        assert_eq!(p.event_building_multiplier(&s, "farm"), 1.0);
        assert_eq!(p.permanent_tribute_bonus(&s), 0.1);
    }
}
