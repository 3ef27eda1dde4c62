//! A running village: load, tick, mutate the roster, save.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use village_core::{
    ActiveEvent, BalanceConfig, BuildError, BuildingInstance, Catalogs, DomainEvent, GameState,
    ResearchProgress,
};
use village_econ::{ProductionEngine, ProductionRates, StateModifiers};

use persistence::SaveEnvelope;

use crate::catchup::{self, OfflineReport};

/// Wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Error, PartialEq)]
pub enum ResearchError {
    #[error("unknown research project: {0}")]
    Unknown(String),
    #[error("research {0} is already completed")]
    AlreadyCompleted(String),
    #[error("research {id} requires {requires}")]
    MissingPrerequisite { id: String, requires: String },
    #[error("already researching {0}")]
    Busy(String),
}

pub struct Simulation {
    catalogs: Catalogs,
    config: BalanceConfig,
    state: GameState,
    last_update_epoch_ms: i64,
}

impl Simulation {
    /// Fresh village with the configured starting stock.
    pub fn new(catalogs: Catalogs, config: BalanceConfig, now_ms: i64) -> Self {
        let state = GameState::fresh(&catalogs.resources, &config);
        Self {
            catalogs,
            config,
            state,
            last_update_epoch_ms: now_ms,
        }
    }

    /// Rebuild a session from any historical save: migrate, repair against
    /// the live catalogs, then apply the absence since the last update.
    pub fn load(
        raw: &Value,
        catalogs: Catalogs,
        config: BalanceConfig,
        now_ms: i64,
    ) -> (Self, Option<OfflineReport>) {
        let mut envelope = persistence::migrate(raw);
        envelope
            .state
            .repair(&catalogs.resources, &catalogs.buildings, &config);
        let report = {
            let engine = ProductionEngine::new(&catalogs, &config);
            let providers = StateModifiers::new(&config);
            catchup::apply(&engine, &providers, &mut envelope, now_ms)
        };
        if let Some(r) = &report {
            info!(seconds = r.seconds, "offline progress applied on load");
        }
        let sim = Self {
            catalogs,
            config,
            state: envelope.state,
            last_update_epoch_ms: now_ms,
        };
        (sim, report)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn last_update_epoch_ms(&self) -> i64 {
        self.last_update_epoch_ms
    }

    /// Advance the village by `dt` seconds of live play.
    ///
    /// Runs the production passes, then research and the active event, then
    /// moves game time forward. A non-finite or non-positive `dt` is a no-op.
    pub fn tick(&mut self, dt: f64, now_ms: i64) -> Vec<DomainEvent> {
        if !(dt.is_finite() && dt > 0.0) {
            return Vec::new();
        }
        let engine = ProductionEngine::new(&self.catalogs, &self.config);
        let providers = StateModifiers::new(&self.config);
        let mut events = engine.tick(&mut self.state, &providers, dt);

        let arrived = self
            .state
            .grow_population(&self.catalogs.buildings, &self.config.growth, dt);
        if arrived > 0 {
            info!(arrived, population = self.state.population, "newcomers arrived");
            events.push(DomainEvent::PopulationGrew {
                arrived,
                population: self.state.population,
            });
        }

        let speed = engine.research_speed_multiplier(&self.state);
        if let Some(current) = self.state.research.current.as_mut() {
            current.progress_seconds += dt * speed;
        }
        if self.state.research.current.as_ref().is_some_and(ResearchProgress::is_complete) {
            if let Some(done) = self.state.research.current.take() {
                self.complete_research(&done.id);
                events.push(DomainEvent::ResearchCompleted { id: done.id });
            }
        }

        let expired = match self.state.events.active.as_mut() {
            Some(active) => {
                active.remaining_seconds -= dt;
                active.remaining_seconds <= 0.0
            }
            None => false,
        };
        if expired {
            if let Some(ended) = self.state.events.active.take() {
                info!(id = %ended.id, "event ended");
                events.push(DomainEvent::EventEnded { id: ended.id });
            }
        }

        self.state.game_time_seconds += dt;
        self.last_update_epoch_ms = now_ms;
        events
    }

    fn complete_research(&mut self, id: &str) {
        let research = &mut self.state.research;
        if !research.completed.iter().any(|c| c == id) {
            research.completed.push(id.to_string());
        }
        match self.catalogs.research.get(id) {
            Some(def) => {
                for (kind, bonus) in &def.bonuses {
                    if bonus.is_finite() && *bonus > 0.0 {
                        *research.bonuses.entry(kind.clone()).or_insert(0.0) += bonus;
                    }
                }
                info!(id, "research completed");
            }
            None => warn!(id, "completed research missing from catalog; no bonus applied"),
        }
    }

    pub fn construct(&mut self, kind: &str) -> Result<u64, BuildError> {
        let id = self.state.construct(&self.catalogs.buildings, kind)?;
        info!(id, kind, "building constructed");
        Ok(id)
    }

    pub fn demolish(&mut self, id: u64) -> Result<BuildingInstance, BuildError> {
        self.state.demolish(id)
    }

    pub fn upgrade(&mut self, id: u64) -> Result<u32, BuildError> {
        self.state.upgrade(&self.catalogs.buildings, &self.config, id)
    }

    pub fn assign_workers(&mut self, id: u64, workers: u32) -> Result<(), BuildError> {
        self.state.assign_workers(id, workers)
    }

    /// Begin a project from the research catalog.
    pub fn start_research(&mut self, id: &str) -> Result<(), ResearchError> {
        let def = self
            .catalogs
            .research
            .get(id)
            .ok_or_else(|| ResearchError::Unknown(id.to_string()))?;
        let research = &mut self.state.research;
        if research.completed.iter().any(|c| c == id) {
            return Err(ResearchError::AlreadyCompleted(id.to_string()));
        }
        if let Some(current) = &research.current {
            return Err(ResearchError::Busy(current.id.clone()));
        }
        if let Some(missing) = def.requires.iter().find(|r| !research.completed.contains(r)) {
            return Err(ResearchError::MissingPrerequisite {
                id: id.to_string(),
                requires: missing.clone(),
            });
        }
        research.current = Some(ResearchProgress {
            id: id.to_string(),
            progress_seconds: 0.0,
            required_seconds: def.duration_seconds.max(0.0),
        });
        Ok(())
    }

    /// Record a completed tribute and its permanent bonus. A tribute pays out once.
    pub fn grant_tribute(&mut self, id: &str, bonus: f64) -> bool {
        let tribute = &mut self.state.tribute;
        if tribute.completed.iter().any(|c| c == id) {
            return false;
        }
        tribute.completed.push(id.to_string());
        if bonus.is_finite() && bonus > 0.0 {
            tribute.permanent_bonus += bonus;
        }
        true
    }

    /// Activate a timed event, replacing any running one.
    pub fn start_event(&mut self, event: ActiveEvent) {
        if let Some(prev) = &self.state.events.active {
            info!(replaced = %prev.id, id = %event.id, "event replaced");
        }
        self.state.events.active = Some(event);
    }

    /// Throw the village away and start over.
    pub fn reset(&mut self, now_ms: i64) {
        self.state = GameState::fresh(&self.catalogs.resources, &self.config);
        self.last_update_epoch_ms = now_ms;
    }

    /// Migration notices not yet shown to the player.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.state.notices)
    }

    pub fn save(&self, now_ms: i64) -> SaveEnvelope {
        let mut envelope = SaveEnvelope::new(self.state.clone(), now_ms);
        envelope.last_update_epoch_ms = self.last_update_epoch_ms;
        envelope
    }

    pub fn rates(&self) -> ProductionRates {
        let engine = ProductionEngine::new(&self.catalogs, &self.config);
        engine.total_rates(&self.state, &StateModifiers::new(&self.config))
    }
}
