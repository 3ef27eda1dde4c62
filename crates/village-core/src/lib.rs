#![deny(warnings)]

//! Core domain models and invariants for the village economy.
//!
//! This crate defines the serializable state shared by the production engine,
//! the save migrator and the runtime: the resource registry and pool, building
//! catalog and roster, research catalog, bonus sub-states, balance constants and
//! the domain events emitted by a tick.

pub mod buildings;
pub mod config;
pub mod events;
pub mod research;
pub mod resources;
pub mod state;

pub use buildings::{
    BuildingCatalog, BuildingDefinition, BuildingEffect, BuildingInstance, BuildingKind,
    ProductionStatus,
};
pub use config::{BalanceConfig, ConfigError, GrowthConfig};
pub use events::DomainEvent;
pub use research::{ResearchCatalog, ResearchDefinition};
pub use resources::{ResourceCategory, ResourceDef, ResourceKind, ResourcePool, ResourceRegistry};
pub use state::{
    ActiveEvent, BuildError, EventState, GameState, ResearchProgress, ResearchState, TributeState,
};

use thiserror::Error;

/// Validation errors raised while assembling read-only catalogs.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// The same identifier was declared twice.
    #[error("duplicate catalog id: {0}")]
    Duplicate(String),
    /// Tier outside the supported production chain [1, 3].
    #[error("tier {tier} of {id} is out of range [1, 3]")]
    InvalidTier {
        /// Offending entry.
        id: String,
        /// Declared tier.
        tier: u8,
    },
    /// A definition references a resource kind missing from the registry.
    #[error("{owner} references unknown resource {kind}")]
    UnknownResource {
        /// Entry holding the reference.
        owner: String,
        /// Referenced kind.
        kind: String,
    },
    /// Catalog text could not be parsed.
    #[error("catalog parse error: {0}")]
    Parse(String),
}

/// All read-only catalogs consumed by the engine, bundled for convenience.
#[derive(Clone, Debug)]
pub struct Catalogs {
    /// Known resource kinds.
    pub resources: ResourceRegistry,
    /// Building definitions.
    pub buildings: BuildingCatalog,
    /// Research definitions.
    pub research: ResearchCatalog,
}

impl Catalogs {
    /// Bundle catalogs after checking that buildings only reference known resources.
    pub fn new(
        resources: ResourceRegistry,
        buildings: BuildingCatalog,
        research: ResearchCatalog,
    ) -> Result<Self, CatalogError> {
        buildings.validate(&resources)?;
        Ok(Self {
            resources,
            buildings,
            research,
        })
    }

    /// The built-in village catalogs mirrored by `assets/catalog.yaml`.
    pub fn village_default() -> Self {
        Self {
            resources: ResourceRegistry::village_default(),
            buildings: BuildingCatalog::village_default(),
            research: ResearchCatalog::village_default(),
        }
    }

    /// Parse catalogs from YAML with top-level `resources`, `buildings` and `research` lists.
    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        #[derive(serde::Deserialize)]
        struct CatalogFile {
            resources: Vec<ResourceDef>,
            #[serde(default)]
            buildings: Vec<BuildingDefinition>,
            #[serde(default)]
            research: Vec<ResearchDefinition>,
        }
        let file: CatalogFile =
            serde_yaml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(
            ResourceRegistry::new(file.resources)?,
            BuildingCatalog::new(file.buildings)?,
            ResearchCatalog::new(file.research)?,
        )
    }
}
