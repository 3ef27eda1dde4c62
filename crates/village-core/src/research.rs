//! Research definitions consumed when a project completes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CatalogError;

/// A research project. `bonuses` maps a building or resource kind to the
/// fractional production bonus granted on completion (0.1 = +10%).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Base duration at research speed 1.0.
    pub duration_seconds: f64,
    #[serde(default)]
    pub bonuses: BTreeMap<String, f64>,
    /// Projects that must be completed first.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ResearchDefinition {
    pub fn new(id: &str, duration_seconds: f64) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            duration_seconds,
            bonuses: BTreeMap::new(),
            requires: vec![],
        }
    }

    pub fn granting(mut self, kind: &str, bonus: f64) -> Self {
        self.bonuses.insert(kind.to_string(), bonus);
        self
    }

    pub fn after(mut self, id: &str) -> Self {
        self.requires.push(id.to_string());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResearchCatalog {
    defs: BTreeMap<String, ResearchDefinition>,
}

impl ResearchCatalog {
    pub fn new(defs: Vec<ResearchDefinition>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for def in defs {
            if map.contains_key(&def.id) {
                return Err(CatalogError::Duplicate(def.id));
            }
            map.insert(def.id.clone(), def);
        }
        Ok(Self { defs: map })
    }

    pub fn get(&self, id: &str) -> Option<&ResearchDefinition> {
        self.defs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResearchDefinition> {
        self.defs.values()
    }

    pub fn village_default() -> Self {
        let defs = [
            ResearchDefinition::new("crop-rotation", 300.0).granting("farm", 0.2),
            ResearchDefinition::new("sharp-axes", 300.0).granting("woodcutter", 0.25),
            ResearchDefinition::new("water-wheel", 900.0)
                .granting("sawmill", 0.3)
                .after("sharp-axes"),
            ResearchDefinition::new("metallurgy", 1200.0)
                .granting("smithy", 0.25)
                .granting("mine", 0.15),
            ResearchDefinition::new("banking", 1800.0)
                .granting("gold", 0.05)
                .after("metallurgy"),
        ];
        Self {
            defs: defs.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }
}
