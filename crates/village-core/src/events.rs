//! Discrete domain events returned by a tick for the caller to dispatch.

use serde::{Deserialize, Serialize};

use crate::resources::ResourceKind;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A building's consumption needs went unmet (falling edge only).
    BuildingStalled { id: u64 },
    /// A previously stalled building operated again.
    BuildingResumed { id: u64 },
    /// Population upkeep for `kind` could not be fully paid.
    PopulationShortage { kind: ResourceKind },
    /// Population upkeep is fully paid again.
    PopulationFed,
    /// Newcomers moved into free housing.
    PopulationGrew { arrived: u32, population: u32 },
    ResearchCompleted { id: String },
    /// The active timed event ran out.
    EventEnded { id: String },
}
