//! The persisted container around a game state.

use serde::{Deserialize, Serialize};
use village_core::GameState;

use crate::migrate::CURRENT_SCHEMA_VERSION;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEnvelope {
    pub schema_version: u32,
    pub saved_at_epoch_ms: i64,
    /// Wall-clock time the state was last ticked; zero means unknown.
    pub last_update_epoch_ms: i64,
    pub state: GameState,
}

impl SaveEnvelope {
    /// Wrap a live state at the current schema version.
    pub fn new(state: GameState, now_ms: i64) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at_epoch_ms: now_ms,
            last_update_epoch_ms: now_ms,
            state,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use village_core::{BuildingInstance, ResourceRegistry};

    #[test]
    fn envelope_uses_documented_field_names() {
        let mut state = GameState::new(&ResourceRegistry::village_default());
        state.buildings.push(BuildingInstance::new(3, "farm").with_workers(2));
        let env = SaveEnvelope::new(state, 1_700_000_000_000);
        let v: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(v["schemaVersion"], CURRENT_SCHEMA_VERSION);
        assert_eq!(v["lastUpdateEpochMs"], 1_700_000_000_000i64);
        assert_eq!(v["state"]["buildings"][0]["upgradeLevel"], 0);
        assert_eq!(v["state"]["resources"]["wood"], 0.0);
    }
}
