//! Save-schema migration chain.
//!
//! Works on untyped JSON so that any historical save shape can be read. Each
//! step upgrades the state by exactly one version and is followed by the
//! normalization pass; the pass runs once more at the end regardless of the
//! starting version, so the output always decodes into [`GameState`].

use serde_json::{json, Map, Value};
use tracing::{info, warn};
use village_core::GameState;

use crate::envelope::SaveEnvelope;
use crate::normalize::normalize_state;

pub const CURRENT_SCHEMA_VERSION: u32 = 5;
pub const OLDEST_SCHEMA_VERSION: u32 = 1;

/// Notice raised once for saves predating the tool-shortage penalty.
pub const TOOL_SHORTAGE_NOTICE: &str = "tool-shortage-penalty";

type Step = fn(&mut Map<String, Value>);

/// `(from_version, step)`; step `n` turns a version `n` state into `n + 1`.
const STEPS: &[(u32, Step)] = &[
    (1, add_progression_fields),
    (2, nest_research),
    (3, nest_tribute),
    (4, announce_tool_shortage),
];

/// Migrate a raw save into a current-version envelope. Never fails: if the
/// normalized state still does not decode, the top-level fields that do
/// decode are kept and the rest fall back to their defaults.
pub fn migrate(raw: &Value) -> SaveEnvelope {
    let value = migrate_value(raw);
    let state = decode_state(&value["state"]);
    SaveEnvelope {
        schema_version: read_u32(&value["schemaVersion"]).unwrap_or(CURRENT_SCHEMA_VERSION),
        saved_at_epoch_ms: read_timestamp(&value["savedAtEpochMs"]),
        last_update_epoch_ms: read_timestamp(&value["lastUpdateEpochMs"]),
        state,
    }
}

/// The untyped half of [`migrate`]: returns the envelope as JSON.
pub fn migrate_value(raw: &Value) -> Value {
    let mut version = read_version(raw);
    let mut state = match raw.get("state") {
        Some(state) if state.is_object() => state.clone(),
        _ if raw.get("schemaVersion").is_none() && raw.is_object() => raw.clone(),
        _ => json!({}),
    };
    if let Some(obj) = state.as_object_mut() {
        // A bare state carries its own envelope keys at top level.
        for key in ["schemaVersion", "savedAtEpochMs", "lastUpdateEpochMs"] {
            obj.remove(key);
        }
    }

    if version > CURRENT_SCHEMA_VERSION {
        warn!(version, current = CURRENT_SCHEMA_VERSION, "save is newer than this build; keeping its version");
    } else if version < CURRENT_SCHEMA_VERSION {
        info!(from = version, to = CURRENT_SCHEMA_VERSION, "migrating save");
    }

    normalize_state(&mut state);
    for (from, step) in STEPS {
        if version != *from {
            continue;
        }
        if let Some(obj) = state.as_object_mut() {
            step(obj);
        }
        normalize_state(&mut state);
        version += 1;
    }
    normalize_state(&mut state);

    json!({
        "schemaVersion": version,
        "savedAtEpochMs": read_timestamp(&raw["savedAtEpochMs"]),
        "lastUpdateEpochMs": read_timestamp(&raw["lastUpdateEpochMs"]),
        "state": state,
    })
}

fn decode_state(state: &Value) -> GameState {
    let err = match serde_json::from_value::<GameState>(state.clone()) {
        Ok(decoded) => return decoded,
        Err(err) => err,
    };
    warn!(%err, "migrated state does not decode; keeping the fields that do");
    let mut kept = Map::new();
    for (key, field) in state.as_object().into_iter().flatten() {
        kept.insert(key.clone(), field.clone());
        if serde_json::from_value::<GameState>(Value::Object(kept.clone())).is_err() {
            warn!(field = %key, "dropping undecodable field");
            kept.remove(key);
        }
    }
    serde_json::from_value(Value::Object(kept)).unwrap_or_default()
}

fn read_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn read_u32(v: &Value) -> Option<u32> {
    read_number(v).map(|n| n.floor().clamp(0.0, f64::from(u32::MAX)) as u32)
}

/// Missing or malformed tags mean the oldest version; tags below it are raised to it.
fn read_version(raw: &Value) -> u32 {
    read_u32(&raw["schemaVersion"])
        .unwrap_or(OLDEST_SCHEMA_VERSION)
        .max(OLDEST_SCHEMA_VERSION)
}

/// Epoch milliseconds, floored at zero; zero means unknown.
fn read_timestamp(v: &Value) -> i64 {
    read_number(v)
        .map(|n| n.floor().clamp(0.0, i64::MAX as f64) as i64)
        .unwrap_or(0)
}

/// Null, empty, or zero: what normalization inserts for a missing field.
fn is_vacant(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(_) => false,
    }
}

fn object_at<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    if !map.get(key).is_some_and(Value::is_object) {
        map.insert(key.to_string(), Value::Object(Map::new()));
    }
    map.get_mut(key).and_then(Value::as_object_mut)
}

/// Move a legacy value into `target[key]` unless the target already holds real data.
fn adopt(target: &mut Map<String, Value>, key: &str, legacy: Option<Value>) {
    let Some(legacy) = legacy.filter(|v| !is_vacant(v)) else {
        return;
    };
    if target.get(key).map_or(true, is_vacant) {
        target.insert(key.to_string(), legacy);
    }
}

fn rename(map: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(v) = map.remove(from) {
        adopt(map, to, Some(v));
    }
}

/// v1 → v2: upgrade levels, happiness and game time.
fn add_progression_fields(state: &mut Map<String, Value>) {
    if let Some(Value::Array(buildings)) = state.get_mut("buildings") {
        for b in buildings.iter_mut().filter_map(Value::as_object_mut) {
            b.entry("upgradeLevel").or_insert_with(|| json!(0));
        }
    }
    state.entry("happiness").or_insert_with(|| json!(50.0));
    state.entry("gameTimeSeconds").or_insert_with(|| json!(0.0));
}

/// v2 → v3: building `type` becomes `kind`; flat research fields move under `research`.
fn nest_research(state: &mut Map<String, Value>) {
    if let Some(Value::Array(buildings)) = state.get_mut("buildings") {
        for b in buildings.iter_mut().filter_map(Value::as_object_mut) {
            rename(b, "type", "kind");
        }
    }
    let completed = state.remove("completedResearch");
    let bonuses = state.remove("researchBonuses");
    let current = state.remove("currentResearch").map(|mut current| {
        if let Some(c) = current.as_object_mut() {
            rename(c, "progress", "progressSeconds");
            rename(c, "duration", "requiredSeconds");
        }
        current
    });
    if let Some(research) = object_at(state, "research") {
        adopt(research, "completed", completed);
        adopt(research, "bonuses", bonuses);
        adopt(research, "current", current);
    }
}

/// v3 → v4: flat tribute fields move under `tribute`.
fn nest_tribute(state: &mut Map<String, Value>) {
    let bonus = state.remove("tributeBonus");
    let completed = state.remove("completedTributes");
    if let Some(tribute) = object_at(state, "tribute") {
        adopt(tribute, "permanentBonus", bonus);
        adopt(tribute, "completed", completed);
    }
}

/// v4 → v5: producers now need tools; tell the player once.
fn announce_tool_shortage(state: &mut Map<String, Value>) {
    let notices = state.entry("notices").or_insert_with(|| json!([]));
    if !notices.is_array() {
        *notices = json!([]);
    }
    if let Value::Array(list) = notices {
        if !list.iter().any(|n| n.as_str() == Some(TOOL_SHORTAGE_NOTICE)) {
            list.push(json!(TOOL_SHORTAGE_NOTICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v1_save() -> Value {
        json!({
            "schemaVersion": 1,
            "savedAtEpochMs": 1_700_000_000_000i64,
            "lastUpdateEpochMs": 1_700_000_000_000i64,
            "state": {
                "resources": {"wood": 40, "food": "12"},
                "buildings": [{"id": 1, "type": "farm", "workers": 2}],
                "population": 5,
                "completedResearch": ["crop-rotation"],
                "researchBonuses": {"farm": 0.1},
                "currentResearch": {"id": "sharp-axes", "progress": 30, "duration": 120},
                "tributeBonus": 0.05
            }
        })
    }

    fn v2_save() -> Value {
        json!({
            "schemaVersion": 2,
            "savedAtEpochMs": 1_700_000_000_000i64,
            "lastUpdateEpochMs": 1_700_000_000_000i64,
            "state": {
                "resources": {"wood": 40.0, "food": 12.0},
                "buildings": [{"id": 1, "type": "farm", "workers": 2, "upgradeLevel": 0}],
                "population": 5,
                "happiness": 50,
                "gameTimeSeconds": 0,
                "completedResearch": ["crop-rotation"],
                "researchBonuses": {"farm": 0.1},
                "currentResearch": {"id": "sharp-axes", "progress": 30, "duration": 120},
                "tributeBonus": 0.05
            }
        })
    }

    #[test]
    fn v1_and_v2_converge() {
        let a = migrate_value(&v1_save());
        let b = migrate_value(&v2_save());
        assert_eq!(a, b);
        assert_eq!(a["schemaVersion"], CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn chain_restructures_legacy_fields() {
        let env = migrate(&v1_save());
        assert_eq!(env.schema_version, CURRENT_SCHEMA_VERSION);
        let s = &env.state;
        assert_eq!(s.buildings[0].kind.as_str(), "farm");
        assert_eq!(s.buildings[0].upgrade_level, 0);
        assert_eq!(s.resources.get("food"), 12.0);
        assert_eq!(s.happiness, 50.0);
        assert_eq!(s.research.completed, vec!["crop-rotation".to_string()]);
        assert_eq!(s.research.bonuses.get("farm"), Some(&0.1));
        let current = s.research.current.as_ref().unwrap();
        assert_eq!(current.progress_seconds, 30.0);
        assert_eq!(current.required_seconds, 120.0);
        assert_eq!(s.tribute.permanent_bonus, 0.05);
        assert_eq!(s.notices, vec![TOOL_SHORTAGE_NOTICE.to_string()]);
        assert_eq!(env.last_update_epoch_ms, 1_700_000_000_000);
    }

    #[test]
    fn current_version_is_untouched_by_rerun() {
        let once = migrate_value(&v1_save());
        let twice = migrate_value(&once);
        assert_eq!(once, twice);
        let notices = twice["state"]["notices"].as_array().unwrap();
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn notice_is_not_duplicated() {
        let raw = json!({
            "schemaVersion": 4,
            "state": {"notices": [TOOL_SHORTAGE_NOTICE, "welcome"]}
        });
        let env = migrate(&raw);
        assert_eq!(env.state.notices, vec![TOOL_SHORTAGE_NOTICE.to_string(), "welcome".into()]);
    }

    #[test]
    fn nested_values_win_over_legacy_ones() {
        let raw = json!({
            "schemaVersion": 2,
            "state": {
                "research": {"completed": ["metallurgy"]},
                "completedResearch": ["crop-rotation"]
            }
        });
        let env = migrate(&raw);
        assert_eq!(env.state.research.completed, vec!["metallurgy".to_string()]);
    }

    #[test]
    fn missing_version_tag_is_oldest() {
        let raw = json!({
            "resources": {"wood": 7},
            "buildings": [{"id": 4, "type": "woodcutter", "workers": 1}]
        });
        let env = migrate(&raw);
        assert_eq!(env.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(env.state.buildings[0].kind.as_str(), "woodcutter");
        assert_eq!(env.state.resources.get("wood"), 7.0);
        assert_eq!(env.last_update_epoch_ms, 0);
    }

    #[test]
    fn garbage_yields_empty_current_state() {
        for raw in [json!(null), json!(42), json!("save"), json!([1, 2])] {
            let env = migrate(&raw);
            assert_eq!(env.schema_version, CURRENT_SCHEMA_VERSION);
            assert!(env.state.buildings.is_empty());
            assert_eq!(env.saved_at_epoch_ms, 0);
        }
    }

    #[test]
    fn future_version_is_kept_and_normalized() {
        let raw = json!({
            "schemaVersion": 99,
            "lastUpdateEpochMs": -5,
            "state": {"resources": {"wood": -3}, "novelField": true}
        });
        let v = migrate_value(&raw);
        assert_eq!(v["schemaVersion"], 99);
        assert_eq!(v["lastUpdateEpochMs"], 0);
        assert_eq!(v["state"]["resources"]["wood"], 0.0);
        assert_eq!(v["state"]["novelField"], true);
        assert!(v["state"]["notices"].as_array().unwrap().is_empty());
    }

    #[test]
    fn noncanonical_status_keys_do_not_wipe_the_save() {
        let raw = json!({
            "schemaVersion": 5,
            "state": {
                "resources": {"wood": 500},
                "buildings": [{"id": 5, "kind": "farm", "workers": 2}],
                "productionStatus": {"+5": {"stalled": true}}
            }
        });
        let env = migrate(&raw);
        assert_eq!(env.state.resources.get("wood"), 500.0);
        assert_eq!(env.state.buildings.len(), 1);
        assert_eq!(env.state.buildings[0].workers, 2);
        assert!(env.state.production_status.get(&5).is_some_and(|s| s.stalled));
    }

    #[test]
    fn undecodable_field_falls_back_alone() {
        let state = json!({
            "resources": {"wood": 3.0},
            "population": "many",
            "buildings": [{"id": 2, "kind": "farm"}]
        });
        let decoded = decode_state(&state);
        assert_eq!(decoded.population, 0);
        assert_eq!(decoded.resources.get("wood"), 3.0);
        assert_eq!(decoded.buildings.len(), 1);
        assert_eq!(decode_state(&json!(7)), GameState::default());
    }

    #[test]
    fn odd_version_tags_are_read() {
        assert_eq!(read_version(&json!({"schemaVersion": "3"})), 3);
        assert_eq!(read_version(&json!({"schemaVersion": 0})), 1);
        assert_eq!(read_version(&json!({"schemaVersion": -7})), 1);
        assert_eq!(read_version(&json!({"schemaVersion": "x"})), 1);
    }

    proptest! {
        #[test]
        fn version_never_decreases(v in 0u32..10, wood in -1e6f64..1e6) {
            let raw = json!({"schemaVersion": v, "state": {"resources": {"wood": wood}}});
            let out = migrate_value(&raw);
            let got = out["schemaVersion"].as_u64().unwrap() as u32;
            prop_assert!(got >= v);
            prop_assert!(got >= CURRENT_SCHEMA_VERSION);
            prop_assert!(out["state"]["resources"]["wood"].as_f64().unwrap() >= 0.0);
        }
    }
}
