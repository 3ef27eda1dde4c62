//! Declarative schema normalization for decoded save states.
//!
//! Every invariant the typed [`village_core::GameState`] relies on is listed
//! once in [`STATE_RULES`] as `(path, default, coercion)`. Paths are relative
//! to the state object; a `*` segment fans out over array elements or map
//! values. Rules run in order, so a parent object is ensured before the rules
//! that reach inside it.
//!
//! Numeric output is canonical (floats stay floats, counts stay integers), so
//! running the pass twice, or on saves that took different migration routes,
//! yields field-for-field identical JSON.

use serde_json::{json, Map, Value};

const WILDCARD: &str = "*";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Coercion {
    /// Must be an object.
    Object,
    /// Object or null; anything else becomes null.
    OptionalObject,
    /// Must be an array.
    Array,
    /// Array whose non-object elements are dropped.
    ArrayOfObjects,
    /// Object keyed by building ids. Keys are rewritten in canonical decimal
    /// form; keys that are not ids are dropped.
    IdMap,
    /// Finite float clamped into `[min, max]`; numeric strings are parsed.
    Number { min: f64, max: f64 },
    /// Non-negative integer no larger than `max`; fractions are floored.
    Count { max: u64 },
    Text,
    Flag,
}

pub struct NormalizeRule {
    pub path: &'static [&'static str],
    pub default: fn() -> Value,
    pub coercion: Coercion,
}

enum Verdict {
    Keep,
    Replace(Value),
    Default,
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

impl Coercion {
    fn judge(self, v: &mut Value) -> Verdict {
        match self {
            Coercion::Object if v.is_object() => Verdict::Keep,
            Coercion::OptionalObject if v.is_object() || v.is_null() => Verdict::Keep,
            Coercion::OptionalObject => Verdict::Replace(Value::Null),
            Coercion::Array if v.is_array() => Verdict::Keep,
            Coercion::ArrayOfObjects => match v {
                Value::Array(items) => {
                    items.retain(Value::is_object);
                    Verdict::Keep
                }
                _ => Verdict::Default,
            },
            Coercion::IdMap => match v {
                Value::Object(map) => {
                    let mut canonical = Map::new();
                    for (key, entry) in std::mem::take(map) {
                        let Ok(id) = key.parse::<u64>() else {
                            continue;
                        };
                        let id = id.to_string();
                        // An exact key beats a padded or signed spelling of the same id.
                        if id == key {
                            canonical.insert(id, entry);
                        } else {
                            canonical.entry(id).or_insert(entry);
                        }
                    }
                    *map = canonical;
                    Verdict::Keep
                }
                _ => Verdict::Default,
            },
            Coercion::Number { min, max } => match as_number(v) {
                Some(n) => Verdict::Replace(Value::from(n.clamp(min, max))),
                None => Verdict::Default,
            },
            Coercion::Count { max } => match as_number(v) {
                Some(n) => {
                    let n = n.max(0.0).floor();
                    let n = if n >= max as f64 { max } else { n as u64 };
                    Verdict::Replace(Value::from(n))
                }
                None => Verdict::Default,
            },
            Coercion::Text => match v {
                Value::String(_) => Verdict::Keep,
                Value::Number(n) => Verdict::Replace(Value::String(n.to_string())),
                _ => Verdict::Default,
            },
            Coercion::Flag => match v {
                Value::Bool(_) => Verdict::Keep,
                Value::Number(n) => Verdict::Replace(Value::Bool(n.as_f64() != Some(0.0))),
                _ => Verdict::Default,
            },
            _ => Verdict::Default,
        }
    }
}

impl NormalizeRule {
    fn fix(&self, slot: &mut Value) {
        match self.coercion.judge(slot) {
            Verdict::Keep => {}
            Verdict::Replace(v) => *slot = v,
            Verdict::Default => {
                *slot = (self.default)();
                // Defaults go through the same coercion so they are canonical too.
                if let Verdict::Replace(v) = self.coercion.judge(slot) {
                    *slot = v;
                }
            }
        }
    }

    fn apply(&self, node: &mut Value, path: &[&str]) {
        match path {
            [] => {}
            [last] if *last == WILDCARD => {
                for child in children_mut(node) {
                    self.fix(child);
                }
            }
            [last] => {
                if let Value::Object(map) = node {
                    let slot = map.entry(last.to_string()).or_insert_with(self.default);
                    self.fix(slot);
                }
            }
            [head, rest @ ..] if *head == WILDCARD => {
                for child in children_mut(node) {
                    self.apply(child, rest);
                }
            }
            [head, rest @ ..] => {
                if let Some(child) = node.as_object_mut().and_then(|m| m.get_mut(*head)) {
                    self.apply(child, rest);
                }
            }
        }
    }
}

fn children_mut(node: &mut Value) -> Vec<&mut Value> {
    match node {
        Value::Array(items) => items.iter_mut().collect(),
        Value::Object(map) => map.values_mut().collect(),
        _ => Vec::new(),
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
fn empty_array() -> Value {
    json!([])
}
fn null() -> Value {
    Value::Null
}
fn zero() -> Value {
    json!(0)
}
fn one() -> Value {
    json!(1.0)
}
fn fifty() -> Value {
    json!(50.0)
}
fn empty_text() -> Value {
    json!("")
}
fn no() -> Value {
    json!(false)
}

const AMOUNT: Coercion = Coercion::Number {
    min: 0.0,
    max: f64::MAX,
};
const ID: Coercion = Coercion::Count { max: u64::MAX };
const SMALL_COUNT: Coercion = Coercion::Count {
    max: u32::MAX as u64,
};

macro_rules! rule {
    ([$($seg:literal),+], $default:ident, $coercion:expr) => {
        NormalizeRule {
            path: &[$($seg),+],
            default: $default,
            coercion: $coercion,
        }
    };
}

/// Invariants of a decodable game state, parents before children.
pub const STATE_RULES: &[NormalizeRule] = &[
    rule!(["resources"], empty_object, Coercion::Object),
    rule!(["resources", "*"], zero, AMOUNT),
    rule!(["buildings"], empty_array, Coercion::ArrayOfObjects),
    rule!(["buildings", "*", "id"], zero, ID),
    rule!(["buildings", "*", "kind"], empty_text, Coercion::Text),
    rule!(["buildings", "*", "workers"], zero, SMALL_COUNT),
    rule!(["buildings", "*", "upgradeLevel"], zero, SMALL_COUNT),
    rule!(["productionStatus"], empty_object, Coercion::IdMap),
    rule!(["productionStatus", "*"], empty_object, Coercion::Object),
    rule!(["productionStatus", "*", "stalled"], no, Coercion::Flag),
    rule!(["population"], zero, SMALL_COUNT),
    rule!(
        ["happiness"],
        fifty,
        Coercion::Number {
            min: 0.0,
            max: 100.0
        }
    ),
    rule!(["gameTimeSeconds"], zero, AMOUNT),
    rule!(["research"], empty_object, Coercion::Object),
    rule!(["research", "completed"], empty_array, Coercion::Array),
    rule!(["research", "completed", "*"], empty_text, Coercion::Text),
    rule!(["research", "bonuses"], empty_object, Coercion::Object),
    rule!(["research", "bonuses", "*"], zero, AMOUNT),
    rule!(["research", "current"], null, Coercion::OptionalObject),
    rule!(["research", "current", "id"], empty_text, Coercion::Text),
    rule!(["research", "current", "progressSeconds"], zero, AMOUNT),
    rule!(["research", "current", "requiredSeconds"], zero, AMOUNT),
    rule!(["tribute"], empty_object, Coercion::Object),
    rule!(["tribute", "completed"], empty_array, Coercion::Array),
    rule!(["tribute", "completed", "*"], empty_text, Coercion::Text),
    rule!(["tribute", "permanentBonus"], zero, AMOUNT),
    rule!(["events"], empty_object, Coercion::Object),
    rule!(["events", "active"], null, Coercion::OptionalObject),
    rule!(["events", "active", "id"], empty_text, Coercion::Text),
    rule!(["events", "active", "remainingSeconds"], zero, AMOUNT),
    rule!(["events", "active", "resourceMultipliers"], empty_object, Coercion::Object),
    rule!(["events", "active", "resourceMultipliers", "*"], one, AMOUNT),
    rule!(["events", "active", "buildingMultipliers"], empty_object, Coercion::Object),
    rule!(["events", "active", "buildingMultipliers", "*"], one, AMOUNT),
    rule!(["notices"], empty_array, Coercion::Array),
    rule!(["notices", "*"], empty_text, Coercion::Text),
    rule!(["nextBuildingId"], zero, ID),
    rule!(["starving"], no, Coercion::Flag),
    rule!(["growthSeconds"], zero, AMOUNT),
];

/// Run every rule against a state value. A non-object state is replaced by
/// an empty object first. Idempotent.
pub fn normalize_state(state: &mut Value) {
    if !state.is_object() {
        *state = empty_object();
    }
    for rule in STATE_RULES {
        rule.apply(state, rule.path);
    }
}
