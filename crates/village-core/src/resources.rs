//! Resource kinds, the static registry and the mutable pool.
//!
//! The pool's key set is exactly the registry's kinds. Every mutation against
//! a kind outside that set fails closed: nothing changes and `false` is
//! returned, so a registry change can never fabricate or destroy stock.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::CatalogError;

/// Identifier of a resource kind, e.g. "wood", "tools", "gold".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(pub String);

impl ResourceKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Broad grouping used for display and upkeep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Food,
    #[default]
    Material,
    Good,
    Currency,
}

/// Static attributes of a resource kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Kind identifier.
    pub id: ResourceKind,
    /// Display name; falls back to the id when empty.
    #[serde(default)]
    pub name: String,
    /// Position in the production chain: 1 raw, 2 processed, 3 finished.
    pub tier: u8,
    #[serde(default)]
    pub category: ResourceCategory,
}

impl ResourceDef {
    pub fn new(id: &str, tier: u8) -> Self {
        Self {
            id: ResourceKind::new(id),
            name: String::new(),
            tier,
            category: ResourceCategory::default(),
        }
    }

    pub fn with_category(mut self, category: ResourceCategory) -> Self {
        self.category = category;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

/// Catalog of every resource kind known to the simulation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceRegistry {
    defs: BTreeMap<ResourceKind, ResourceDef>,
}

impl ResourceRegistry {
    /// Build a registry, rejecting duplicate ids and tiers outside [1, 3].
    pub fn new(defs: Vec<ResourceDef>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for def in defs {
            if !(1..=3).contains(&def.tier) {
                return Err(CatalogError::InvalidTier {
                    id: def.id.0.clone(),
                    tier: def.tier,
                });
            }
            if map.contains_key(&def.id) {
                return Err(CatalogError::Duplicate(def.id.0.clone()));
            }
            map.insert(def.id.clone(), def);
        }
        Ok(Self { defs: map })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.defs.contains_key(kind)
    }

    pub fn get(&self, kind: &str) -> Option<&ResourceDef> {
        self.defs.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.defs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Built-in village resources.
    pub fn village_default() -> Self {
        use ResourceCategory::*;
        let defs = [
            ("food", "Food", 1, Food),
            ("wood", "Wood", 1, Material),
            ("stone", "Stone", 1, Material),
            ("ore", "Ore", 1, Material),
            ("lumber", "Lumber", 2, Material),
            ("tools", "Tools", 2, Good),
            ("bread", "Bread", 2, Food),
            ("furniture", "Furniture", 3, Good),
            ("gold", "Gold", 3, Currency),
        ];
        let mut map = BTreeMap::new();
        for (id, name, tier, category) in defs {
            let def = ResourceDef {
                name: name.to_string(),
                ..ResourceDef::new(id, tier).with_category(category)
            };
            map.insert(def.id.clone(), def);
        }
        Self { defs: map }
    }
}

fn sanitize_quantity(q: f64) -> f64 {
    if q.is_finite() && q > 0.0 {
        q
    } else {
        0.0
    }
}

/// Mutable stock of every known resource kind. Quantities are never negative.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePool {
    quantities: BTreeMap<ResourceKind, f64>,
}

impl ResourcePool {
    /// Empty pool holding zero of every registry kind.
    pub fn new(registry: &ResourceRegistry) -> Self {
        Self {
            quantities: registry.kinds().map(|k| (k.clone(), 0.0)).collect(),
        }
    }

    /// Re-bind a deserialized pool to the registry: unknown kinds are dropped,
    /// missing kinds inserted at zero, invalid quantities coerced to zero.
    pub fn rebind(&mut self, registry: &ResourceRegistry) {
        let mut next = BTreeMap::new();
        for kind in registry.kinds() {
            let q = self.quantities.get(kind).copied().unwrap_or(0.0);
            next.insert(kind.clone(), sanitize_quantity(q));
        }
        for (kind, q) in &self.quantities {
            if !registry.contains(kind.as_str()) {
                warn!(kind = %kind, quantity = q, "dropping unknown resource from pool");
            }
        }
        self.quantities = next;
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.quantities.contains_key(kind)
    }

    /// Current quantity; unknown kinds read as zero.
    pub fn get(&self, kind: &str) -> f64 {
        self.quantities.get(kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, f64)> {
        self.quantities.iter().map(|(k, v)| (k, *v))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.quantities.keys()
    }

    /// Credit `amount` to `kind`. Negative amounts are clamped to zero;
    /// callers decrease stock through [`ResourcePool::subtract`].
    pub fn add(&mut self, kind: &str, amount: f64) -> bool {
        if !amount.is_finite() {
            return false;
        }
        match self.quantities.get_mut(kind) {
            Some(q) => {
                *q = (*q + amount.max(0.0)).max(0.0);
                true
            }
            None => false,
        }
    }

    /// Debit `amount` from `kind`, rejecting the whole operation when the
    /// kind is unknown or the balance is short.
    pub fn subtract(&mut self, kind: &str, amount: f64) -> bool {
        if !amount.is_finite() {
            return false;
        }
        let amount = amount.max(0.0);
        match self.quantities.get_mut(kind) {
            Some(q) if *q >= amount => {
                *q = (*q - amount).max(0.0);
                true
            }
            _ => false,
        }
    }

    /// Signed change floored at zero. Used where a shortfall is absorbed
    /// rather than rejected (offline catch-up, population upkeep).
    pub fn adjust(&mut self, kind: &str, delta: f64) -> bool {
        if !delta.is_finite() {
            return false;
        }
        match self.quantities.get_mut(kind) {
            Some(q) => {
                *q = (*q + delta).max(0.0);
                true
            }
            None => false,
        }
    }

    /// True iff every kind in `cost` is known and covered by the balance.
    pub fn has_enough(&self, cost: &BTreeMap<ResourceKind, f64>) -> bool {
        cost.iter().all(|(kind, &required)| match self.quantities.get(kind) {
            Some(&q) => q >= sanitize_quantity(required),
            None => false,
        })
    }

    /// All-or-nothing debit of a cost map.
    pub fn spend(&mut self, cost: &BTreeMap<ResourceKind, f64>) -> bool {
        if !self.has_enough(cost) {
            return false;
        }
        for (kind, &required) in cost {
            self.subtract(kind.as_str(), sanitize_quantity(required));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(vec![ResourceDef::new("wood", 1), ResourceDef::new("tools", 2)])
            .unwrap()
    }

    fn cost(pairs: &[(&str, f64)]) -> BTreeMap<ResourceKind, f64> {
        pairs.iter().map(|(k, v)| (ResourceKind::new(*k), *v)).collect()
    }

    #[test]
    fn registry_rejects_duplicates_and_bad_tiers() {
        let dup = ResourceRegistry::new(vec![ResourceDef::new("wood", 1), ResourceDef::new("wood", 2)]);
        assert_eq!(dup.unwrap_err(), CatalogError::Duplicate("wood".into()));
        let tier = ResourceRegistry::new(vec![ResourceDef::new("aether", 4)]);
        assert!(matches!(tier, Err(CatalogError::InvalidTier { tier: 4, .. })));
    }

    #[test]
    fn display_name_falls_back_to_the_id() {
        let plain = ResourceDef::new("ore", 1).with_category(ResourceCategory::Material);
        assert_eq!(plain.display_name(), "ore");
        let reg = ResourceRegistry::village_default();
        let gold = reg.get("gold").unwrap();
        assert_eq!(gold.display_name(), "Gold");
        assert_eq!(gold.category, ResourceCategory::Currency);
        assert_eq!(reg.get("bread").map(|d| d.category), Some(ResourceCategory::Food));
    }

    #[test]
    fn unknown_kind_fails_closed() {
        let mut pool = ResourcePool::new(&registry());
        pool.add("wood", 5.0);
        let before = pool.clone();
        assert!(!pool.add("unknownkind", 100.0));
        assert!(!pool.subtract("unknownkind", 1.0));
        assert!(!pool.adjust("unknownkind", 3.0));
        assert_eq!(pool, before);
        assert!(!pool.has_enough(&cost(&[("wood", 1.0), ("unknownkind", 0.0)])));
    }

    #[test]
    fn add_clamps_negative_amounts() {
        let mut pool = ResourcePool::new(&registry());
        assert!(pool.add("wood", 3.0));
        assert!(pool.add("wood", -10.0));
        assert_eq!(pool.get("wood"), 3.0);
        assert!(!pool.add("wood", f64::NAN));
        assert_eq!(pool.get("wood"), 3.0);
    }

    #[test]
    fn subtract_rejects_shortfall_without_mutation() {
        let mut pool = ResourcePool::new(&registry());
        pool.add("wood", 2.0);
        assert!(!pool.subtract("wood", 2.5));
        assert_eq!(pool.get("wood"), 2.0);
        assert!(pool.subtract("wood", 2.0));
        assert_eq!(pool.get("wood"), 0.0);
    }

    #[test]
    fn spend_is_all_or_nothing() {
        let mut pool = ResourcePool::new(&registry());
        pool.add("wood", 10.0);
        assert!(!pool.spend(&cost(&[("wood", 4.0), ("tools", 1.0)])));
        assert_eq!(pool.get("wood"), 10.0);
        pool.add("tools", 1.0);
        assert!(pool.spend(&cost(&[("wood", 4.0), ("tools", 1.0)])));
        assert_eq!(pool.get("wood"), 6.0);
        assert_eq!(pool.get("tools"), 0.0);
    }

    #[test]
    fn rebind_drops_unknown_and_fills_missing() {
        let json = r#"{"wood": 4.5, "mana": 9.0, "tools": -3.0}"#;
        let mut pool: ResourcePool = serde_json::from_str(json).unwrap();
        pool.rebind(&registry());
        assert!(!pool.is_known("mana"));
        assert_eq!(pool.get("wood"), 4.5);
        assert_eq!(pool.get("tools"), 0.0);
        assert_eq!(pool.kinds().count(), 2);
    }

    #[test]
    fn pool_serializes_as_flat_map() {
        let mut pool = ResourcePool::new(&registry());
        pool.add("wood", 1.5);
        let s = serde_json::to_string(&pool).unwrap();
        assert_eq!(s, r#"{"tools":0.0,"wood":1.5}"#);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(bool, f64),
        Subtract(bool, f64),
        Adjust(bool, f64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<bool>(), -1_000.0f64..1_000.0).prop_map(|(w, a)| Op::Add(w, a)),
            (any::<bool>(), -1_000.0f64..1_000.0).prop_map(|(w, a)| Op::Subtract(w, a)),
            (any::<bool>(), -1_000.0f64..1_000.0).prop_map(|(w, a)| Op::Adjust(w, a)),
        ]
    }

    proptest! {
        #[test]
        fn quantities_never_go_negative(ops in proptest::collection::vec(op(), 1..64)) {
            let mut pool = ResourcePool::new(&registry());
            for op in ops {
                match op {
                    Op::Add(w, a) => { pool.add(if w { "wood" } else { "tools" }, a); }
                    Op::Subtract(w, a) => { pool.subtract(if w { "wood" } else { "tools" }, a); }
                    Op::Adjust(w, a) => { pool.adjust(if w { "wood" } else { "tools" }, a); }
                }
                for (_, q) in pool.iter() {
                    prop_assert!(q >= 0.0);
                }
            }
        }
    }
}
