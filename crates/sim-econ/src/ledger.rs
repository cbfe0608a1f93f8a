//! Per-city resource balances and the batched deltas that mutate them.

use serde::{Deserialize, Serialize};
use sim_core::{
    BalancePolicy, CityId, EntityRef, ResourceAmount, ResourceKind, ResourceMap, SimConfig,
    SimError,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Batch of signed per-kind deltas accumulated during one step.
///
/// Keys are unique; adding to an existing kind accumulates and a kind whose
/// running total returns to zero is dropped. Totals saturate at the `i64`
/// limits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    deltas: ResourceMap,
}

impl ResourceLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `delta` for `kind`.
    pub fn add(&mut self, kind: ResourceKind, delta: i64) -> &mut Self {
        if delta == 0 {
            return self;
        }
        let total = self.deltas.get(&kind).copied().unwrap_or(0).saturating_add(delta);
        if total == 0 {
            self.deltas.remove(&kind);
        } else {
            self.deltas.insert(kind, total);
        }
        self
    }

    /// Accumulate every delta of `other`.
    pub fn merge(&mut self, other: &ResourceLedger) -> &mut Self {
        for (&kind, &delta) in &other.deltas {
            self.add(kind, delta);
        }
        self
    }

    /// Ledger with every delta sign-flipped.
    pub fn negated(&self) -> ResourceLedger {
        self.deltas.iter().map(|(&k, &q)| ResourceAmount::new(k, q.saturating_neg())).collect()
    }

    /// Accumulated delta for `kind`, zero if absent.
    pub fn get(&self, kind: ResourceKind) -> i64 {
        self.deltas.get(&kind).copied().unwrap_or(0)
    }

    /// Whether the ledger carries no delta.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Number of distinct kinds.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Deltas in key order.
    pub fn iter(&self) -> impl Iterator<Item = ResourceAmount> + '_ {
        self.deltas
            .iter()
            .map(|(&kind, &quantity)| ResourceAmount { kind, quantity })
    }

    /// Underlying map view.
    pub fn as_map(&self) -> &ResourceMap {
        &self.deltas
    }
}

impl From<&ResourceMap> for ResourceLedger {
    fn from(map: &ResourceMap) -> Self {
        map.iter().map(|(&k, &q)| ResourceAmount::new(k, q)).collect()
    }
}

impl Extend<ResourceAmount> for ResourceLedger {
    fn extend<T: IntoIterator<Item = ResourceAmount>>(&mut self, iter: T) {
        for a in iter {
            self.add(a.kind, a.quantity);
        }
    }
}

impl FromIterator<ResourceAmount> for ResourceLedger {
    fn from_iter<T: IntoIterator<Item = ResourceAmount>>(iter: T) -> Self {
        let mut ledger = ResourceLedger::new();
        ledger.extend(iter);
        ledger
    }
}

/// Stored balances of one city. Absent kinds read as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityResourceBalance {
    balances: ResourceMap,
}

impl CityResourceBalance {
    /// Quantity of `kind`.
    pub fn get(&self, kind: ResourceKind) -> i64 {
        self.balances.get(&kind).copied().unwrap_or(0)
    }

    /// Every stored kind in key order.
    pub fn as_map(&self) -> &ResourceMap {
        &self.balances
    }
}

/// Owner of every city's balances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStore {
    policy: BalancePolicy,
    starting_food: i64,
    starting_gold: i64,
    cities: BTreeMap<CityId, CityResourceBalance>,
}

impl ResourceStore {
    /// Empty store configured from `cfg`.
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            policy: cfg.balance_policy,
            starting_food: cfg.starting_food,
            starting_gold: cfg.starting_gold,
            cities: BTreeMap::new(),
        }
    }

    /// Register `city` with the starting allotment. Returns false if it was
    /// already registered, in which case nothing changes.
    pub fn register_city(&mut self, city: CityId) -> bool {
        if self.cities.contains_key(&city) {
            return false;
        }
        let mut balances = ResourceMap::new();
        balances.insert(ResourceKind::Food, self.starting_food);
        balances.insert(ResourceKind::Gold, self.starting_gold);
        self.cities.insert(city, CityResourceBalance { balances });
        true
    }

    /// Reinstate a city with explicit balances (save loading).
    pub fn restore_city(&mut self, city: CityId, balances: ResourceMap) {
        self.cities.insert(city, CityResourceBalance { balances });
    }

    /// Whether `city` was registered.
    pub fn is_registered(&self, city: CityId) -> bool {
        self.cities.contains_key(&city)
    }

    /// Apply every delta of `ledger` to `city`.
    ///
    /// The only failure is an unregistered city, detected before any
    /// mutation, so a ledger is applied entirely or not at all. Balances
    /// saturate at the `i64` limits instead of overflowing.
    pub fn apply_ledger(&mut self, city: CityId, ledger: &ResourceLedger) -> Result<(), SimError> {
        let policy = self.policy;
        let entry = self
            .cities
            .get_mut(&city)
            .ok_or(SimError::UnregisteredEntity(EntityRef::City(city)))?;
        for delta in ledger.iter() {
            let slot = entry.balances.entry(delta.kind).or_insert(0);
            *slot = slot.saturating_add(delta.quantity);
            if policy == BalancePolicy::ClampAtZero && *slot < 0 {
                *slot = 0;
            }
        }
        debug!(%city, kinds = ledger.len(), "applied ledger");
        Ok(())
    }

    /// Stored quantity, zero when the city or kind is absent.
    pub fn get_resource(&self, city: CityId, kind: ResourceKind) -> i64 {
        self.cities.get(&city).map_or(0, |b| b.get(kind))
    }

    /// Whether applying `ledger` would leave every touched kind non-negative.
    pub fn can_afford(&self, city: CityId, ledger: &ResourceLedger) -> bool {
        let Some(balance) = self.cities.get(&city) else {
            return false;
        };
        ledger
            .iter()
            .all(|d| balance.get(d.kind).saturating_add(d.quantity) >= 0)
    }

    /// Balances of `city`.
    pub fn balance(&self, city: CityId) -> Option<&CityResourceBalance> {
        self.cities.get(&city)
    }

    /// Registered cities in ascending id order.
    pub fn cities(&self) -> impl Iterator<Item = CityId> + '_ {
        self.cities.keys().copied()
    }

    /// Active balance policy.
    pub fn policy(&self) -> BalancePolicy {
        self.policy
    }
}
