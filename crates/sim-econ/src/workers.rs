//! Archetype to worker-slot lookup built from a building's slot list.

use rust_decimal::Decimal;
use sim_core::{Archetype, WorkerSlot};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, PartialEq)]
struct SlotEntry {
    max: u32,
    efficiency: Decimal,
}

/// Constant-time eligibility and efficiency queries for one definition.
///
/// Built explicitly when a definition is loaded; call [`rebuild`] whenever
/// the slot list is edited.
///
/// [`rebuild`]: WorkerAllocationIndex::rebuild
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerAllocationIndex {
    slots: HashMap<Archetype, SlotEntry>,
    min_workers: u32,
    optimal_workers: u32,
}

impl WorkerAllocationIndex {
    /// Build from a slot list.
    pub fn build(slots: &[WorkerSlot]) -> Self {
        let mut index = Self::default();
        index.rebuild(slots);
        index
    }

    /// Replace the lookup with one built from `slots`.
    pub fn rebuild(&mut self, slots: &[WorkerSlot]) {
        self.slots.clear();
        self.min_workers = 0;
        self.optimal_workers = 0;
        for slot in slots {
            self.min_workers += slot.min;
            self.optimal_workers += slot.max;
            self.slots.insert(
                slot.archetype,
                SlotEntry {
                    max: slot.max,
                    efficiency: slot.efficiency.unwrap_or(Decimal::ONE),
                },
            );
        }
    }

    /// True when the building has no slots or lists `archetype`.
    pub fn can_worker_type_work(&self, archetype: Archetype) -> bool {
        self.slots.is_empty() || self.slots.contains_key(&archetype)
    }

    /// Slot multiplier for `archetype`, 1.0 when absent or unset.
    pub fn worker_efficiency(&self, archetype: Archetype) -> Decimal {
        self.slots
            .get(&archetype)
            .map_or(Decimal::ONE, |s| s.efficiency)
    }

    /// Sum of slot minimums.
    pub fn min_workers(&self) -> u32 {
        self.min_workers
    }

    /// Sum of slot maximums.
    pub fn optimal_workers(&self) -> u32 {
        self.optimal_workers
    }

    fn usable(&self, archetype: Archetype, count: u32) -> u32 {
        if self.slots.is_empty() {
            return count;
        }
        self.slots.get(&archetype).map_or(0, |s| count.min(s.max))
    }

    /// Workers that count toward staffing: eligible archetypes only, each
    /// capped at its slot maximum.
    pub fn eligible_workers(&self, workforce: &BTreeMap<Archetype, u32>) -> u32 {
        workforce
            .iter()
            .map(|(&a, &n)| self.usable(a, n))
            .sum()
    }

    /// Workforce-weighted mean of slot multiplier times `skill`.
    ///
    /// Returns 1.0 when no eligible worker is present.
    pub fn average_efficiency<F>(&self, workforce: &BTreeMap<Archetype, u32>, skill: F) -> Decimal
    where
        F: Fn(Archetype) -> Decimal,
    {
        let mut weight = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        for (&archetype, &count) in workforce {
            let n = Decimal::from(self.usable(archetype, count));
            if n.is_zero() {
                continue;
            }
            weight += n;
            total += n * self.worker_efficiency(archetype) * skill(archetype);
        }
        if weight.is_zero() {
            Decimal::ONE
        } else {
            total / weight
        }
    }
}
