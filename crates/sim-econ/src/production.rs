//! Building output, tech experience and upkeep as functions of staffing.
//!
//! All arithmetic is done in [`Decimal`] and rounded with banker's rounding
//! so results are bit-identical on every platform and replay.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sim_core::{BuildingDefinition, ResourceKind};

use crate::ledger::ResourceLedger;

/// Staffing state of a building for a given worker count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Staffing {
    /// The building has no worker slots.
    Unstaffed,
    /// Fewer workers than the sum of slot minimums.
    Understaffed,
    /// Staffed; ratio of workers to optimal, within [0, 1].
    Ratio(Decimal),
}

/// Staffing state of `def` with `worker_count` workers.
pub fn staffing(def: &BuildingDefinition, worker_count: u32) -> Staffing {
    if !def.requires_workers() {
        return Staffing::Unstaffed;
    }
    if worker_count < def.min_workers() {
        return Staffing::Understaffed;
    }
    let optimal = def.optimal_workers();
    if optimal == 0 {
        return Staffing::Ratio(Decimal::ONE);
    }
    let ratio = Decimal::from(worker_count) / Decimal::from(optimal);
    Staffing::Ratio(ratio.clamp(Decimal::ZERO, Decimal::ONE))
}

fn lerp(a: Decimal, b: Decimal, t: Decimal) -> Decimal {
    a + (b - a) * t
}

/// Round half to even and convert, saturating at the `i64` range.
pub fn round_quantity(value: Decimal) -> i64 {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Resource output of one building for a month.
///
/// Unstaffed buildings return their base production verbatim; understaffed
/// ones produce nothing. Otherwise each kind in max production is
/// interpolated between base and max by the staffing ratio, and kinds that
/// only appear in base production are carried through unscaled; both are
/// multiplied by `average_efficiency` and the definition's base efficiency.
pub fn calculate_production(
    def: &BuildingDefinition,
    worker_count: u32,
    average_efficiency: Decimal,
) -> ResourceLedger {
    let ratio = match staffing(def, worker_count) {
        Staffing::Unstaffed => return ResourceLedger::from(&def.base_production),
        Staffing::Understaffed => return ResourceLedger::new(),
        Staffing::Ratio(r) => r,
    };
    let factor = average_efficiency * def.base_efficiency;
    let mut out = ResourceLedger::new();
    for (&kind, &max) in &def.max_production {
        let base = def.base_production.get(&kind).copied().unwrap_or(0);
        let amount = lerp(Decimal::from(base), Decimal::from(max), ratio) * factor;
        out.add(kind, round_quantity(amount));
    }
    for (&kind, &base) in &def.base_production {
        if def.max_production.contains_key(&kind) {
            continue;
        }
        out.add(kind, round_quantity(Decimal::from(base) * factor));
    }
    out
}

/// Monthly tech experience of one building.
///
/// Follows the staffing logic of [`calculate_production`]; buildings with a
/// non-positive base yield always return zero.
pub fn calculate_monthly_xp(
    def: &BuildingDefinition,
    worker_count: u32,
    average_efficiency: Decimal,
) -> i64 {
    if def.base_monthly_xp <= 0 {
        return 0;
    }
    match staffing(def, worker_count) {
        Staffing::Unstaffed => def.base_monthly_xp,
        Staffing::Understaffed => 0,
        Staffing::Ratio(ratio) => {
            let xp = lerp(
                Decimal::from(def.base_monthly_xp),
                Decimal::from(def.max_monthly_xp),
                ratio,
            );
            round_quantity(xp * average_efficiency * def.base_efficiency)
        }
    }
}

/// Monthly upkeep of one building.
///
/// Staffing-independent for now: the base maintenance cost verbatim.
pub fn calculate_maintenance_cost(def: &BuildingDefinition) -> ResourceLedger {
    ResourceLedger::from(&def.base_maintenance)
}

/// Net monthly ledger of one building: output plus tech experience, minus
/// upkeep.
pub fn settle_building(
    def: &BuildingDefinition,
    worker_count: u32,
    average_efficiency: Decimal,
) -> ResourceLedger {
    let mut net = calculate_production(def, worker_count, average_efficiency);
    net.add(
        ResourceKind::TechXp,
        calculate_monthly_xp(def, worker_count, average_efficiency),
    );
    net.merge(&calculate_maintenance_cost(def).negated());
    net
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::{Archetype, BuildingCategory, ResourceMap, WorkerSlot};

    fn farm() -> BuildingDefinition {
        BuildingDefinition {
            name: "Farm".into(),
            category: BuildingCategory::Agriculture,
            hublet_slots: 0,
            hub_categories: None,
            base_production: ResourceMap::from([(ResourceKind::Food, 10)]),
            max_production: ResourceMap::from([(ResourceKind::Food, 100)]),
            base_monthly_xp: 2,
            max_monthly_xp: 12,
            base_maintenance: ResourceMap::from([(ResourceKind::Gold, 3)]),
            max_maintenance: ResourceMap::new(),
            worker_slots: vec![
                WorkerSlot { archetype: Archetype::Laborer, min: 2, max: 8, efficiency: None },
                WorkerSlot { archetype: Archetype::Artisan, min: 0, max: 2, efficiency: None },
            ],
            population_growth_bonus: Decimal::ZERO,
            base_efficiency: Decimal::ONE,
            construction_days: 30,
        }
    }

    #[test]
    fn understaffed_produces_nothing() {
        let f = farm();
        assert!(calculate_production(&f, 1, Decimal::ONE).is_empty());
        assert_eq!(calculate_monthly_xp(&f, 1, Decimal::ONE), 0);
    }

    #[test]
    fn partial_staffing_interpolates() {
        let f = farm();
        let out = calculate_production(&f, 6, Decimal::ONE);
        assert_eq!(out.get(ResourceKind::Food), 64);
        assert_eq!(calculate_monthly_xp(&f, 6, Decimal::ONE), 8);
    }

    #[test]
    fn full_staffing_pins_ratio() {
        let f = farm();
        let half = Decimal::new(5, 1);
        assert_eq!(calculate_production(&f, 10, Decimal::ONE).get(ResourceKind::Food), 100);
        assert_eq!(calculate_production(&f, 50, half).get(ResourceKind::Food), 50);
    }

    #[test]
    fn unstaffed_building_returns_base_verbatim() {
        let mut f = farm();
        f.worker_slots.clear();
        f.base_production.insert(ResourceKind::Cloth, 4);
        let out = calculate_production(&f, 0, Decimal::new(3, 0));
        assert_eq!(out.get(ResourceKind::Food), 10);
        assert_eq!(out.get(ResourceKind::Cloth), 4);
    }

    #[test]
    fn base_only_kinds_are_unscaled_by_ratio() {
        let mut f = farm();
        f.base_production.insert(ResourceKind::Wood, 7);
        let out = calculate_production(&f, 2, Decimal::new(2, 0));
        assert_eq!(out.get(ResourceKind::Wood), 14);
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_quantity(Decimal::new(25, 1)), 2);
        assert_eq!(round_quantity(Decimal::new(35, 1)), 4);
        assert_eq!(round_quantity(Decimal::new(-25, 1)), -2);
        assert_eq!(round_quantity(Decimal::new(26, 1)), 3);
    }

    #[test]
    fn xp_requires_positive_base() {
        let mut f = farm();
        f.base_monthly_xp = 0;
        assert_eq!(calculate_monthly_xp(&f, 10, Decimal::ONE), 0);
    }

    #[test]
    fn settle_nets_upkeep_and_xp() {
        let net = settle_building(&farm(), 10, Decimal::ONE);
        assert_eq!(net.get(ResourceKind::Food), 100);
        assert_eq!(net.get(ResourceKind::TechXp), 12);
        assert_eq!(net.get(ResourceKind::Gold), -3);
        assert_eq!(calculate_maintenance_cost(&farm()).get(ResourceKind::Gold), 3);
    }

    fn efficiency() -> impl Strategy<Value = Decimal> {
        (0i64..400).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #[test]
        fn understaffing_is_empty_for_any_efficiency(e in efficiency()) {
            prop_assert!(calculate_production(&farm(), 1, e).is_empty());
            prop_assert!(calculate_production(&farm(), 0, e).is_empty());
        }

        #[test]
        fn at_or_above_optimal_uses_max(workers in 10u32..500, e in efficiency()) {
            let out = calculate_production(&farm(), workers, e);
            prop_assert_eq!(out.get(ResourceKind::Food), round_quantity(Decimal::from(100) * e));
        }

        #[test]
        fn monotonic_between_min_and_optimal(
            w in 2u32..10,
            e in efficiency(),
            base in 0i64..500,
            extra in 0i64..500,
        ) {
            let mut f = farm();
            f.base_production.insert(ResourceKind::Iron, base);
            f.max_production.insert(ResourceKind::Iron, base + extra);
            let lo = calculate_production(&f, w, e);
            let hi = calculate_production(&f, w + 1, e);
            for kind in [ResourceKind::Food, ResourceKind::Iron] {
                prop_assert!(hi.get(kind) >= lo.get(kind));
            }
        }

        #[test]
        fn production_is_deterministic(w in 0u32..20, e in efficiency()) {
            prop_assert_eq!(calculate_production(&farm(), w, e), calculate_production(&farm(), w, e));
        }
    }
}
