//! Realm-scoped modifiers tagged by their typed source.

use rust_decimal::Decimal;
use sim_core::{Modifier, ModifierKind, ModifierSource, RealmId};
use std::collections::BTreeMap;

/// Active modifiers per realm and source.
///
/// Removing a source removes every modifier it registered, so institutions
/// and edicts never leave orphans behind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModifierRegistry {
    realms: BTreeMap<RealmId, BTreeMap<ModifierSource, Vec<Modifier>>>,
}

impl ModifierRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `modifiers` for `source`, replacing anything it held before.
    pub fn register(&mut self, realm: RealmId, source: ModifierSource, modifiers: Vec<Modifier>) {
        self.realms.entry(realm).or_default().insert(source, modifiers);
    }

    /// Remove everything `source` registered on `realm`. Returns the number
    /// of modifiers removed.
    pub fn unregister(&mut self, realm: RealmId, source: ModifierSource) -> usize {
        let Some(sources) = self.realms.get_mut(&realm) else {
            return 0;
        };
        let removed = sources.remove(&source).map_or(0, |m| m.len());
        if sources.is_empty() {
            self.realms.remove(&realm);
        }
        removed
    }

    /// Whether `source` is registered on `realm`.
    pub fn has_source(&self, realm: RealmId, source: ModifierSource) -> bool {
        self.realms
            .get(&realm)
            .is_some_and(|s| s.contains_key(&source))
    }

    /// Sum of every modifier of `kind` on `realm`.
    pub fn total(&self, realm: RealmId, kind: ModifierKind) -> Decimal {
        self.realms
            .get(&realm)
            .map(|sources| {
                sources
                    .values()
                    .flatten()
                    .filter(|m| m.kind == kind)
                    .map(|m| m.value)
                    .sum::<Decimal>()
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Active `(source, modifier)` pairs of `realm`, in source order.
    pub fn active(&self, realm: RealmId) -> Vec<(ModifierSource, Modifier)> {
        self.realms
            .get(&realm)
            .map(|sources| {
                sources
                    .iter()
                    .flat_map(|(&src, mods)| mods.iter().map(move |&m| (src, m)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of registered modifiers across realms.
    pub fn len(&self) -> usize {
        self.realms.values().flat_map(|s| s.values()).map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{EdictId, InstitutionId};

    fn m(kind: ModifierKind, v: i64) -> Modifier {
        Modifier {
            kind,
            value: Decimal::new(v, 2),
        }
    }

    #[test]
    fn totals_sum_across_sources() {
        let mut reg = ModifierRegistry::new();
        let realm = RealmId(1);
        reg.register(
            realm,
            ModifierSource::Institution(InstitutionId(1)),
            vec![m(ModifierKind::BuildingEfficiency, 10), m(ModifierKind::MilitaryPower, 5)],
        );
        reg.register(
            realm,
            ModifierSource::Edict(EdictId(3)),
            vec![m(ModifierKind::BuildingEfficiency, 15)],
        );
        assert_eq!(reg.total(realm, ModifierKind::BuildingEfficiency), Decimal::new(25, 2));
        assert_eq!(reg.total(RealmId(2), ModifierKind::BuildingEfficiency), Decimal::ZERO);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.active(realm).len(), 3);
    }

    #[test]
    fn unregister_leaves_no_orphans() {
        let mut reg = ModifierRegistry::new();
        let realm = RealmId(1);
        let src = ModifierSource::Edict(EdictId(9));
        reg.register(realm, src, vec![m(ModifierKind::TaxIncome, 20)]);
        assert!(reg.has_source(realm, src));
        assert_eq!(reg.unregister(realm, src), 1);
        assert!(!reg.has_source(realm, src));
        assert!(reg.is_empty());
        assert_eq!(reg.unregister(realm, src), 0);
    }

    #[test]
    fn register_replaces_same_source() {
        let mut reg = ModifierRegistry::new();
        let src = ModifierSource::Institution(InstitutionId(2));
        reg.register(RealmId(1), src, vec![m(ModifierKind::Legitimacy, 100)]);
        reg.register(RealmId(1), src, vec![m(ModifierKind::Legitimacy, 300)]);
        assert_eq!(reg.total(RealmId(1), ModifierKind::Legitimacy), Decimal::from(3));
    }
}
