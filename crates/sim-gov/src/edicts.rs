//! Timed realm-wide edicts counting down on seasonal ticks.

use sim_core::{
    validate_edict, ActiveEdict, EdictDefinition, EdictId, EntityRef, ModifierSource, RealmId,
    SimError, MONTHS_PER_SEASON,
};
use std::collections::BTreeMap;
use tracing::info;

use crate::government::Government;
use crate::modifiers::ModifierRegistry;

/// Active edicts per realm, in enactment order.
#[derive(Clone, Debug, Default)]
pub struct EdictEngine {
    active: BTreeMap<RealmId, Vec<ActiveEdict>>,
    next_id: u32,
}

impl EdictEngine {
    /// Empty engine.
    pub fn new() -> Self {
        Self {
            active: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild from saved edicts, re-registering their modifiers.
    pub fn restore(edicts: Vec<ActiveEdict>, modifiers: &mut ModifierRegistry) -> Self {
        let mut engine = Self::new();
        for edict in edicts {
            engine.next_id = engine.next_id.max(edict.id.0 + 1);
            if let Some(effect) = edict.definition.effect {
                modifiers.register(edict.realm, ModifierSource::Edict(edict.id), vec![effect]);
            }
            engine.active.entry(edict.realm).or_default().push(edict);
        }
        engine
    }

    /// Enact `definition` on the realm of `government`.
    ///
    /// Registers the edict's modifier and applies its loyalty deltas once.
    /// Fails without side effects on a zero duration or when an edict of the
    /// same category is already active on that realm.
    pub fn enact(
        &mut self,
        government: &mut Government,
        definition: &EdictDefinition,
        modifiers: &mut ModifierRegistry,
    ) -> Result<EdictId, SimError> {
        validate_edict(definition).map_err(|e| SimError::InvalidTerm(e.to_string()))?;
        let realm = government.realm();
        let conflict = self
            .active(realm)
            .iter()
            .any(|e| e.definition.category == definition.category);
        if conflict {
            return Err(SimError::CapacityOrConflict {
                realm,
                category: definition.category,
            });
        }

        let id = EdictId(self.next_id);
        self.next_id += 1;
        if let Some(effect) = definition.effect {
            modifiers.register(realm, ModifierSource::Edict(id), vec![effect]);
        }
        for (&archetype, &delta) in &definition.loyalty_deltas {
            government.adjust_loyalty(archetype, delta);
        }
        self.active.entry(realm).or_default().push(ActiveEdict {
            id,
            realm,
            definition: definition.clone(),
            remaining_months: definition.duration_months,
        });
        info!(edict = %id, %realm, name = %definition.name, months = definition.duration_months, "edict enacted");
        Ok(id)
    }

    /// Advance every edict by one season. Expired edicts are removed, their
    /// modifiers unregistered, and returned in realm then enactment order.
    pub fn seasonal_tick(&mut self, modifiers: &mut ModifierRegistry) -> Vec<ActiveEdict> {
        let mut expired = Vec::new();
        for edicts in self.active.values_mut() {
            for edict in edicts.iter_mut() {
                edict.remaining_months = edict.remaining_months.saturating_sub(MONTHS_PER_SEASON);
            }
            let (done, live): (Vec<_>, Vec<_>) =
                edicts.drain(..).partition(|e| e.remaining_months == 0);
            *edicts = live;
            expired.extend(done);
        }
        self.active.retain(|_, edicts| !edicts.is_empty());
        for edict in &expired {
            modifiers.unregister(edict.realm, ModifierSource::Edict(edict.id));
            info!(edict = %edict.id, realm = %edict.realm, name = %edict.definition.name, "edict expired");
        }
        expired
    }

    /// Remove an active edict early.
    pub fn revoke(
        &mut self,
        id: EdictId,
        modifiers: &mut ModifierRegistry,
    ) -> Result<ActiveEdict, SimError> {
        let (realm, pos) = self
            .active
            .iter()
            .find_map(|(&realm, edicts)| edicts.iter().position(|e| e.id == id).map(|p| (realm, p)))
            .ok_or(SimError::UnregisteredEntity(EntityRef::Edict(id)))?;
        let edicts = self
            .active
            .get_mut(&realm)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Edict(id)))?;
        let edict = edicts.remove(pos);
        if edicts.is_empty() {
            self.active.remove(&realm);
        }
        modifiers.unregister(realm, ModifierSource::Edict(id));
        info!(edict = %id, %realm, "edict revoked");
        Ok(edict)
    }

    /// Active edicts of `realm`.
    pub fn active(&self, realm: RealmId) -> &[ActiveEdict] {
        self.active.get(&realm).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether edict `id` is still active.
    pub fn is_active(&self, id: EdictId) -> bool {
        self.iter().any(|e| e.id == id)
    }

    /// Every active edict in realm then enactment order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveEdict> {
        self.active.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use sim_core::{
        Archetype, EdictCategory, GovernmentData, GovernmentForm, GovernmentStructure, Modifier,
        ModifierKind, SuccessionRule,
    };

    fn gov() -> Government {
        Government::new(
            RealmId(1),
            GovernmentData::new(
                GovernmentForm::Monarchy,
                GovernmentStructure::Centralized,
                SuccessionRule::Hereditary,
                3,
                Decimal::from(50),
            ),
        )
    }

    fn levy(months: u32) -> EdictDefinition {
        EdictDefinition {
            name: "Grain Levy".into(),
            category: EdictCategory::Economic,
            duration_months: months,
            effect: Some(Modifier {
                kind: ModifierKind::TaxIncome,
                value: Decimal::new(1, 1),
            }),
            loyalty_deltas: [(Archetype::Laborer, Decimal::from(-10))].into_iter().collect(),
        }
    }

    #[test]
    fn enact_registers_modifier_and_loyalty() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        let id = engine.enact(&mut g, &levy(6), &mut mods).unwrap();
        assert!(mods.has_source(RealmId(1), ModifierSource::Edict(id)));
        assert_eq!(mods.total(RealmId(1), ModifierKind::TaxIncome), Decimal::new(1, 1));
        assert_eq!(g.loyalty(Archetype::Laborer), Decimal::from(40));
        assert_eq!(engine.active(RealmId(1)).len(), 1);
    }

    #[test]
    fn same_category_conflicts() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        engine.enact(&mut g, &levy(6), &mut mods).unwrap();
        let err = engine.enact(&mut g, &levy(9), &mut mods).unwrap_err();
        assert_eq!(
            err,
            SimError::CapacityOrConflict {
                realm: RealmId(1),
                category: EdictCategory::Economic
            }
        );
        assert_eq!(g.loyalty(Archetype::Laborer), Decimal::from(40));
        assert_eq!(mods.len(), 1);
        let mut drill = levy(3);
        drill.category = EdictCategory::Military;
        drill.effect = None;
        engine.enact(&mut g, &drill, &mut mods).unwrap();
        assert_eq!(engine.active(RealmId(1)).len(), 2);
    }

    #[test]
    fn zero_duration_is_invalid() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        assert!(matches!(
            engine.enact(&mut g, &levy(0), &mut mods),
            Err(SimError::InvalidTerm(_))
        ));
        assert!(mods.is_empty());
        assert_eq!(engine.iter().count(), 0);
    }

    #[test]
    fn expiry_then_reenact_gets_fresh_id() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        let first = engine.enact(&mut g, &levy(4), &mut mods).unwrap();
        assert!(engine.seasonal_tick(&mut mods).is_empty());
        let expired = engine.seasonal_tick(&mut mods);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, first);
        assert!(mods.is_empty());
        let second = engine.enact(&mut g, &levy(4), &mut mods).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn revoke_unregisters() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        let id = engine.enact(&mut g, &levy(12), &mut mods).unwrap();
        engine.revoke(id, &mut mods).unwrap();
        assert!(!engine.is_active(id));
        assert!(mods.is_empty());
        assert_eq!(
            engine.revoke(id, &mut mods).unwrap_err(),
            SimError::UnregisteredEntity(EntityRef::Edict(id))
        );
    }

    #[test]
    fn restore_reregisters_modifiers() {
        let mut engine = EdictEngine::new();
        let mut mods = ModifierRegistry::new();
        let mut g = gov();
        let id = engine.enact(&mut g, &levy(12), &mut mods).unwrap();
        let saved: Vec<ActiveEdict> = engine.iter().cloned().collect();
        let mut fresh_mods = ModifierRegistry::new();
        let mut restored = EdictEngine::restore(saved, &mut fresh_mods);
        assert_eq!(fresh_mods, mods);
        let mut drill = levy(3);
        drill.category = EdictCategory::Civic;
        assert!(restored.enact(&mut g, &drill, &mut fresh_mods).unwrap() > id);
    }

    proptest! {
        #[test]
        fn edict_lives_for_ceil_duration_over_season(months in 1u32..60) {
            let mut engine = EdictEngine::new();
            let mut mods = ModifierRegistry::new();
            let mut g = gov();
            let id = engine.enact(&mut g, &levy(months), &mut mods).unwrap();
            let seasons = months.div_ceil(MONTHS_PER_SEASON);
            for _ in 1..seasons {
                prop_assert!(engine.seasonal_tick(&mut mods).is_empty());
                prop_assert!(engine.is_active(id));
            }
            let expired = engine.seasonal_tick(&mut mods);
            prop_assert_eq!(expired.len(), 1);
            prop_assert!(!engine.is_active(id));
            prop_assert!(!mods.has_source(RealmId(1), ModifierSource::Edict(id)));
        }
    }
}
