//! The simulation context: owns every component and dispatches ticks.

use chrono::{Datelike, NaiveDate};
use persistence::{BuildingRecord, CadenceRecord, CityRecord, RealmRecord, Snapshot};
use rust_decimal::Decimal;
use sim_core::{
    validate_config, validate_institution, AgentHandle, Archetype, BuildingDefinition, Cadence,
    CityId, ContractId, ContractKind, ContractTerms, DefinitionId, EdictDefinition, EdictId,
    EntityRef, GovernmentData, Institution, InstitutionId, ModifierKind, ModifierSource, OfficeId,
    OfficePurpose, RealmId, ResourceKind, SimConfig, SimError, ValidationError,
};
use sim_econ::{
    round_quantity, BuildingInstance, CityBuildings, DefinitionRegistry, ResourceLedger,
    ResourceStore,
};
use sim_gov::{
    ContractEngine, EdictEngine, Government, GovernmentRegistry, LegitimacyInputs,
    ModifierRegistry,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::clock::{SimClock, TickEvent};
use crate::providers::Providers;
use crate::scheduler::TickScheduler;

#[derive(Clone, Debug, Default)]
struct City {
    realm: Option<RealmId>,
    buildings: CityBuildings,
}

fn city_entry(cities: &mut BTreeMap<CityId, City>, city: CityId) -> Result<&mut City, SimError> {
    cities
        .get_mut(&city)
        .ok_or(SimError::UnregisteredEntity(EntityRef::City(city)))
}

/// Owner of the whole simulation state.
///
/// All mutation goes through methods here or through the tick handlers,
/// which run realms in ascending id order.
pub struct SimContext {
    config: SimConfig,
    clock: SimClock,
    scheduler: TickScheduler,
    store: ResourceStore,
    definitions: DefinitionRegistry,
    institutions: BTreeMap<InstitutionId, Institution>,
    cities: BTreeMap<CityId, City>,
    capitals: BTreeMap<RealmId, CityId>,
    governments: GovernmentRegistry,
    contracts: ContractEngine,
    edicts: EdictEngine,
    modifiers: ModifierRegistry,
}

impl SimContext {
    /// Empty world on the configured start date, subscribed to every cadence.
    pub fn new(config: SimConfig) -> Result<Self, ValidationError> {
        validate_config(&config)?;
        let mut clock = SimClock::new(config.start_date);
        let mut scheduler = TickScheduler::new();
        scheduler.subscribe(&mut clock);
        Ok(Self {
            store: ResourceStore::new(&config),
            config,
            clock,
            scheduler,
            definitions: DefinitionRegistry::new(),
            institutions: BTreeMap::new(),
            cities: BTreeMap::new(),
            capitals: BTreeMap::new(),
            governments: GovernmentRegistry::new(),
            contracts: ContractEngine::new(),
            edicts: EdictEngine::new(),
            modifiers: ModifierRegistry::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulated date.
    pub fn date(&self) -> NaiveDate {
        self.clock.date()
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    pub fn governments(&self) -> &GovernmentRegistry {
        &self.governments
    }

    pub fn contracts(&self) -> &ContractEngine {
        &self.contracts
    }

    pub fn edicts(&self) -> &EdictEngine {
        &self.edicts
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Load a building definition.
    pub fn register_definition(
        &mut self,
        def: BuildingDefinition,
    ) -> Result<DefinitionId, ValidationError> {
        self.definitions.register(def)
    }

    /// Load an institution template.
    pub fn register_institution(&mut self, institution: Institution) -> Result<(), ValidationError> {
        validate_institution(&institution)?;
        if self.institutions.contains_key(&institution.id) {
            return Err(ValidationError::Duplicate(format!(
                "institution {}",
                institution.id
            )));
        }
        self.institutions.insert(institution.id, institution);
        Ok(())
    }

    /// Create a realm. Returns false if it already exists.
    pub fn create_realm(&mut self, realm: RealmId, data: GovernmentData) -> Result<bool, SimError> {
        self.governments.create_realm(realm, data)
    }

    /// Register a city, optionally owned by `realm`. The first city of a
    /// realm becomes its capital. Returns false if already registered.
    pub fn register_city(&mut self, city: CityId, realm: Option<RealmId>) -> Result<bool, SimError> {
        if let Some(realm) = realm {
            self.governments.get(realm)?;
        }
        if self.cities.contains_key(&city) {
            return Ok(false);
        }
        self.store.register_city(city);
        self.cities.insert(
            city,
            City {
                realm,
                buildings: CityBuildings::default(),
            },
        );
        if let Some(realm) = realm {
            self.capitals.entry(realm).or_insert(city);
        }
        info!(%city, ?realm, "city registered");
        Ok(true)
    }

    /// Move a realm's capital to one of its cities.
    pub fn set_capital(&mut self, realm: RealmId, city: CityId) -> Result<(), SimError> {
        self.governments.get(realm)?;
        let owner = self.city(city)?.realm;
        if owner != Some(realm) {
            return Err(SimError::InvalidTerm(format!("{city} does not belong to {realm}")));
        }
        self.capitals.insert(realm, city);
        Ok(())
    }

    /// Capital city of `realm`.
    pub fn capital(&self, realm: RealmId) -> Option<CityId> {
        self.capitals.get(&realm).copied()
    }

    fn city(&self, city: CityId) -> Result<&City, SimError> {
        self.cities
            .get(&city)
            .ok_or(SimError::UnregisteredEntity(EntityRef::City(city)))
    }


    /// Buildings standing in `city`.
    pub fn city_buildings(&self, city: CityId) -> Result<&CityBuildings, SimError> {
        Ok(&self.city(city)?.buildings)
    }

    /// Realm owning `city`, if any.
    pub fn city_realm(&self, city: CityId) -> Result<Option<RealmId>, SimError> {
        Ok(self.city(city)?.realm)
    }

    /// Registered cities in id order.
    pub fn city_ids(&self) -> Vec<CityId> {
        self.cities.keys().copied().collect()
    }

    /// Construct a building in `city`; hublets name their hub by index.
    pub fn construct(
        &mut self,
        city: CityId,
        definition: DefinitionId,
        hub: Option<usize>,
    ) -> Result<usize, SimError> {
        let entry = city_entry(&mut self.cities, city)?;
        let index = entry.buildings.construct(&self.definitions, definition, hub)?;
        debug!(%city, %definition, index, "building constructed");
        Ok(index)
    }

    /// Staff building `index` of `city` with `count` workers of `archetype`.
    pub fn assign_workers(
        &mut self,
        city: CityId,
        index: usize,
        archetype: Archetype,
        count: u32,
    ) -> Result<(), SimError> {
        city_entry(&mut self.cities, city)?
            .buildings
            .assign_workers(&self.definitions, index, archetype, count)
    }

    /// Apply an ad-hoc ledger to a city.
    pub fn apply_ledger(&mut self, city: CityId, ledger: &ResourceLedger) -> Result<(), SimError> {
        self.store.apply_ledger(city, ledger)
    }

    /// Sum of `kind` over every city.
    pub fn total_resource(&self, kind: ResourceKind) -> i64 {
        self.cities
            .keys()
            .map(|&c| self.store.get_resource(c, kind))
            .fold(0i64, i64::saturating_add)
    }

    /// Population growth bonus of a city: its buildings plus the owning
    /// realm's growth modifiers.
    pub fn city_growth_bonus(&self, city: CityId) -> Result<Decimal, SimError> {
        let entry = self.city(city)?;
        let mut bonus = entry.buildings.population_growth_bonus(&self.definitions);
        if let Some(realm) = entry.realm {
            bonus += self.modifiers.total(realm, ModifierKind::PopulationGrowth);
        }
        Ok(bonus)
    }

    /// Attach a registered institution to a realm.
    pub fn attach_institution(
        &mut self,
        realm: RealmId,
        institution: InstitutionId,
    ) -> Result<bool, SimError> {
        let template = self
            .institutions
            .get(&institution)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Institution(institution)))?;
        self.governments
            .attach_institution(realm, template, &mut self.modifiers)
    }

    /// Detach an institution from a realm. Returns the offices vacated
    /// because capacity dropped.
    pub fn detach_institution(
        &mut self,
        realm: RealmId,
        institution: InstitutionId,
    ) -> Result<Vec<OfficeId>, SimError> {
        self.governments
            .detach_institution(realm, institution, &mut self.modifiers)
    }

    pub fn create_office(&mut self, realm: RealmId, purpose: OfficePurpose) -> Result<OfficeId, SimError> {
        Ok(self.governments.get_mut(realm)?.create_office(purpose))
    }

    /// Destroy an office, releasing its agent.
    pub fn remove_office(&mut self, realm: RealmId, office: OfficeId) -> Result<(), SimError> {
        self.governments.get_mut(realm)?.remove_office(office).map(|_| ())
    }

    pub fn assign_office(
        &mut self,
        realm: RealmId,
        office: OfficeId,
        agent: AgentHandle,
    ) -> Result<(), SimError> {
        self.governments.get_mut(realm)?.assign_office(office, agent)
    }

    pub fn vacate_office(
        &mut self,
        realm: RealmId,
        office: OfficeId,
    ) -> Result<Option<AgentHandle>, SimError> {
        self.governments.get_mut(realm)?.vacate_office(office)
    }

    pub fn set_office_automation(
        &mut self,
        realm: RealmId,
        office: OfficeId,
        automated: bool,
    ) -> Result<(), SimError> {
        self.governments
            .get_mut(realm)?
            .set_automation(office, automated)
    }

    pub fn adjust_loyalty(
        &mut self,
        realm: RealmId,
        archetype: Archetype,
        delta: Decimal,
    ) -> Result<(), SimError> {
        self.governments
            .get_mut(realm)?
            .adjust_loyalty(archetype, delta);
        Ok(())
    }

    /// Bind `subject` to `overlord`. Both realms must exist.
    pub fn create_contract(
        &mut self,
        overlord: RealmId,
        subject: RealmId,
        kind: ContractKind,
    ) -> Result<ContractId, SimError> {
        self.governments.get(overlord)?;
        self.governments.get(subject)?;
        self.contracts.create_contract(overlord, subject, kind)
    }

    pub fn set_contract_terms(&mut self, id: ContractId, terms: ContractTerms) -> Result<(), SimError> {
        self.contracts.set_terms(id, terms)
    }

    pub fn dissolve_contract(&mut self, id: ContractId) -> Result<(), SimError> {
        self.contracts.dissolve(id).map(|_| ())
    }

    /// Enact an edict on `realm`.
    pub fn enact_edict(
        &mut self,
        realm: RealmId,
        definition: &EdictDefinition,
    ) -> Result<EdictId, SimError> {
        let government = self.governments.get_mut(realm)?;
        self.edicts
            .enact(government, definition, &mut self.modifiers)
    }

    /// Revoke an active edict before it expires.
    pub fn revoke_edict(&mut self, id: EdictId) -> Result<(), SimError> {
        self.edicts.revoke(id, &mut self.modifiers).map(|_| ())
    }

    /// Advance the clock one day and process the ticks it emits.
    ///
    /// Every emitted tick is dispatched even when an earlier one fails, so a
    /// halted cadence never starves the others. The first failure is
    /// returned after the whole day ran.
    pub fn step_day<P: Providers + ?Sized>(&mut self, providers: &P) -> Result<Vec<TickEvent>, SimError> {
        let events = self.clock.advance_day();
        let mut failure = None;
        for event in &events {
            if let Err(err) = self.handle_tick(event, providers) {
                failure.get_or_insert(err);
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(events),
        }
    }

    /// Run `days` days.
    pub fn run_days<P: Providers + ?Sized>(&mut self, days: u32, providers: &P) -> Result<(), SimError> {
        for _ in 0..days {
            self.step_day(providers)?;
        }
        Ok(())
    }

    /// Process one tick event after sequence checking.
    pub fn handle_tick<P: Providers + ?Sized>(
        &mut self,
        event: &TickEvent,
        providers: &P,
    ) -> Result<(), SimError> {
        if !self.scheduler.accept(event)? {
            return Ok(());
        }
        match event.cadence {
            Cadence::Daily => self.run_daily(providers),
            Cadence::Monthly => self.run_monthly(providers),
            Cadence::Seasonal => {
                self.run_seasonal(providers);
                Ok(())
            }
            Cadence::Yearly => {
                self.run_yearly(providers);
                Ok(())
            }
        }
    }

    fn run_daily<P: Providers + ?Sized>(&mut self, providers: &P) -> Result<(), SimError> {
        for government in self.governments.iter_mut() {
            let report = government.run_automation(|agent| providers.is_valid(agent));
            if report.collected.is_empty() {
                continue;
            }
            match self.capitals.get(&government.realm()) {
                Some(&capital) => self.store.apply_ledger(capital, &report.collected)?,
                None => debug!(realm = %government.realm(), "no capital for office yield"),
            }
        }
        Ok(())
    }

    fn run_monthly<P: Providers + ?Sized>(&mut self, providers: &P) -> Result<(), SimError> {
        // compose every city's ledger before touching any balance
        let mut settled = Vec::with_capacity(self.cities.len());
        for (&id, city) in &self.cities {
            let bonus = city.realm.map_or(Decimal::ZERO, |r| {
                self.modifiers.total(r, ModifierKind::BuildingEfficiency)
            });
            let mut net = city
                .buildings
                .settle(&self.definitions, bonus, |a| providers.skill(a))?;
            if let Some(realm) = city.realm {
                let gold = net.get(ResourceKind::Gold);
                let tax = self.modifiers.total(realm, ModifierKind::TaxIncome);
                if gold > 0 && !tax.is_zero() {
                    net.add(ResourceKind::Gold, round_quantity(Decimal::from(gold) * tax));
                }
            }
            settled.push((id, city.realm, net));
        }

        let mut income: BTreeMap<RealmId, ResourceLedger> = BTreeMap::new();
        for (id, realm, net) in &settled {
            self.store.apply_ledger(*id, net)?;
            if let Some(realm) = realm {
                income.entry(*realm).or_default().merge(net);
            }
        }
        info!(date = %self.clock.date(), cities = settled.len(), "monthly settlement");

        let ids: Vec<ContractId> = self.contracts.iter().map(|c| c.id).collect();
        let nothing = ResourceLedger::new();
        for id in ids {
            let (overlord, subject) = {
                let c = self.contracts.get(id)?;
                (c.overlord, c.subject)
            };
            let tribute = self
                .contracts
                .tribute(id, income.get(&subject).unwrap_or(&nothing))?;
            if let (Some(&from), Some(&to)) = (self.capitals.get(&subject), self.capitals.get(&overlord)) {
                if !tribute.overlord_credit.is_empty() {
                    self.store.apply_ledger(from, &tribute.subject_debit)?;
                    self.store.apply_ledger(to, &tribute.overlord_credit)?;
                }
            }
            let overlord_form = self.governments.get(overlord)?.data().form;
            let subject_form = self.governments.get(subject)?.data().form;
            self.contracts.update_loyalty(id, overlord_form, subject_form)?;
        }
        Ok(())
    }

    fn run_seasonal<P: Providers + ?Sized>(&mut self, providers: &P) {
        let expired = self.edicts.seasonal_tick(&mut self.modifiers);
        if !expired.is_empty() {
            debug!(count = expired.len(), "edicts expired this season");
        }
        for government in self.governments.iter_mut() {
            let realm = government.realm();
            let population = providers.population(realm);
            let contract_loyalty = self.contracts.subject_loyalty(realm);
            government.evaluate_revolt(&population, contract_loyalty);
        }
    }

    fn run_yearly<P: Providers + ?Sized>(&mut self, providers: &P) {
        for government in self.governments.iter_mut() {
            let realm = government.realm();
            let inputs = LegitimacyInputs {
                culture_match: providers.culture_matches(realm),
                clergy_happiness: providers.clergy_happiness(realm),
            };
            let legitimacy =
                government.yearly_legitimacy(&self.config.legitimacy, inputs, &self.modifiers);
            government.recompute_capacity(&self.modifiers);
            debug!(%realm, %legitimacy, capacity = government.data().admin_capacity, "yearly recompute");
        }
        info!(year = self.clock.date().year(), "year closed");
    }

    /// Capture the full state as a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new(self.clock.date(), self.config.clone());
        snap.cities = self
            .cities
            .iter()
            .map(|(&id, city)| CityRecord {
                id,
                realm: city.realm,
                balances: self
                    .store
                    .balance(id)
                    .map(|b| b.as_map().clone())
                    .unwrap_or_default(),
                buildings: city
                    .buildings
                    .iter()
                    .map(|b| BuildingRecord {
                        definition: b.definition,
                        workforce: b.workforce.clone(),
                        hub: b.hub,
                    })
                    .collect(),
            })
            .collect();
        snap.realms = self
            .governments
            .iter()
            .map(|g| RealmRecord {
                id: g.realm(),
                capital: self.capital(g.realm()),
                government: g.data().clone(),
                offices: g.offices().cloned().collect(),
                loyalty: g.loyalty_map().clone(),
                revolt_risk: g.revolt_risk(),
            })
            .collect();
        snap.institutions = self.institutions.values().cloned().collect();
        snap.contracts = self.contracts.iter().cloned().collect();
        snap.edicts = self.edicts.iter().cloned().collect();
        snap.cadences = self
            .scheduler
            .records()
            .into_iter()
            .map(|(cadence, last_sequence, halted)| CadenceRecord {
                cadence,
                last_sequence,
                halted,
            })
            .collect();
        snap
    }

    /// Rebuild a context from a snapshot and the currently loaded building
    /// definitions.
    ///
    /// Fails with [`SimError::UnknownDefinition`] when a city still holds a
    /// building whose definition is not loaded.
    pub fn from_snapshot(
        snapshot: Snapshot,
        definitions: DefinitionRegistry,
    ) -> Result<Self, SimError> {
        validate_config(&snapshot.config).map_err(|e| SimError::InvalidTerm(e.to_string()))?;
        for city in &snapshot.cities {
            for b in &city.buildings {
                definitions.require(b.definition)?;
            }
        }

        let institutions: BTreeMap<InstitutionId, Institution> = snapshot
            .institutions
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let mut modifiers = ModifierRegistry::new();
        let mut governments = GovernmentRegistry::new();
        let mut capitals = BTreeMap::new();
        for realm in snapshot.realms {
            for id in &realm.government.institutions {
                let template = institutions
                    .get(id)
                    .ok_or(SimError::UnregisteredEntity(EntityRef::Institution(*id)))?;
                modifiers.register(
                    realm.id,
                    ModifierSource::Institution(*id),
                    template.modifiers.clone(),
                );
            }
            if let Some(capital) = realm.capital {
                capitals.insert(realm.id, capital);
            }
            governments.restore(Government::restore(
                realm.id,
                realm.government,
                realm.offices,
                realm.loyalty,
                realm.revolt_risk,
            ));
        }
        let edicts = EdictEngine::restore(snapshot.edicts, &mut modifiers);

        let mut store = ResourceStore::new(&snapshot.config);
        let mut cities = BTreeMap::new();
        for city in snapshot.cities {
            store.restore_city(city.id, city.balances);
            let instances = city
                .buildings
                .into_iter()
                .map(|b| BuildingInstance {
                    definition: b.definition,
                    workforce: b.workforce,
                    hub: b.hub,
                })
                .collect();
            cities.insert(
                city.id,
                City {
                    realm: city.realm,
                    buildings: CityBuildings::from_instances(instances),
                },
            );
        }
        if let Some(&missing) = capitals.values().find(|c| !cities.contains_key(*c)) {
            return Err(SimError::UnregisteredEntity(EntityRef::City(missing)));
        }

        let mut clock = SimClock::resume(
            snapshot.date,
            snapshot.cadences.iter().map(|c| (c.cadence, c.last_sequence)),
        );
        let mut scheduler = TickScheduler::restore(
            snapshot
                .cadences
                .iter()
                .map(|c| (c.cadence, c.last_sequence, c.halted)),
        );
        scheduler.subscribe(&mut clock);
        info!(date = %snapshot.date, cities = cities.len(), "world restored");

        Ok(Self {
            config: snapshot.config,
            clock,
            scheduler,
            store,
            definitions,
            institutions,
            cities,
            capitals,
            governments,
            contracts: ContractEngine::restore(snapshot.contracts),
            edicts,
            modifiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticProviders;
    use sim_core::{
        EdictCategory, GovernmentForm, GovernmentStructure, Modifier, ResourceMap, SuccessionRule,
        WorkerSlot,
    };

    fn farm() -> BuildingDefinition {
        BuildingDefinition {
            name: "Farm".into(),
            category: sim_core::BuildingCategory::Agriculture,
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
            population_growth_bonus: Decimal::new(2, 2),
            base_efficiency: Decimal::ONE,
            construction_days: 30,
        }
    }

    fn mint() -> BuildingDefinition {
        BuildingDefinition {
            name: "Mint".into(),
            category: sim_core::BuildingCategory::Commerce,
            base_production: ResourceMap::from([(ResourceKind::Gold, 100)]),
            max_production: ResourceMap::new(),
            base_maintenance: ResourceMap::new(),
            worker_slots: vec![],
            base_monthly_xp: 0,
            max_monthly_xp: 0,
            population_growth_bonus: Decimal::ZERO,
            ..farm()
        }
    }

    fn monarchy() -> GovernmentData {
        GovernmentData::new(
            GovernmentForm::Monarchy,
            GovernmentStructure::Feudal,
            SuccessionRule::Hereditary,
            2,
            Decimal::from(60),
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
            loyalty_deltas: BTreeMap::new(),
        }
    }

    /// Realms 1 and 2, each with one city holding a mint.
    fn two_realms() -> SimContext {
        let mut ctx = SimContext::new(SimConfig::default()).unwrap();
        let mint = ctx.register_definition(mint()).unwrap();
        for n in 1..=2 {
            ctx.create_realm(RealmId(n), monarchy()).unwrap();
            ctx.register_city(CityId(n), Some(RealmId(n))).unwrap();
            ctx.construct(CityId(n), mint, None).unwrap();
        }
        ctx
    }

    #[test]
    fn monthly_settlement_applies_production() {
        let mut ctx = SimContext::new(SimConfig::default()).unwrap();
        let farm = ctx.register_definition(farm()).unwrap();
        ctx.create_realm(RealmId(1), monarchy()).unwrap();
        ctx.register_city(CityId(1), Some(RealmId(1))).unwrap();
        let idx = ctx.construct(CityId(1), farm, None).unwrap();
        ctx.assign_workers(CityId(1), idx, Archetype::Laborer, 6).unwrap();
        let providers = StaticProviders::new();

        ctx.run_days(30, &providers).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Food), 1000);
        ctx.run_days(1, &providers).unwrap();
        assert_eq!(ctx.date(), NaiveDate::from_ymd_opt(1200, 2, 1).unwrap());
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Food), 1064);
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 997);
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::TechXp), 8);
        assert_eq!(ctx.city_growth_bonus(CityId(1)).unwrap(), Decimal::new(2, 2));
    }

    #[test]
    fn ineligible_workers_and_unknown_cities_fail() {
        let mut ctx = SimContext::new(SimConfig::default()).unwrap();
        let farm = ctx.register_definition(farm()).unwrap();
        ctx.register_city(CityId(1), None).unwrap();
        assert!(!ctx.register_city(CityId(1), None).unwrap());
        let idx = ctx.construct(CityId(1), farm, None).unwrap();
        assert!(matches!(
            ctx.assign_workers(CityId(1), idx, Archetype::Noble, 1),
            Err(SimError::IneligibleWorker { .. })
        ));
        assert_eq!(
            ctx.construct(CityId(7), farm, None).unwrap_err(),
            SimError::UnregisteredEntity(EntityRef::City(CityId(7)))
        );
        assert_eq!(
            ctx.register_city(CityId(2), Some(RealmId(4))).unwrap_err(),
            SimError::UnregisteredEntity(EntityRef::Realm(RealmId(4)))
        );
        assert!(!ctx.store().is_registered(CityId(2)));
    }

    #[test]
    fn tax_modifier_raises_gold_income() {
        let mut ctx = two_realms();
        ctx.enact_edict(RealmId(1), &levy(6)).unwrap();
        ctx.run_days(31, &StaticProviders::new()).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1110);
        assert_eq!(ctx.store().get_resource(CityId(2), ResourceKind::Gold), 1100);
    }

    #[test]
    fn tribute_flows_to_overlord_and_loyalty_refreshes() {
        let mut ctx = two_realms();
        let id = ctx
            .create_contract(RealmId(1), RealmId(2), ContractKind::Vassal)
            .unwrap();
        ctx.run_days(31, &StaticProviders::new()).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1110);
        assert_eq!(ctx.store().get_resource(CityId(2), ResourceKind::Gold), 1090);
        assert_eq!(ctx.contracts().get(id).unwrap().loyalty, Decimal::from(100));
        assert!(ctx
            .create_contract(RealmId(1), RealmId(9), ContractKind::Vassal)
            .is_err());
    }

    #[test]
    fn automation_collects_until_agent_dies() {
        let mut ctx = two_realms();
        let mut providers = StaticProviders::new();
        let agent = providers.spawn_agent();
        let office = ctx
            .create_office(RealmId(1), OfficePurpose::ManageTaxCollection)
            .unwrap();
        ctx.assign_office(RealmId(1), office, agent).unwrap();
        ctx.set_office_automation(RealmId(1), office, true).unwrap();
        ctx.run_days(2, &providers).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1004);

        providers.retire_agent(agent);
        ctx.run_days(1, &providers).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1004);
        let gov = ctx.governments().get(RealmId(1)).unwrap();
        assert_eq!(gov.office(office).unwrap().agent, None);
    }

    #[test]
    fn removed_office_stops_collecting() {
        let mut ctx = two_realms();
        let mut providers = StaticProviders::new();
        let agent = providers.spawn_agent();
        let office = ctx
            .create_office(RealmId(1), OfficePurpose::ManageTaxCollection)
            .unwrap();
        ctx.assign_office(RealmId(1), office, agent).unwrap();
        ctx.set_office_automation(RealmId(1), office, true).unwrap();
        ctx.run_days(1, &providers).unwrap();
        ctx.remove_office(RealmId(1), office).unwrap();
        ctx.run_days(1, &providers).unwrap();
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1002);
        let gov = ctx.governments().get(RealmId(1)).unwrap();
        assert!(gov.office(office).is_none());
        assert_eq!(gov.assigned_offices(), 0);
        assert_eq!(
            ctx.remove_office(RealmId(1), office).unwrap_err(),
            SimError::UnregisteredEntity(EntityRef::Office(RealmId(1), office))
        );
        assert!(ctx.remove_office(RealmId(7), office).is_err());
    }

    #[test]
    fn seasonal_tick_expires_edicts_and_scores_revolt() {
        let mut ctx = two_realms();
        let mut short = levy(3);
        short.category = EdictCategory::Civic;
        let id = ctx.enact_edict(RealmId(1), &short).unwrap();
        ctx.run_days(90, &StaticProviders::new()).unwrap();
        assert!(ctx.edicts().is_active(id));
        // 1200-04-01
        ctx.run_days(1, &StaticProviders::new()).unwrap();
        assert!(!ctx.edicts().is_active(id));
        assert!(ctx.modifiers().is_empty());
        // legitimacy 60, loyalty 50, no contracts: 16 + 20 + 0
        let gov = ctx.governments().get(RealmId(1)).unwrap();
        assert_eq!(gov.revolt_risk(), Decimal::from(36));
    }

    #[test]
    fn yearly_tick_recomputes_legitimacy_and_capacity() {
        let mut ctx = two_realms();
        ctx.register_institution(Institution {
            id: InstitutionId(1),
            name: "Bureaucracy".into(),
            modifiers: vec![Modifier {
                kind: ModifierKind::AdministrativeCapacity,
                value: Decimal::from(2),
            }],
        })
        .unwrap();
        ctx.attach_institution(RealmId(1), InstitutionId(1)).unwrap();
        let mut providers = StaticProviders::new();
        providers.set_culture_match(RealmId(2), false);
        ctx.run_days(366, &providers).unwrap();
        let g1 = ctx.governments().get(RealmId(1)).unwrap();
        let g2 = ctx.governments().get(RealmId(2)).unwrap();
        assert_eq!(g1.legitimacy(), Decimal::from(65));
        assert_eq!(g2.legitimacy(), Decimal::from(55));
        assert_eq!(g1.data().admin_capacity, 4);
        assert_eq!(ctx.scheduler().last_sequence(Cadence::Yearly), 1);
    }

    #[test]
    fn out_of_sequence_tick_halts_cadence() {
        let mut ctx = two_realms();
        let providers = StaticProviders::new();
        let event = TickEvent {
            cadence: Cadence::Monthly,
            sequence: 5,
            date: ctx.date(),
        };
        let err = ctx.handle_tick(&event, &providers).unwrap_err();
        assert!(matches!(err, SimError::MissedTick { cadence: Cadence::Monthly, expected: 1, got: 5 }));
        assert!(ctx.scheduler().is_halted(Cadence::Monthly));
        // days still run until the halted cadence fires again
        ctx.run_days(30, &providers).unwrap();
        assert!(ctx.run_days(1, &providers).is_err());
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1000);
    }

    #[test]
    fn halted_cadence_leaves_other_cadences_ticking() {
        let mut ctx = two_realms();
        let providers = StaticProviders::new();
        let edict = ctx.enact_edict(RealmId(1), &levy(3)).unwrap();
        let stray = TickEvent {
            cadence: Cadence::Monthly,
            sequence: 9,
            date: ctx.date(),
        };
        assert!(ctx.handle_tick(&stray, &providers).is_err());

        let mut failures = 0;
        for _ in 0..100 {
            if let Err(err) = ctx.step_day(&providers) {
                assert!(matches!(err, SimError::MissedTick { cadence: Cadence::Monthly, .. }));
                failures += 1;
            }
        }
        // Feb 1, Mar 1 and Apr 1 each report the halted monthly cadence
        assert_eq!(failures, 3);
        assert_eq!(ctx.date(), NaiveDate::from_ymd_opt(1200, 4, 10).unwrap());
        assert_eq!(ctx.scheduler().last_sequence(Cadence::Daily), 100);
        assert_eq!(ctx.scheduler().last_sequence(Cadence::Monthly), 0);
        assert_eq!(ctx.scheduler().last_sequence(Cadence::Seasonal), 1);
        assert!(!ctx.scheduler().is_halted(Cadence::Seasonal));
        assert!(!ctx.edicts().is_active(edict));
        assert_eq!(ctx.store().get_resource(CityId(1), ResourceKind::Gold), 1000);
    }

    #[test]
    fn snapshot_restore_continues_identically() {
        let mut ctx = two_realms();
        let mut providers = StaticProviders::new();
        let agent = providers.spawn_agent();
        let office = ctx
            .create_office(RealmId(2), OfficePurpose::ManageGranary)
            .unwrap();
        ctx.assign_office(RealmId(2), office, agent).unwrap();
        ctx.set_office_automation(RealmId(2), office, true).unwrap();
        ctx.create_contract(RealmId(1), RealmId(2), ContractKind::Tributary)
            .unwrap();
        ctx.enact_edict(RealmId(1), &levy(9)).unwrap();
        ctx.run_days(40, &providers).unwrap();

        let snap = ctx.snapshot();
        let text = snap.to_json().unwrap();
        let mut restored = SimContext::from_snapshot(
            Snapshot::from_json(&text).unwrap(),
            ctx.definitions().clone(),
        )
        .unwrap();
        assert_eq!(restored.snapshot(), snap);
        assert_eq!(restored.modifiers(), ctx.modifiers());

        ctx.run_days(200, &providers).unwrap();
        restored.run_days(200, &providers).unwrap();
        assert_eq!(restored.snapshot(), ctx.snapshot());
    }

    #[test]
    fn restore_requires_loaded_definitions() {
        let ctx = two_realms();
        let err = SimContext::from_snapshot(ctx.snapshot(), DefinitionRegistry::new())
            .err()
            .unwrap();
        assert_eq!(err, SimError::UnknownDefinition(DefinitionId::from_name("Mint")));
    }

    #[tokio::test]
    async fn sqlite_save_and_load_preserves_world() {
        let mut ctx = two_realms();
        ctx.run_days(45, &StaticProviders::new()).unwrap();
        let pool = persistence::init_db("sqlite::memory:").await.unwrap();
        let save = persistence::create_save(&pool, "test", None).await.unwrap();
        persistence::store_snapshot(&pool, save, &ctx.snapshot())
            .await
            .unwrap();
        let loaded = persistence::load_latest_snapshot(&pool, save)
            .await
            .unwrap()
            .unwrap();
        let restored = SimContext::from_snapshot(loaded, ctx.definitions().clone()).unwrap();
        assert_eq!(restored.snapshot(), ctx.snapshot());
        assert_eq!(restored.total_resource(ResourceKind::Gold), ctx.total_resource(ResourceKind::Gold));
    }
}
