//! Per-realm government: legitimacy, administrative capacity, offices,
//! archetype loyalty and revolt risk.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    clamp_score, score_max, validate_government, AgentHandle, Archetype, EntityRef,
    GovernmentData, GovernmentForm, Institution, InstitutionId, LegitimacyTuning, ModifierKind,
    ModifierSource, Office, OfficeId, OfficePurpose, RealmId, ResourceAmount, ResourceKind,
    SimError,
};
use sim_econ::ResourceLedger;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::modifiers::ModifierRegistry;

/// Loyalty of an archetype nobody has touched yet.
pub fn default_loyalty() -> Decimal {
    Decimal::from(50)
}

/// Discrete band of revolt risk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RevoltTier {
    Calm,
    Restless,
    Unrest,
    Revolt,
}

impl RevoltTier {
    /// Tier of a risk score in [0, 100].
    pub fn from_risk(risk: Decimal) -> Self {
        if risk < Decimal::from(25) {
            RevoltTier::Calm
        } else if risk < Decimal::from(50) {
            RevoltTier::Restless
        } else if risk < Decimal::from(75) {
            RevoltTier::Unrest
        } else {
            RevoltTier::Revolt
        }
    }
}

/// Revolt risk in [0, 100] from legitimacy, archetype loyalty and subject
/// contract loyalty, each in [0, 100].
///
/// Strictly decreasing in every argument.
pub fn revolt_risk(legitimacy: Decimal, archetype_loyalty: Decimal, contract_loyalty: Decimal) -> Decimal {
    let gap = |v: Decimal| score_max() - clamp_score(v);
    gap(legitimacy) * Decimal::new(4, 1)
        + gap(archetype_loyalty) * Decimal::new(4, 1)
        + gap(contract_loyalty) * Decimal::new(2, 1)
}

/// Population-weighted mean loyalty. Falls back to the plain mean over all
/// archetypes when the population is empty.
pub fn weighted_loyalty(
    loyalty: &BTreeMap<Archetype, Decimal>,
    population: &BTreeMap<Archetype, u64>,
) -> Decimal {
    let of = |a: Archetype| loyalty.get(&a).copied().unwrap_or_else(default_loyalty);
    let total: u64 = population.values().sum();
    if total == 0 {
        let sum: Decimal = Archetype::ALL.iter().map(|&a| of(a)).sum();
        return sum / Decimal::from(Archetype::ALL.len() as u64);
    }
    let weighted: Decimal = population
        .iter()
        .map(|(&a, &n)| of(a) * Decimal::from(n))
        .sum();
    weighted / Decimal::from(total)
}

/// Resource an automated, staffed office collects each day.
pub fn daily_office_yield(purpose: OfficePurpose) -> Option<ResourceAmount> {
    match purpose {
        OfficePurpose::ManageTaxCollection => Some(ResourceAmount::new(ResourceKind::Gold, 2)),
        OfficePurpose::ManageGranary => Some(ResourceAmount::new(ResourceKind::Food, 3)),
        OfficePurpose::ManageConstruction
        | OfficePurpose::ManageDiplomacy
        | OfficePurpose::ManageFaith => None,
    }
}

/// Read-only inputs to the yearly legitimacy recompute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegitimacyInputs {
    /// Whether the ruler's culture matches the realm's majority.
    pub culture_match: bool,
    /// Clergy happiness in [-1, 1].
    pub clergy_happiness: Decimal,
}

/// Outcome of one daily automation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutomationReport {
    /// Offices whose agent no longer exists and were vacated.
    pub vacated: Vec<OfficeId>,
    /// Resources collected by automated offices.
    pub collected: ResourceLedger,
}

/// Government of one realm.
#[derive(Clone, Debug, PartialEq)]
pub struct Government {
    realm: RealmId,
    data: GovernmentData,
    offices: BTreeMap<OfficeId, Office>,
    next_office: u32,
    loyalty: BTreeMap<Archetype, Decimal>,
    revolt_risk: Decimal,
}

impl Government {
    /// New government with no offices and default loyalty.
    pub fn new(realm: RealmId, data: GovernmentData) -> Self {
        Self {
            realm,
            data,
            offices: BTreeMap::new(),
            next_office: 1,
            loyalty: BTreeMap::new(),
            revolt_risk: Decimal::ZERO,
        }
    }

    /// Reassemble a government from saved parts.
    pub fn restore(
        realm: RealmId,
        data: GovernmentData,
        offices: Vec<Office>,
        loyalty: BTreeMap<Archetype, Decimal>,
        revolt_risk: Decimal,
    ) -> Self {
        let next_office = offices.iter().map(|o| o.id.0).max().unwrap_or(0) + 1;
        Self {
            realm,
            data,
            offices: offices.into_iter().map(|o| (o.id, o)).collect(),
            next_office,
            loyalty,
            revolt_risk,
        }
    }

    /// Realm this government rules.
    pub fn realm(&self) -> RealmId {
        self.realm
    }

    /// Configuration and standing.
    pub fn data(&self) -> &GovernmentData {
        &self.data
    }

    /// Current legitimacy.
    pub fn legitimacy(&self) -> Decimal {
        self.data.legitimacy
    }

    /// Offices in id order.
    pub fn offices(&self) -> impl Iterator<Item = &Office> {
        self.offices.values()
    }

    /// Office by id.
    pub fn office(&self, id: OfficeId) -> Option<&Office> {
        self.offices.get(&id)
    }

    /// Number of offices with an agent.
    pub fn assigned_offices(&self) -> usize {
        self.offices.values().filter(|o| o.agent.is_some()).count()
    }

    fn office_mut(&mut self, id: OfficeId) -> Result<&mut Office, SimError> {
        let realm = self.realm;
        self.offices
            .get_mut(&id)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Office(realm, id)))
    }

    /// Create a vacant, manual office.
    pub fn create_office(&mut self, purpose: OfficePurpose) -> OfficeId {
        let id = OfficeId(self.next_office);
        self.next_office += 1;
        self.offices.insert(
            id,
            Office {
                id,
                purpose,
                agent: None,
                automated: false,
            },
        );
        id
    }

    /// Remove an office; its agent, if any, is simply released.
    pub fn remove_office(&mut self, id: OfficeId) -> Result<Office, SimError> {
        let realm = self.realm;
        self.offices
            .remove(&id)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Office(realm, id)))
    }

    /// Assign `agent` to an office.
    ///
    /// Filling a vacant office fails with [`SimError::CapacityExceeded`] when
    /// every unit of administrative capacity is already in use; replacing the
    /// agent of an occupied office does not consume capacity.
    pub fn assign_office(&mut self, id: OfficeId, agent: AgentHandle) -> Result<(), SimError> {
        let capacity = self.data.admin_capacity;
        let assigned = self.assigned_offices();
        let realm = self.realm;
        let office = self.office_mut(id)?;
        if office.agent.is_none() && assigned >= capacity as usize {
            return Err(SimError::CapacityExceeded { realm, capacity });
        }
        office.agent = Some(agent);
        Ok(())
    }

    /// Clear an office's agent, returning it.
    pub fn vacate_office(&mut self, id: OfficeId) -> Result<Option<AgentHandle>, SimError> {
        Ok(self.office_mut(id)?.agent.take())
    }

    /// Toggle daily automation of an office.
    pub fn set_automation(&mut self, id: OfficeId, automated: bool) -> Result<(), SimError> {
        self.office_mut(id)?.automated = automated;
        Ok(())
    }

    /// Daily pass: vacate offices whose agent is gone, then collect the
    /// yield of every automated, staffed office.
    pub fn run_automation<F>(&mut self, agent_alive: F) -> AutomationReport
    where
        F: Fn(AgentHandle) -> bool,
    {
        let mut report = AutomationReport::default();
        for office in self.offices.values_mut() {
            if let Some(agent) = office.agent {
                if !agent_alive(agent) {
                    office.agent = None;
                    report.vacated.push(office.id);
                    debug!(realm = %self.realm, office = %office.id, %agent, "vacated stale office");
                    continue;
                }
                if office.automated {
                    if let Some(y) = daily_office_yield(office.purpose) {
                        report.collected.add(y.kind, y.quantity);
                    }
                }
            }
        }
        report
    }

    /// Loyalty of `archetype`, 50 when untouched.
    pub fn loyalty(&self, archetype: Archetype) -> Decimal {
        self.loyalty
            .get(&archetype)
            .copied()
            .unwrap_or_else(default_loyalty)
    }

    /// Stored loyalty entries.
    pub fn loyalty_map(&self) -> &BTreeMap<Archetype, Decimal> {
        &self.loyalty
    }

    /// Set loyalty of `archetype`, clamped to [0, 100].
    pub fn set_loyalty(&mut self, archetype: Archetype, value: Decimal) {
        self.loyalty.insert(archetype, clamp_score(value));
    }

    /// Adjust loyalty of `archetype` by `delta`, clamped to [0, 100].
    pub fn adjust_loyalty(&mut self, archetype: Archetype, delta: Decimal) {
        let current = self.loyalty(archetype);
        self.set_loyalty(archetype, current + delta);
    }

    /// Recompute administrative capacity from the base and modifiers.
    ///
    /// When the new capacity is below the number of assigned offices, the
    /// surplus is vacated, highest office id first. Returns the vacated
    /// offices.
    pub fn recompute_capacity(&mut self, modifiers: &ModifierRegistry) -> Vec<OfficeId> {
        let bonus = modifiers.total(self.realm, ModifierKind::AdministrativeCapacity);
        let total = (Decimal::from(self.data.base_admin_capacity) + bonus).floor();
        self.data.admin_capacity = if total.is_sign_negative() {
            0
        } else {
            total.to_u32().unwrap_or(u32::MAX)
        };

        let capacity = self.data.admin_capacity as usize;
        let surplus = self.assigned_offices().saturating_sub(capacity);
        let mut vacated = Vec::with_capacity(surplus);
        for office in self.offices.values_mut().rev() {
            if vacated.len() == surplus {
                break;
            }
            if let Some(agent) = office.agent.take() {
                info!(realm = %self.realm, office = %office.id, %agent, capacity, "office vacated over capacity");
                vacated.push(office.id);
            }
        }
        vacated
    }

    /// Yearly legitimacy recompute.
    ///
    /// Decays toward the baseline, then applies the culture bonus or penalty,
    /// the clergy contribution (doubled for theocracies) and any legitimacy
    /// modifiers.
    pub fn yearly_legitimacy(
        &mut self,
        tuning: &LegitimacyTuning,
        inputs: LegitimacyInputs,
        modifiers: &ModifierRegistry,
    ) -> Decimal {
        let current = self.data.legitimacy;
        let mut next = current + (self.data.base_legitimacy - current) * tuning.decay_rate;
        next += if inputs.culture_match {
            tuning.culture_bonus
        } else {
            -tuning.culture_bonus
        };
        let clergy = inputs
            .clergy_happiness
            .clamp(Decimal::NEGATIVE_ONE, Decimal::ONE);
        let mut weight = tuning.clergy_weight;
        if self.data.form == GovernmentForm::Theocracy {
            weight *= Decimal::from(2);
        }
        next += clergy * weight;
        next += modifiers.total(self.realm, ModifierKind::Legitimacy);
        self.data.legitimacy = clamp_score(next);
        self.data.legitimacy
    }

    /// Seasonal revolt evaluation; stores and returns the new risk.
    ///
    /// `contract_loyalty` is the mean loyalty of contracts where this realm
    /// is the subject; `None` when it is nobody's subject.
    pub fn evaluate_revolt(
        &mut self,
        population: &BTreeMap<Archetype, u64>,
        contract_loyalty: Option<Decimal>,
    ) -> Decimal {
        let before = RevoltTier::from_risk(self.revolt_risk);
        let archetypes = weighted_loyalty(&self.loyalty, population);
        self.revolt_risk = revolt_risk(
            self.data.legitimacy,
            archetypes,
            contract_loyalty.unwrap_or_else(score_max),
        );
        let after = RevoltTier::from_risk(self.revolt_risk);
        if after != before {
            info!(realm = %self.realm, ?before, ?after, "revolt tier changed");
        }
        self.revolt_risk
    }

    /// Last evaluated revolt risk.
    pub fn revolt_risk(&self) -> Decimal {
        self.revolt_risk
    }

    /// Tier of the last evaluated revolt risk.
    pub fn revolt_tier(&self) -> RevoltTier {
        RevoltTier::from_risk(self.revolt_risk)
    }
}

/// Every realm's government, iterated in ascending realm order.
#[derive(Clone, Debug, Default)]
pub struct GovernmentRegistry {
    realms: BTreeMap<RealmId, Government>,
}

impl GovernmentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a realm. Returns false, changing nothing, if it already exists.
    pub fn create_realm(&mut self, realm: RealmId, data: GovernmentData) -> Result<bool, SimError> {
        if self.realms.contains_key(&realm) {
            return Ok(false);
        }
        validate_government(&data).map_err(|e| SimError::InvalidTerm(e.to_string()))?;
        self.realms.insert(realm, Government::new(realm, data));
        Ok(true)
    }

    /// Reinstate a saved government.
    pub fn restore(&mut self, government: Government) {
        self.realms.insert(government.realm, government);
    }

    /// Whether `realm` exists.
    pub fn contains(&self, realm: RealmId) -> bool {
        self.realms.contains_key(&realm)
    }

    /// Government of `realm`.
    pub fn get(&self, realm: RealmId) -> Result<&Government, SimError> {
        self.realms
            .get(&realm)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Realm(realm)))
    }

    /// Mutable government of `realm`.
    pub fn get_mut(&mut self, realm: RealmId) -> Result<&mut Government, SimError> {
        self.realms
            .get_mut(&realm)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Realm(realm)))
    }

    /// Governments in realm order.
    pub fn iter(&self) -> impl Iterator<Item = &Government> {
        self.realms.values()
    }

    /// Mutable governments in realm order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Government> {
        self.realms.values_mut()
    }

    /// Realm ids in ascending order.
    pub fn realm_ids(&self) -> Vec<RealmId> {
        self.realms.keys().copied().collect()
    }

    /// Attach an institution and register its modifiers. Returns false if
    /// it was already attached.
    pub fn attach_institution(
        &mut self,
        realm: RealmId,
        institution: &Institution,
        modifiers: &mut ModifierRegistry,
    ) -> Result<bool, SimError> {
        let gov = self.get_mut(realm)?;
        if gov.data.institutions.contains(&institution.id) {
            return Ok(false);
        }
        gov.data.institutions.push(institution.id);
        modifiers.register(
            realm,
            ModifierSource::Institution(institution.id),
            institution.modifiers.clone(),
        );
        gov.recompute_capacity(modifiers);
        info!(%realm, institution = %institution.name, "institution attached");
        Ok(true)
    }

    /// Detach an institution and unregister every modifier it contributed.
    /// Returns the offices vacated because capacity dropped.
    pub fn detach_institution(
        &mut self,
        realm: RealmId,
        institution: InstitutionId,
        modifiers: &mut ModifierRegistry,
    ) -> Result<Vec<OfficeId>, SimError> {
        let gov = self.get_mut(realm)?;
        let pos = gov
            .data
            .institutions
            .iter()
            .position(|&i| i == institution)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Institution(institution)))?;
        gov.data.institutions.remove(pos);
        modifiers.unregister(realm, ModifierSource::Institution(institution));
        let vacated = gov.recompute_capacity(modifiers);
        info!(%realm, %institution, vacated = vacated.len(), "institution detached");
        Ok(vacated)
    }
}
