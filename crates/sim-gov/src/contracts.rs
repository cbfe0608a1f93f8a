//! Overlord/subject contracts between realms.

use rust_decimal::Decimal;
use sim_core::{
    clamp_score, score_max, Contract, ContractId, ContractKind, ContractTerms, EntityRef,
    GovernmentForm, RealmId, ResourceKind, SimError,
};
use sim_econ::{round_quantity, ResourceLedger};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Check that every percentage of `terms` lies within [0, 100].
pub fn validate_terms(terms: &ContractTerms) -> Result<(), SimError> {
    for (name, value) in [
        ("gold share", terms.gold_share),
        ("manpower share", terms.manpower_share),
    ] {
        if !(0..=100).contains(&value) {
            return Err(SimError::InvalidTerm(format!("{name} {value}% outside 0..=100")));
        }
    }
    Ok(())
}

/// Subject loyalty produced by `terms` between realms of the given forms.
///
/// Heavier shares lower loyalty, keeping one's own government raises it and
/// matching government forms add 10 (mismatched forms subtract 10).
pub fn contract_loyalty(
    terms: &ContractTerms,
    overlord_form: GovernmentForm,
    subject_form: GovernmentForm,
) -> Decimal {
    let mut loyalty = score_max()
        - Decimal::from(terms.gold_share) * Decimal::new(5, 1)
        - Decimal::from(terms.manpower_share) * Decimal::new(3, 1)
        - Decimal::from(5);
    if terms.retains_government {
        loyalty += Decimal::from(10);
    }
    loyalty += if overlord_form == subject_form {
        Decimal::from(10)
    } else {
        Decimal::from(-10)
    };
    clamp_score(loyalty)
}

/// Tribute owed under one contract for a month.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tribute {
    /// Applied to the subject's capital.
    pub subject_debit: ResourceLedger,
    /// Applied to the overlord's capital.
    pub overlord_credit: ResourceLedger,
}

/// Owns every contract, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct ContractEngine {
    contracts: BTreeMap<ContractId, Contract>,
    next_id: u32,
}

impl ContractEngine {
    /// Empty engine.
    pub fn new() -> Self {
        Self {
            contracts: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild from saved contracts.
    pub fn restore(contracts: Vec<Contract>) -> Self {
        let next_id = contracts.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
        Self {
            contracts: contracts.into_iter().map(|c| (c.id, c)).collect(),
            next_id,
        }
    }

    /// Create a contract with the kind's default terms and loyalty 50.
    pub fn create_contract(
        &mut self,
        overlord: RealmId,
        subject: RealmId,
        kind: ContractKind,
    ) -> Result<ContractId, SimError> {
        if overlord == subject {
            return Err(SimError::InvalidTerm(format!(
                "{overlord} cannot contract with itself"
            )));
        }
        let id = ContractId(self.next_id);
        self.next_id += 1;
        self.contracts.insert(
            id,
            Contract {
                id,
                overlord,
                subject,
                kind,
                terms: kind.default_terms(),
                loyalty: Decimal::from(50),
            },
        );
        info!(contract = %id, %overlord, %subject, ?kind, "contract created");
        Ok(id)
    }

    fn get_mut(&mut self, id: ContractId) -> Result<&mut Contract, SimError> {
        self.contracts
            .get_mut(&id)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Contract(id)))
    }

    /// Contract by id.
    pub fn get(&self, id: ContractId) -> Result<&Contract, SimError> {
        self.contracts
            .get(&id)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Contract(id)))
    }

    /// Replace the terms of a contract after validating them.
    pub fn set_terms(&mut self, id: ContractId, terms: ContractTerms) -> Result<(), SimError> {
        let contract = self.get_mut(id)?;
        validate_terms(&terms)?;
        contract.terms = terms;
        Ok(())
    }

    /// Recompute loyalty from the current terms. Idempotent.
    pub fn update_loyalty(
        &mut self,
        id: ContractId,
        overlord_form: GovernmentForm,
        subject_form: GovernmentForm,
    ) -> Result<Decimal, SimError> {
        let contract = self.get_mut(id)?;
        validate_terms(&contract.terms)?;
        contract.loyalty = contract_loyalty(&contract.terms, overlord_form, subject_form);
        debug!(contract = %id, loyalty = %contract.loyalty, "contract loyalty updated");
        Ok(contract.loyalty)
    }

    /// Remove a contract.
    pub fn dissolve(&mut self, id: ContractId) -> Result<Contract, SimError> {
        let contract = self
            .contracts
            .remove(&id)
            .ok_or(SimError::UnregisteredEntity(EntityRef::Contract(id)))?;
        info!(contract = %id, overlord = %contract.overlord, subject = %contract.subject, "contract dissolved");
        Ok(contract)
    }

    /// Contracts in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether no contract exists.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Contracts where `realm` is the subject.
    pub fn contracts_of_subject(&self, realm: RealmId) -> Vec<&Contract> {
        self.contracts
            .values()
            .filter(|c| c.subject == realm)
            .collect()
    }

    /// Mean loyalty of the contracts where `realm` is the subject, or
    /// `None` when it owes nobody.
    pub fn subject_loyalty(&self, realm: RealmId) -> Option<Decimal> {
        let loyalties: Vec<Decimal> = self
            .contracts_of_subject(realm)
            .into_iter()
            .map(|c| c.loyalty)
            .collect();
        if loyalties.is_empty() {
            return None;
        }
        let sum: Decimal = loyalties.iter().copied().sum();
        Some(sum / Decimal::from(loyalties.len() as u64))
    }

    /// Gold and manpower owed on the subject's positive monthly `income`.
    pub fn tribute(&self, id: ContractId, income: &ResourceLedger) -> Result<Tribute, SimError> {
        let contract = self.get(id)?;
        validate_terms(&contract.terms)?;
        let mut owed = ResourceLedger::new();
        for (kind, share) in [
            (ResourceKind::Gold, contract.terms.gold_share),
            (ResourceKind::Manpower, contract.terms.manpower_share),
        ] {
            let earned = income.get(kind);
            if earned <= 0 {
                continue;
            }
            let amount = round_quantity(Decimal::from(earned) * Decimal::new(share.into(), 2));
            owed.add(kind, amount);
        }
        Ok(Tribute {
            subject_debit: owed.negated(),
            overlord_credit: owed,
        })
    }
}
