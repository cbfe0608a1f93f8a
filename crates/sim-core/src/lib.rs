#![deny(warnings)]

//! Core domain models and invariants for the realm simulation.
//!
//! This crate defines serializable types used across the simulation, the
//! shared error taxonomy and validation helpers that guard definition and
//! configuration invariants.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub mod building;
pub mod government;
pub mod ids;
pub mod resources;

pub use building::{Archetype, BuildingCategory, BuildingDefinition, WorkerSlot};
pub use government::{
    ActiveEdict, Contract, ContractKind, ContractTerms, EdictCategory, EdictDefinition,
    GovernmentData, GovernmentForm, GovernmentStructure, Institution, Modifier, ModifierKind,
    ModifierSource, Office, OfficePurpose, SuccessionRule,
};
pub use ids::{
    AgentHandle, CityId, ContractId, DefinitionId, EdictId, InstitutionId, OfficeId, RealmId,
};
pub use resources::{ResourceAmount, ResourceKind, ResourceMap};

/// Months that one seasonal tick represents.
pub const MONTHS_PER_SEASON: u32 = 3;

/// Upper bound of every percentage-like score (legitimacy, loyalty, risk).
pub fn score_max() -> Decimal {
    Decimal::from(100)
}

/// Clamp a score into [0, 100].
pub fn clamp_score(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, score_max())
}

/// Tick cadences delivered by the time source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Daily,
    Monthly,
    Seasonal,
    Yearly,
}

impl Cadence {
    /// Every cadence, finest first.
    pub const ALL: [Cadence; 4] = [
        Cadence::Daily,
        Cadence::Monthly,
        Cadence::Seasonal,
        Cadence::Yearly,
    ];
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cadence::Daily => "daily",
            Cadence::Monthly => "monthly",
            Cadence::Seasonal => "seasonal",
            Cadence::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

/// Reference to an entity an operation named.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityRef {
    City(CityId),
    Realm(RealmId),
    Contract(ContractId),
    Office(RealmId, OfficeId),
    Edict(EdictId),
    Institution(InstitutionId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::City(id) => write!(f, "{id}"),
            EntityRef::Realm(id) => write!(f, "{id}"),
            EntityRef::Contract(id) => write!(f, "{id}"),
            EntityRef::Office(realm, id) => write!(f, "{id} of {realm}"),
            EntityRef::Edict(id) => write!(f, "{id}"),
            EntityRef::Institution(id) => write!(f, "{id}"),
        }
    }
}

/// Errors raised by simulation operations.
///
/// Every variant except [`SimError::MissedTick`] is recoverable and leaves
/// state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// The operation referenced an entity that was never created.
    #[error("{0} is not registered")]
    UnregisteredEntity(EntityRef),
    /// Administrative capacity of the realm is exhausted.
    #[error("administrative capacity of {realm} exhausted ({capacity} offices)")]
    CapacityExceeded { realm: RealmId, capacity: u32 },
    /// Out-of-range percentage or malformed term.
    #[error("invalid term: {0}")]
    InvalidTerm(String),
    /// An edict of the same category is already active.
    #[error("{category:?} edict already active on {realm}")]
    CapacityOrConflict {
        realm: RealmId,
        category: EdictCategory,
    },
    /// A tick arrived out of sequence; the cadence is halted.
    #[error("missed {cadence} tick: expected #{expected}, got #{got}")]
    MissedTick {
        cadence: Cadence,
        expected: u64,
        got: u64,
    },
    /// Hub/hublet attachment rule violated.
    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),
    /// The archetype has no slot in the building.
    #[error("{archetype:?} cannot work in {building}")]
    IneligibleWorker {
        archetype: Archetype,
        building: String,
    },
    /// A roster referenced a definition that was never loaded.
    #[error("unknown building definition {0}")]
    UnknownDefinition(DefinitionId),
}

impl SimError {
    /// Whether the caller may retry after correcting its input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimError::MissedTick { .. })
    }
}

/// Validation errors for definitions and configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Name must be non-empty.
    #[error("empty name")]
    EmptyName,
    /// Quantities in templates must be non-negative.
    #[error("negative quantity in {0}")]
    NegativeQuantity(String),
    /// Worker slot minimum exceeds its maximum.
    #[error("worker slot for {0:?} has min > max")]
    SlotRange(Archetype),
    /// Same archetype listed twice in one building.
    #[error("duplicate worker slot for {0:?}")]
    DuplicateSlot(Archetype),
    /// Multipliers must be non-negative.
    #[error("negative efficiency in {0}")]
    NegativeEfficiency(String),
    /// A hub cannot also be a hublet.
    #[error("{0} is both hub and hublet")]
    HubAndHublet(String),
    /// Score outside [0, 100].
    #[error("score out of range [0,100]: {0}")]
    ScoreOutOfRange(Decimal),
    /// Edicts must last at least one month.
    #[error("edict {0} has zero duration")]
    ZeroDuration(String),
    /// Duplicate id or name in a definition set.
    #[error("duplicate definition: {0}")]
    Duplicate(String),
    /// Decay rate must lie within [0, 1].
    #[error("decay rate must be within [0,1]")]
    DecayRate,
}

/// Policy for balances driven below zero by a ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalancePolicy {
    /// Store the raw sum; cities may run into debt.
    #[default]
    AllowDebt,
    /// Floor each resulting balance at zero.
    ClampAtZero,
}

/// Tuning for the yearly legitimacy recompute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegitimacyTuning {
    /// Fraction of the gap to baseline closed each year.
    pub decay_rate: Decimal,
    /// Bonus for a culture match, penalty otherwise.
    pub culture_bonus: Decimal,
    /// Points per unit of clergy happiness; doubled for theocracies.
    pub clergy_weight: Decimal,
}

impl Default for LegitimacyTuning {
    fn default() -> Self {
        Self {
            decay_rate: Decimal::new(1, 1),
            culture_bonus: Decimal::from(5),
            clergy_weight: Decimal::from(5),
        }
    }
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for deterministic scenario generation.
    pub rng_seed: u64,
    /// First simulated day.
    pub start_date: NaiveDate,
    /// Food granted to a newly registered city.
    pub starting_food: i64,
    /// Gold granted to a newly registered city.
    pub starting_gold: i64,
    /// Behaviour of balances pushed below zero.
    pub balance_policy: BalancePolicy,
    /// Legitimacy recompute parameters.
    pub legitimacy: LegitimacyTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            start_date: NaiveDate::from_ymd_opt(1200, 1, 1).unwrap_or(NaiveDate::MIN),
            starting_food: 1000,
            starting_gold: 1000,
            balance_policy: BalancePolicy::AllowDebt,
            legitimacy: LegitimacyTuning::default(),
        }
    }
}

fn check_non_negative(map: &ResourceMap, what: &str) -> Result<(), ValidationError> {
    if map.values().any(|&q| q < 0) {
        return Err(ValidationError::NegativeQuantity(what.to_string()));
    }
    Ok(())
}

/// Validate a building definition.
pub fn validate_building(def: &BuildingDefinition) -> Result<(), ValidationError> {
    if def.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    check_non_negative(&def.base_production, "base production")?;
    check_non_negative(&def.max_production, "max production")?;
    check_non_negative(&def.base_maintenance, "base maintenance")?;
    check_non_negative(&def.max_maintenance, "max maintenance")?;
    if def.max_monthly_xp < 0 {
        return Err(ValidationError::NegativeQuantity("max monthly xp".into()));
    }
    if def.base_efficiency < Decimal::ZERO {
        return Err(ValidationError::NegativeEfficiency(def.name.clone()));
    }
    if def.is_hub() && def.is_hublet() {
        return Err(ValidationError::HubAndHublet(def.name.clone()));
    }
    let mut seen = BTreeSet::new();
    for slot in &def.worker_slots {
        if slot.min > slot.max {
            return Err(ValidationError::SlotRange(slot.archetype));
        }
        if !seen.insert(slot.archetype) {
            return Err(ValidationError::DuplicateSlot(slot.archetype));
        }
        if slot.efficiency.is_some_and(|e| e < Decimal::ZERO) {
            return Err(ValidationError::NegativeEfficiency(def.name.clone()));
        }
    }
    Ok(())
}

/// Validate an institution template.
pub fn validate_institution(inst: &Institution) -> Result<(), ValidationError> {
    if inst.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Validate an edict template.
pub fn validate_edict(def: &EdictDefinition) -> Result<(), ValidationError> {
    if def.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if def.duration_months == 0 {
        return Err(ValidationError::ZeroDuration(def.name.clone()));
    }
    Ok(())
}

/// Validate government data at realm creation.
pub fn validate_government(data: &GovernmentData) -> Result<(), ValidationError> {
    for score in [data.base_legitimacy, data.legitimacy] {
        if score < Decimal::ZERO || score > score_max() {
            return Err(ValidationError::ScoreOutOfRange(score));
        }
    }
    Ok(())
}

/// Validate configuration values.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ValidationError> {
    if cfg.starting_food < 0 || cfg.starting_gold < 0 {
        return Err(ValidationError::NegativeQuantity("starting allotment".into()));
    }
    let rate = cfg.legitimacy.decay_rate;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ValidationError::DecayRate);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn farm() -> BuildingDefinition {
        BuildingDefinition {
            name: "Farm".into(),
            category: BuildingCategory::Agriculture,
            hublet_slots: 2,
            hub_categories: None,
            base_production: ResourceMap::from([(ResourceKind::Food, 10)]),
            max_production: ResourceMap::from([(ResourceKind::Food, 100)]),
            base_monthly_xp: 1,
            max_monthly_xp: 4,
            base_maintenance: ResourceMap::from([(ResourceKind::Gold, 2)]),
            max_maintenance: ResourceMap::new(),
            worker_slots: vec![WorkerSlot {
                archetype: Archetype::Laborer,
                min: 2,
                max: 10,
                efficiency: None,
            }],
            population_growth_bonus: Decimal::ZERO,
            base_efficiency: Decimal::ONE,
            construction_days: 60,
        }
    }

    #[test]
    fn farm_is_valid() {
        assert_eq!(validate_building(&farm()), Ok(()));
    }

    #[test]
    fn rejects_bad_slots() {
        let mut f = farm();
        f.worker_slots[0].min = 11;
        assert_eq!(
            validate_building(&f),
            Err(ValidationError::SlotRange(Archetype::Laborer))
        );
        let mut f = farm();
        f.worker_slots.push(f.worker_slots[0].clone());
        assert_eq!(
            validate_building(&f),
            Err(ValidationError::DuplicateSlot(Archetype::Laborer))
        );
    }

    #[test]
    fn rejects_hub_that_is_also_hublet() {
        let mut f = farm();
        f.hub_categories = Some(vec![]);
        assert!(matches!(
            validate_building(&f),
            Err(ValidationError::HubAndHublet(_))
        ));
    }

    #[test]
    fn zero_duration_edict_is_invalid() {
        let e = EdictDefinition {
            name: "Levy".into(),
            category: EdictCategory::Military,
            duration_months: 0,
            effect: None,
            loyalty_deltas: Default::default(),
        };
        assert!(validate_edict(&e).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = SimConfig::default();
        validate_config(&cfg).unwrap();
        assert_eq!(cfg.starting_food, 1000);
        assert_eq!(cfg.balance_policy, BalancePolicy::AllowDebt);
    }

    #[test]
    fn config_roundtrip_with_partial_input() {
        let cfg: SimConfig = serde_json::from_str(r#"{"rng_seed": 7}"#).unwrap();
        assert_eq!(cfg.rng_seed, 7);
        assert_eq!(cfg.starting_gold, 1000);
        let s = serde_json::to_string(&cfg).unwrap();
        let back: SimConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn missed_tick_is_fatal() {
        let e = SimError::MissedTick {
            cadence: Cadence::Seasonal,
            expected: 3,
            got: 5,
        };
        assert!(!e.is_recoverable());
        assert_eq!(e.to_string(), "missed seasonal tick: expected #3, got #5");
        assert!(SimError::UnregisteredEntity(EntityRef::City(CityId(1))).is_recoverable());
    }

    proptest! {
        #[test]
        fn government_scores_in_range_validate(l in 0i64..=100) {
            let g = GovernmentData::new(
                GovernmentForm::Monarchy,
                GovernmentStructure::Feudal,
                SuccessionRule::Hereditary,
                3,
                Decimal::from(l),
            );
            prop_assert!(validate_government(&g).is_ok());
        }

        #[test]
        fn government_scores_out_of_range_fail(l in 101i64..10_000) {
            let g = GovernmentData::new(
                GovernmentForm::Republic,
                GovernmentStructure::Centralized,
                SuccessionRule::Election,
                3,
                Decimal::from(l),
            );
            prop_assert!(validate_government(&g).is_err());
        }
    }
}
