//! Government, office, contract, edict and modifier records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::building::Archetype;
use crate::ids::{AgentHandle, ContractId, EdictId, InstitutionId, OfficeId, RealmId};

/// Form of government.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GovernmentForm {
    Autocracy,
    Chiefdom,
    Monarchy,
    Republic,
    Theocracy,
    Oligarchy,
}

/// Territorial organisation of a realm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GovernmentStructure {
    Territorial,
    Tribal,
    Feudal,
    Centralized,
}

/// How the ruler is replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuccessionRule {
    Hereditary,
    Election,
    Appointment,
    Seniority,
}

/// Per-realm government configuration and mutable standing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernmentData {
    /// Government form.
    pub form: GovernmentForm,
    /// Realm structure.
    pub structure: GovernmentStructure,
    /// Succession rule.
    pub succession: SuccessionRule,
    /// Offices assignable before modifiers.
    pub base_admin_capacity: u32,
    /// Baseline legitimacy in [0,100]; yearly decay pulls toward it.
    pub base_legitimacy: Decimal,
    /// Attached institutions, in attachment order.
    #[serde(default)]
    pub institutions: Vec<InstitutionId>,
    /// Current legitimacy in [0,100].
    pub legitimacy: Decimal,
    /// Current administrative capacity.
    pub admin_capacity: u32,
}

impl GovernmentData {
    /// New government at its baseline values.
    pub fn new(
        form: GovernmentForm,
        structure: GovernmentStructure,
        succession: SuccessionRule,
        base_admin_capacity: u32,
        base_legitimacy: Decimal,
    ) -> Self {
        Self {
            form,
            structure,
            succession,
            base_admin_capacity,
            base_legitimacy,
            institutions: Vec::new(),
            legitimacy: base_legitimacy,
            admin_capacity: base_admin_capacity,
        }
    }
}

/// Effect dimension a modifier acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Fractional bonus to building output, e.g. 0.1 = +10%.
    BuildingEfficiency,
    /// Fractional bonus to military strength.
    MilitaryPower,
    /// Additional assignable offices.
    AdministrativeCapacity,
    /// Legitimacy points added on the yearly recompute.
    Legitimacy,
    /// Fractional bonus to gold income.
    TaxIncome,
    /// Fractional bonus to population growth.
    PopulationGrowth,
}

/// A single modifier value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    /// Affected dimension.
    pub kind: ModifierKind,
    /// Signed magnitude.
    pub value: Decimal,
}

/// Typed origin of a registered modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModifierSource {
    Institution(InstitutionId),
    Edict(EdictId),
}

/// Permanent modifier bundle attached to a government.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    /// Template id.
    pub id: InstitutionId,
    /// Display name.
    pub name: String,
    /// Modifiers contributed while attached.
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// Administrative role purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OfficePurpose {
    ManageTaxCollection,
    ManageGranary,
    ManageConstruction,
    ManageDiplomacy,
    ManageFaith,
}

/// Realm-scoped administrative role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    /// Id within the realm.
    pub id: OfficeId,
    /// What the office does.
    pub purpose: OfficePurpose,
    /// Assigned agent, if any. The office never owns the agent.
    pub agent: Option<AgentHandle>,
    /// Whether the daily automation pass acts for this office.
    pub automated: bool,
}

/// Kind of bilateral relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Vassal,
    Governor,
    Tributary,
}

/// Percentage terms of a contract. Stored raw; validated before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Share of the subject's gold income owed to the overlord, in percent.
    pub gold_share: i32,
    /// Share of the subject's manpower owed to the overlord, in percent.
    pub manpower_share: i32,
    /// Whether the subject keeps its own government.
    pub retains_government: bool,
}

impl ContractKind {
    /// Default terms for a freshly created contract of this kind.
    pub fn default_terms(self) -> ContractTerms {
        match self {
            ContractKind::Vassal => ContractTerms {
                gold_share: 10,
                manpower_share: 25,
                retains_government: true,
            },
            ContractKind::Governor => ContractTerms {
                gold_share: 30,
                manpower_share: 10,
                retains_government: false,
            },
            ContractKind::Tributary => ContractTerms {
                gold_share: 20,
                manpower_share: 0,
                retains_government: true,
            },
        }
    }
}

/// Directed overlord to subject relationship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Contract id.
    pub id: ContractId,
    /// Receiving realm.
    pub overlord: RealmId,
    /// Obligated realm.
    pub subject: RealmId,
    /// Relationship kind.
    pub kind: ContractKind,
    /// Current terms.
    pub terms: ContractTerms,
    /// Subject loyalty in [0,100].
    pub loyalty: Decimal,
}

/// Edicts conflict when they share a category on one realm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdictCategory {
    Economic,
    Military,
    Religious,
    Civic,
}

/// Template of a timed realm-wide policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdictDefinition {
    /// Display name.
    pub name: String,
    /// Conflict category.
    pub category: EdictCategory,
    /// Duration in simulated months.
    pub duration_months: u32,
    /// Modifier registered while active.
    #[serde(default)]
    pub effect: Option<Modifier>,
    /// Loyalty applied once per archetype on enactment.
    #[serde(default)]
    pub loyalty_deltas: BTreeMap<Archetype, Decimal>,
}

/// An enacted edict counting down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveEdict {
    /// Enactment id.
    pub id: EdictId,
    /// Realm it was enacted on.
    pub realm: RealmId,
    /// Template snapshot at enactment time.
    pub definition: EdictDefinition,
    /// Months left before expiry.
    pub remaining_months: u32,
}
