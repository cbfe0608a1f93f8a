//! Serializable picture of a whole simulation.
//!
//! Records are plain vectors keyed by the ids they carry, so the JSON form
//! never depends on map-key encodings of newtype ids.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    ActiveEdict, Archetype, Cadence, CityId, Contract, DefinitionId, GovernmentData, Institution,
    Office, RealmId, ResourceMap, SimConfig,
};
use std::collections::BTreeMap;

use crate::PersistenceError;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One standing building of a city.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub definition: DefinitionId,
    #[serde(default)]
    pub workforce: BTreeMap<Archetype, u32>,
    #[serde(default)]
    pub hub: Option<usize>,
}

/// A city with its balances and roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRecord {
    pub id: CityId,
    pub realm: Option<RealmId>,
    pub balances: ResourceMap,
    pub buildings: Vec<BuildingRecord>,
}

/// A realm's government and standing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealmRecord {
    pub id: RealmId,
    pub capital: Option<CityId>,
    pub government: GovernmentData,
    pub offices: Vec<Office>,
    pub loyalty: BTreeMap<Archetype, Decimal>,
    pub revolt_risk: Decimal,
}

/// Last accepted sequence of one tick cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceRecord {
    pub cadence: Cadence,
    pub last_sequence: u64,
    pub halted: bool,
}

/// Complete saved state.
///
/// Building definitions are not stored: they are reloaded from mods and
/// matched by their name-derived [`DefinitionId`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub date: NaiveDate,
    pub config: SimConfig,
    pub cities: Vec<CityRecord>,
    pub realms: Vec<RealmRecord>,
    /// Institution templates, attached or not.
    pub institutions: Vec<Institution>,
    pub contracts: Vec<Contract>,
    pub edicts: Vec<ActiveEdict>,
    pub cadences: Vec<CadenceRecord>,
}

impl Snapshot {
    /// Empty snapshot at `date`.
    pub fn new(date: NaiveDate, config: SimConfig) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            date,
            config,
            cities: Vec::new(),
            realms: Vec::new(),
            institutions: Vec::new(),
            contracts: Vec::new(),
            edicts: Vec::new(),
            cadences: Vec::new(),
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON, rejecting unknown format versions.
    pub fn from_json(text: &str) -> Result<Self, PersistenceError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}
