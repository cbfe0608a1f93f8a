//! Stable identifiers used as keys across the simulation and in saves.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a resource-bearing city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CityId(pub u32);

/// Identifier of a governed realm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RealmId(pub u32);

/// Stable identity of a building definition, derived from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionId(pub u64);

impl DefinitionId {
    /// First eight bytes (big-endian) of the SHA-256 digest of `name`.
    ///
    /// Independent of load order, process and platform.
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        DefinitionId(u64::from_be_bytes(bytes))
    }
}

/// Identifier of an institution template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstitutionId(pub u32);

/// Identifier of an office, unique within its realm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfficeId(pub u32);

/// Identifier of a contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub u32);

/// Identifier of one enactment of an edict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdictId(pub u32);

/// Handle into an externally-owned agent table.
///
/// The generation changes whenever a slot is reused, so a stale handle
/// never resolves to a different agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentHandle {
    /// Slot index in the agent table.
    pub index: u32,
    /// Generation of the slot at the time the handle was issued.
    pub generation: u32,
}

macro_rules! display_id {
    ($($ty:ident => $prefix:literal),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        })*
    };
}

display_id!(
    CityId => "city",
    RealmId => "realm",
    DefinitionId => "def",
    InstitutionId => "institution",
    OfficeId => "office",
    ContractId => "contract",
    EdictId => "edict",
);

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}v{}", self.index, self.generation)
    }
}
