//! Read-only views of the wider world the simulation core consults.

use rust_decimal::Decimal;
use sim_core::{AgentHandle, Archetype, RealmId};
use std::collections::BTreeMap;

/// Whether a realm's ruler shares the majority culture.
pub trait CultureProvider {
    fn culture_matches(&self, realm: RealmId) -> bool;
}

/// Population by archetype and average archetype skill.
pub trait PopulationProvider {
    fn population(&self, realm: RealmId) -> BTreeMap<Archetype, u64>;
    /// Average skill multiplier of `archetype`; 1 is baseline.
    fn skill(&self, archetype: Archetype) -> Decimal;
}

/// Clergy sentiment, in [-1, 1].
pub trait ReligionProvider {
    fn clergy_happiness(&self, realm: RealmId) -> Decimal;
}

/// Liveness of agent handles held by offices.
pub trait AgentDirectory {
    fn is_valid(&self, agent: AgentHandle) -> bool;
}

/// Everything a tick needs from outside.
pub trait Providers: CultureProvider + PopulationProvider + ReligionProvider + AgentDirectory {}

impl<T> Providers for T where T: CultureProvider + PopulationProvider + ReligionProvider + AgentDirectory {}

/// Table-backed providers.
///
/// Unlisted realms match culture, have no population and neutral clergy;
/// unlisted archetypes have skill 1.
#[derive(Clone, Debug, Default)]
pub struct StaticProviders {
    culture: BTreeMap<RealmId, bool>,
    population: BTreeMap<RealmId, BTreeMap<Archetype, u64>>,
    skill: BTreeMap<Archetype, Decimal>,
    clergy: BTreeMap<RealmId, Decimal>,
    /// Current generation per agent slot; absent slots are dead.
    agents: BTreeMap<u32, u32>,
    next_agent: u32,
}

impl StaticProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_culture_match(&mut self, realm: RealmId, matches: bool) -> &mut Self {
        self.culture.insert(realm, matches);
        self
    }

    pub fn set_population(&mut self, realm: RealmId, archetype: Archetype, count: u64) -> &mut Self {
        self.population.entry(realm).or_default().insert(archetype, count);
        self
    }

    pub fn set_skill(&mut self, archetype: Archetype, skill: Decimal) -> &mut Self {
        self.skill.insert(archetype, skill);
        self
    }

    pub fn set_clergy_happiness(&mut self, realm: RealmId, happiness: Decimal) -> &mut Self {
        self.clergy.insert(realm, happiness);
        self
    }

    /// Create a live agent in a fresh slot.
    pub fn spawn_agent(&mut self) -> AgentHandle {
        let index = self.next_agent;
        self.next_agent += 1;
        self.agents.insert(index, 0);
        AgentHandle {
            index,
            generation: 0,
        }
    }

    /// Kill an agent. Its handle becomes invalid for good.
    pub fn retire_agent(&mut self, agent: AgentHandle) -> bool {
        if !self.is_valid(agent) {
            return false;
        }
        self.agents.remove(&agent.index);
        true
    }

    /// Reuse a dead slot, bumping its generation.
    pub fn respawn_agent(&mut self, index: u32, previous: u32) -> AgentHandle {
        let generation = previous.wrapping_add(1);
        self.agents.insert(index, generation);
        AgentHandle { index, generation }
    }
}

impl CultureProvider for StaticProviders {
    fn culture_matches(&self, realm: RealmId) -> bool {
        self.culture.get(&realm).copied().unwrap_or(true)
    }
}

impl PopulationProvider for StaticProviders {
    fn population(&self, realm: RealmId) -> BTreeMap<Archetype, u64> {
        self.population.get(&realm).cloned().unwrap_or_default()
    }

    fn skill(&self, archetype: Archetype) -> Decimal {
        self.skill.get(&archetype).copied().unwrap_or(Decimal::ONE)
    }
}

impl ReligionProvider for StaticProviders {
    fn clergy_happiness(&self, realm: RealmId) -> Decimal {
        self.clergy.get(&realm).copied().unwrap_or(Decimal::ZERO)
    }
}

impl AgentDirectory for StaticProviders {
    fn is_valid(&self, agent: AgentHandle) -> bool {
        self.agents.get(&agent.index) == Some(&agent.generation)
    }
}
