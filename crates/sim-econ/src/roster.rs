//! Loaded building definitions and the buildings standing in each city.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_building, Archetype, BuildingDefinition, DefinitionId, SimError, ValidationError,
    WorkerSlot,
};
use std::collections::BTreeMap;

use crate::ledger::ResourceLedger;
use crate::production::settle_building;
use crate::workers::WorkerAllocationIndex;

/// A validated definition together with its worker lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDefinition {
    /// The template.
    pub definition: BuildingDefinition,
    /// Lookup built from `definition.worker_slots`.
    pub workers: WorkerAllocationIndex,
}

/// Definitions available to the simulation, keyed by stable id.
#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    defs: BTreeMap<DefinitionId, LoadedDefinition>,
}

impl DefinitionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and load `def`, building its worker index.
    pub fn register(&mut self, def: BuildingDefinition) -> Result<DefinitionId, ValidationError> {
        validate_building(&def)?;
        let id = def.id();
        if self.defs.contains_key(&id) {
            return Err(ValidationError::Duplicate(def.name));
        }
        let workers = WorkerAllocationIndex::build(&def.worker_slots);
        self.defs.insert(
            id,
            LoadedDefinition {
                definition: def,
                workers,
            },
        );
        Ok(id)
    }

    /// Replace the worker slots of a loaded definition and rebuild its index.
    pub fn update_slots(&mut self, id: DefinitionId, slots: Vec<WorkerSlot>) -> Result<(), SimError> {
        let loaded = self.defs.get_mut(&id).ok_or(SimError::UnknownDefinition(id))?;
        loaded.definition.worker_slots = slots;
        loaded.workers.rebuild(&loaded.definition.worker_slots);
        Ok(())
    }

    /// Loaded definition by id.
    pub fn get(&self, id: DefinitionId) -> Option<&LoadedDefinition> {
        self.defs.get(&id)
    }

    /// Loaded definition by id, or [`SimError::UnknownDefinition`].
    pub fn require(&self, id: DefinitionId) -> Result<&LoadedDefinition, SimError> {
        self.defs.get(&id).ok_or(SimError::UnknownDefinition(id))
    }

    /// Number of loaded definitions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DefinitionId, &LoadedDefinition)> {
        self.defs.iter().map(|(&id, d)| (id, d))
    }
}

/// One standing building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingInstance {
    /// Template id.
    pub definition: DefinitionId,
    /// Assigned workers per archetype.
    #[serde(default)]
    pub workforce: BTreeMap<Archetype, u32>,
    /// Index of the hub this hublet is attached to.
    #[serde(default)]
    pub hub: Option<usize>,
}

/// The buildings of one city, in construction order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityBuildings {
    buildings: Vec<BuildingInstance>,
}

impl CityBuildings {
    /// Rebuild a roster from saved instances.
    pub fn from_instances(buildings: Vec<BuildingInstance>) -> Self {
        Self { buildings }
    }

    /// Add a building, attaching hublets to `hub`. Returns its index.
    pub fn construct(
        &mut self,
        registry: &DefinitionRegistry,
        definition: DefinitionId,
        hub: Option<usize>,
    ) -> Result<usize, SimError> {
        let def = &registry.require(definition)?.definition;
        match (def.is_hublet(), hub) {
            (false, None) => {}
            (false, Some(_)) => {
                return Err(SimError::InvalidAttachment(format!(
                    "{} is not a hublet",
                    def.name
                )))
            }
            (true, None) => {
                return Err(SimError::InvalidAttachment(format!(
                    "{} requires a hub",
                    def.name
                )))
            }
            (true, Some(h)) => {
                let host = self.buildings.get(h).ok_or_else(|| {
                    SimError::InvalidAttachment(format!("no building at index {h}"))
                })?;
                let host_def = &registry.require(host.definition)?.definition;
                if !host_def.is_hub() {
                    return Err(SimError::InvalidAttachment(format!(
                        "{} is not a hub",
                        host_def.name
                    )));
                }
                if !def.accepts_hub(host_def.category) {
                    return Err(SimError::InvalidAttachment(format!(
                        "{} cannot attach to {:?} hub {}",
                        def.name, host_def.category, host_def.name
                    )));
                }
                let attached = self.buildings.iter().filter(|b| b.hub == Some(h)).count();
                if attached >= host_def.hublet_slots as usize {
                    return Err(SimError::InvalidAttachment(format!(
                        "{} has no free hublet slot",
                        host_def.name
                    )));
                }
            }
        }
        self.buildings.push(BuildingInstance {
            definition,
            workforce: BTreeMap::new(),
            hub,
        });
        Ok(self.buildings.len() - 1)
    }

    /// Set the number of `archetype` workers at building `index`.
    pub fn assign_workers(
        &mut self,
        registry: &DefinitionRegistry,
        index: usize,
        archetype: Archetype,
        count: u32,
    ) -> Result<(), SimError> {
        let building = self.buildings.get_mut(index).ok_or_else(|| {
            SimError::InvalidAttachment(format!("no building at index {index}"))
        })?;
        let loaded = registry.require(building.definition)?;
        if !loaded.workers.can_worker_type_work(archetype) {
            return Err(SimError::IneligibleWorker {
                archetype,
                building: loaded.definition.name.clone(),
            });
        }
        if count == 0 {
            building.workforce.remove(&archetype);
        } else {
            building.workforce.insert(archetype, count);
        }
        Ok(())
    }

    /// Net monthly ledger of every building in the city.
    ///
    /// `efficiency_bonus` is the realm's fractional building-efficiency
    /// modifier; `skill` supplies the average skill of each archetype.
    /// Fails before composing anything if a definition is missing.
    pub fn settle<F>(
        &self,
        registry: &DefinitionRegistry,
        efficiency_bonus: Decimal,
        skill: F,
    ) -> Result<ResourceLedger, SimError>
    where
        F: Fn(Archetype) -> Decimal,
    {
        let mut loaded = Vec::with_capacity(self.buildings.len());
        for b in &self.buildings {
            loaded.push(registry.require(b.definition)?);
        }
        let mut net = ResourceLedger::new();
        for (b, def) in self.buildings.iter().zip(loaded) {
            let workers = def.workers.eligible_workers(&b.workforce);
            let avg = def.workers.average_efficiency(&b.workforce, &skill)
                * (Decimal::ONE + efficiency_bonus);
            net.merge(&settle_building(&def.definition, workers, avg));
        }
        Ok(net)
    }

    /// Sum of population growth bonuses of every standing building.
    pub fn population_growth_bonus(&self, registry: &DefinitionRegistry) -> Decimal {
        self.buildings
            .iter()
            .filter_map(|b| registry.get(b.definition))
            .map(|d| d.definition.population_growth_bonus)
            .sum()
    }

    /// Standing buildings in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildingInstance> {
        self.buildings.iter()
    }

    /// Number of standing buildings.
    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    /// Whether the city has no building.
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}
