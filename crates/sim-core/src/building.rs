//! Building templates and worker slot requirements.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::DefinitionId;
use crate::resources::ResourceMap;

/// Population categories used for worker and loyalty modeling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Laborer,
    Artisan,
    Merchant,
    Clergy,
    Noble,
    Soldier,
    Scholar,
}

impl Archetype {
    /// Every archetype, in key order.
    pub const ALL: [Archetype; 7] = [
        Archetype::Laborer,
        Archetype::Artisan,
        Archetype::Merchant,
        Archetype::Clergy,
        Archetype::Noble,
        Archetype::Soldier,
        Archetype::Scholar,
    ];
}

/// Broad building categories; hublets restrict their hubs by category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingCategory {
    Agriculture,
    Industry,
    Commerce,
    Military,
    Religious,
    Administrative,
    Housing,
}

/// Worker requirement for one archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerSlot {
    /// Archetype allowed in this slot.
    pub archetype: Archetype,
    /// Minimum number of workers of this archetype.
    pub min: u32,
    /// Maximum (optimal) number of workers of this archetype.
    pub max: u32,
    /// Output multiplier for workers in this slot; unset reads as 1.0.
    #[serde(default)]
    pub efficiency: Option<Decimal>,
}

fn default_efficiency() -> Decimal {
    Decimal::ONE
}

/// Immutable building template.
///
/// Identity is [`DefinitionId::from_name`] of `name`, so the same template
/// keeps its id across loads and saves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingDefinition {
    /// Unique template name.
    pub name: String,
    /// Category used for hub/hublet matching.
    pub category: BuildingCategory,
    /// Number of hublets this building accepts (0 = not a hub).
    #[serde(default)]
    pub hublet_slots: u32,
    /// `Some` marks a hublet; the list restricts hub categories (empty = any).
    #[serde(default)]
    pub hub_categories: Option<Vec<BuildingCategory>>,
    /// Output when minimally staffed.
    #[serde(default)]
    pub base_production: ResourceMap,
    /// Output when optimally staffed.
    #[serde(default)]
    pub max_production: ResourceMap,
    /// Monthly tech experience when minimally staffed.
    #[serde(default)]
    pub base_monthly_xp: i64,
    /// Monthly tech experience when optimally staffed.
    #[serde(default)]
    pub max_monthly_xp: i64,
    /// Monthly upkeep.
    #[serde(default)]
    pub base_maintenance: ResourceMap,
    /// Upkeep at full staffing; reserved for worker-scaled maintenance.
    #[serde(default)]
    pub max_maintenance: ResourceMap,
    /// Worker requirements; empty means the building runs unstaffed.
    #[serde(default)]
    pub worker_slots: Vec<WorkerSlot>,
    /// Additive population growth bonus while the building stands.
    #[serde(default)]
    pub population_growth_bonus: Decimal,
    /// Multiplier applied to every produced quantity.
    #[serde(default = "default_efficiency")]
    pub base_efficiency: Decimal,
    /// Days needed to construct.
    #[serde(default)]
    pub construction_days: u32,
}

impl BuildingDefinition {
    /// Stable identity derived from the name.
    pub fn id(&self) -> DefinitionId {
        DefinitionId::from_name(&self.name)
    }

    /// Whether any worker slot exists.
    pub fn requires_workers(&self) -> bool {
        !self.worker_slots.is_empty()
    }

    /// Sum of slot minimums.
    pub fn min_workers(&self) -> u32 {
        self.worker_slots.iter().map(|s| s.min).sum()
    }

    /// Sum of slot maximums.
    pub fn optimal_workers(&self) -> u32 {
        self.worker_slots.iter().map(|s| s.max).sum()
    }

    /// Whether this building provides hublet slots.
    pub fn is_hub(&self) -> bool {
        self.hublet_slots > 0
    }

    /// Whether this building must attach to a hub.
    pub fn is_hublet(&self) -> bool {
        self.hub_categories.is_some()
    }

    /// Whether this hublet may attach to a hub of `category`.
    pub fn accepts_hub(&self, category: BuildingCategory) -> bool {
        match &self.hub_categories {
            Some(allowed) => allowed.is_empty() || allowed.contains(&category),
            None => false,
        }
    }
}
