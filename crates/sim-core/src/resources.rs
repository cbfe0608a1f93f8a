//! Resource kinds and quantities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of resources tracked per city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Staple food.
    Food,
    /// Coin.
    Gold,
    /// Timber.
    Wood,
    /// Quarried stone.
    Stone,
    /// Smelted iron.
    Iron,
    /// Crafted tools.
    Tools,
    /// Woven cloth.
    Cloth,
    /// Levies available for service.
    Manpower,
    /// Accumulated technology experience.
    TechXp,
}

impl ResourceKind {
    /// Every kind, in key order.
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Food,
        ResourceKind::Gold,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Iron,
        ResourceKind::Tools,
        ResourceKind::Cloth,
        ResourceKind::Manpower,
        ResourceKind::TechXp,
    ];
}

/// A quantity of one resource kind. Negative only inside a delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmount {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Signed quantity.
    pub quantity: i64,
}

impl ResourceAmount {
    /// Shorthand constructor.
    pub fn new(kind: ResourceKind, quantity: i64) -> Self {
        Self { kind, quantity }
    }
}

/// Per-kind quantities in key order. Absent kinds read as zero.
pub type ResourceMap = BTreeMap<ResourceKind, i64>;
