#![deny(warnings)]

//! Economic models: resource accounting and building production.
//!
//! This crate provides:
//! - Per-city resource balances mutated only through batched ledgers
//! - Building output, tech experience and upkeep as functions of staffing
//! - Constant-time worker eligibility and efficiency lookups
//! - Definition loading and per-city building rosters with hub attachment

pub mod ledger;
pub mod production;
pub mod roster;
pub mod workers;

pub use ledger::{CityResourceBalance, ResourceLedger, ResourceStore};
pub use production::{
    calculate_maintenance_cost, calculate_monthly_xp, calculate_production, round_quantity,
    settle_building, staffing, Staffing,
};
pub use roster::{BuildingInstance, CityBuildings, DefinitionRegistry, LoadedDefinition};
pub use workers::WorkerAllocationIndex;
