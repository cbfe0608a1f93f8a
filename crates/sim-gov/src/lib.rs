#![deny(warnings)]

//! Government layer of a realm.
//!
//! This crate provides:
//! - A modifier registry keyed by realm and typed source
//! - Legitimacy, administrative capacity, offices and revolt risk per realm
//! - Overlord/subject contracts with loyalty and tribute
//! - Timed edicts with category conflicts and seasonal expiry

pub mod contracts;
pub mod edicts;
pub mod government;
pub mod modifiers;

pub use contracts::{contract_loyalty, validate_terms, ContractEngine, Tribute};
pub use edicts::EdictEngine;
pub use government::{
    daily_office_yield, default_loyalty, revolt_risk, weighted_loyalty, AutomationReport,
    Government, GovernmentRegistry, LegitimacyInputs, RevoltTier,
};
pub use modifiers::ModifierRegistry;
