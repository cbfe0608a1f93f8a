#![deny(warnings)]

//! Simulation runtime: clock, tick scheduling and the owning context.
//!
//! [`SimContext`] holds every engine and processes the ticks emitted by a
//! [`SimClock`]; [`seed_world`] builds deterministic demo worlds.

pub mod clock;
pub mod context;
pub mod providers;
pub mod scenario;
pub mod scheduler;

pub use clock::{fires_on, SimClock, TickEvent, TimeSource};
pub use context::SimContext;
pub use providers::{
    AgentDirectory, CultureProvider, PopulationProvider, Providers, ReligionProvider,
    StaticProviders,
};
pub use scenario::{seed_world, ScenarioError, ScenarioParams};
pub use scheduler::TickScheduler;
