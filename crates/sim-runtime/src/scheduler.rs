//! Sequence checking between a time source and the tick handlers.

use sim_core::{Cadence, SimError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::clock::{TickEvent, TimeSource};

/// Tracks the last accepted sequence of every subscribed cadence.
///
/// A cadence whose sequence ever jumps or repeats is halted: that event and
/// every later one of the cadence fail with [`SimError::MissedTick`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickScheduler {
    subscribed: BTreeSet<Cadence>,
    last: BTreeMap<Cadence, u64>,
    halted: BTreeSet<Cadence>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore saved sequence state. Cadences are marked subscribed.
    pub fn restore(records: impl IntoIterator<Item = (Cadence, u64, bool)>) -> Self {
        let mut scheduler = Self::new();
        for (cadence, last, halted) in records {
            scheduler.subscribed.insert(cadence);
            scheduler.last.insert(cadence, last);
            if halted {
                scheduler.halted.insert(cadence);
            }
        }
        scheduler
    }

    /// Register every cadence with `source`, once. Returns how many were
    /// newly registered.
    pub fn subscribe<T: TimeSource + ?Sized>(&mut self, source: &mut T) -> usize {
        let mut added = 0;
        for cadence in Cadence::ALL {
            if self.subscribed.insert(cadence) {
                self.last.entry(cadence).or_insert(0);
                added += 1;
            }
            // a restored scheduler may face a fresh clock
            source.subscribe(cadence);
        }
        if added > 0 {
            debug!(added, "tick cadences subscribed");
        }
        added
    }

    /// Check an incoming event. Returns `Ok(false)` for cadences that were
    /// never subscribed.
    pub fn accept(&mut self, event: &TickEvent) -> Result<bool, SimError> {
        if !self.subscribed.contains(&event.cadence) {
            return Ok(false);
        }
        let last = self.last_sequence(event.cadence);
        let expected = last + 1;
        if self.halted.contains(&event.cadence) || event.sequence != expected {
            self.halted.insert(event.cadence);
            warn!(cadence = %event.cadence, expected, got = event.sequence, "missed tick; cadence halted");
            return Err(SimError::MissedTick {
                cadence: event.cadence,
                expected,
                got: event.sequence,
            });
        }
        self.last.insert(event.cadence, event.sequence);
        Ok(true)
    }

    /// Last accepted sequence of `cadence`.
    pub fn last_sequence(&self, cadence: Cadence) -> u64 {
        self.last.get(&cadence).copied().unwrap_or(0)
    }

    /// Whether `cadence` was halted by a missed tick.
    pub fn is_halted(&self, cadence: Cadence) -> bool {
        self.halted.contains(&cadence)
    }

    /// Whether `cadence` is subscribed.
    pub fn is_subscribed(&self, cadence: Cadence) -> bool {
        self.subscribed.contains(&cadence)
    }

    /// `(cadence, last sequence, halted)` for every subscribed cadence.
    pub fn records(&self) -> Vec<(Cadence, u64, bool)> {
        self.subscribed
            .iter()
            .map(|&c| (c, self.last_sequence(c), self.is_halted(c)))
            .collect()
    }
}
