//! Calendar time source emitting cadence ticks.

use chrono::{Datelike, NaiveDate};
use sim_core::Cadence;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One tick of one cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickEvent {
    pub cadence: Cadence,
    /// Per-cadence sequence number, starting at 1.
    pub sequence: u64,
    /// Simulated date the tick belongs to.
    pub date: NaiveDate,
}

/// Something that delivers ticks for the cadences it was subscribed to.
pub trait TimeSource {
    /// Register interest in `cadence`. Returns false if already registered.
    fn subscribe(&mut self, cadence: Cadence) -> bool;
}

/// Whether `cadence` fires on `date`.
///
/// Daily fires every day, Monthly on the 1st, Seasonal on the 1st of
/// January, April, July and October, Yearly on January 1st.
pub fn fires_on(cadence: Cadence, date: NaiveDate) -> bool {
    let first = date.day() == 1;
    match cadence {
        Cadence::Daily => true,
        Cadence::Monthly => first,
        Cadence::Seasonal => first && matches!(date.month(), 1 | 4 | 7 | 10),
        Cadence::Yearly => first && date.month() == 1,
    }
}

/// Day-stepping calendar.
#[derive(Clone, Debug)]
pub struct SimClock {
    date: NaiveDate,
    subscribed: BTreeSet<Cadence>,
    sequences: BTreeMap<Cadence, u64>,
}

impl SimClock {
    /// Clock standing on `start`, before any tick.
    pub fn new(start: NaiveDate) -> Self {
        Self {
            date: start,
            subscribed: BTreeSet::new(),
            sequences: BTreeMap::new(),
        }
    }

    /// Clock resumed on `date` with the sequence numbers already emitted.
    pub fn resume(date: NaiveDate, sequences: impl IntoIterator<Item = (Cadence, u64)>) -> Self {
        Self {
            date,
            subscribed: BTreeSet::new(),
            sequences: sequences.into_iter().collect(),
        }
    }

    /// Current simulated date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Last sequence emitted for `cadence` (0 before the first tick).
    pub fn sequence(&self, cadence: Cadence) -> u64 {
        self.sequences.get(&cadence).copied().unwrap_or(0)
    }

    /// Move to the next day and emit its ticks, finest cadence first.
    pub fn advance_day(&mut self) -> Vec<TickEvent> {
        let Some(next) = self.date.succ_opt() else {
            warn!(date = %self.date, "calendar exhausted");
            return Vec::new();
        };
        self.date = next;
        let mut events = Vec::new();
        for cadence in Cadence::ALL {
            if !self.subscribed.contains(&cadence) || !fires_on(cadence, next) {
                continue;
            }
            let seq = self.sequences.entry(cadence).or_insert(0);
            *seq += 1;
            events.push(TickEvent {
                cadence,
                sequence: *seq,
                date: next,
            });
        }
        events
    }
}

impl TimeSource for SimClock {
    fn subscribe(&mut self, cadence: Cadence) -> bool {
        self.subscribed.insert(cadence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn subscribed_clock() -> SimClock {
        let mut clock = SimClock::new(ymd(1200, 1, 1));
        for c in Cadence::ALL {
            assert!(clock.subscribe(c));
            assert!(!clock.subscribe(c));
        }
        clock
    }

    #[test]
    fn cadence_calendar() {
        assert!(fires_on(Cadence::Monthly, ymd(1200, 5, 1)));
        assert!(!fires_on(Cadence::Monthly, ymd(1200, 5, 2)));
        assert!(fires_on(Cadence::Seasonal, ymd(1200, 10, 1)));
        assert!(!fires_on(Cadence::Seasonal, ymd(1200, 11, 1)));
        assert!(fires_on(Cadence::Yearly, ymd(1201, 1, 1)));
        assert!(!fires_on(Cadence::Yearly, ymd(1201, 7, 1)));
    }

    #[test]
    fn one_year_of_ticks() {
        let mut clock = subscribed_clock();
        let mut counts = BTreeMap::new();
        for _ in 0..366 {
            for e in clock.advance_day() {
                *counts.entry(e.cadence).or_insert(0u64) += 1;
                assert_eq!(e.sequence, counts[&e.cadence]);
            }
        }
        // 1200 is a leap year
        assert_eq!(clock.date(), ymd(1201, 1, 1));
        assert_eq!(counts[&Cadence::Daily], 366);
        assert_eq!(counts[&Cadence::Monthly], 12);
        assert_eq!(counts[&Cadence::Seasonal], 4);
        assert_eq!(counts[&Cadence::Yearly], 1);
    }

    #[test]
    fn unsubscribed_cadences_stay_silent() {
        let mut clock = SimClock::new(ymd(1200, 1, 31));
        clock.subscribe(Cadence::Monthly);
        let events = clock.advance_day();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cadence, Cadence::Monthly);
        assert_eq!(events[0].date, ymd(1200, 2, 1));
        assert!(clock.advance_day().is_empty());
    }

    #[test]
    fn resume_continues_sequences() {
        let mut clock = SimClock::resume(ymd(1200, 2, 28), [(Cadence::Monthly, 1)]);
        clock.subscribe(Cadence::Monthly);
        clock.advance_day();
        let events = clock.advance_day();
        assert_eq!(events[0].sequence, 2);
        assert_eq!(events[0].date, ymd(1200, 3, 1));
    }
}
