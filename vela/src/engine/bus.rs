use crate::event::Event;
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::BinaryHeap};

/// An [`Event`] queued on the [`EventBus`], ordered by `(time, sequence)`.
#[derive(Debug, Clone)]
struct Scheduled {
    time: DateTime<Utc>,
    sequence: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the earliest (time, sequence) pops first
        (other.time, other.sequence).cmp(&(self.time, self.sequence))
    }
}

/// Time-ordered event queue driving the backtest.
///
/// Events pop in non-decreasing timestamp order; ties break by insertion order, so the
/// cascade a market event produces is replayed identically on every run. This bus is the
/// source of backtest determinism and is single-threaded by contract - cross-thread
/// producers must marshal onto the owning thread.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: BinaryHeap<Scheduled>,
    sequence: u64,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event at its own timestamp.
    pub fn publish(&mut self, event: Event) {
        let scheduled = Scheduled {
            time: event.time(),
            sequence: self.sequence,
            event,
        };
        self.sequence += 1;
        self.published += 1;
        self.queue.push(scheduled);
    }

    /// Pop the next event in `(time, sequence)` order.
    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop().map(|scheduled| scheduled.event)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Total number of events published over this bus's lifetime.
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Signal, SignalKind, SignalStrength};
    use chrono::TimeDelta;
    use vela_instrument::Symbol;

    fn signal_at(time: DateTime<Utc>, symbol: &str) -> Event {
        Event::Signal(Signal {
            time,
            symbol: Symbol::new(symbol),
            kind: SignalKind::Buy,
            strength: SignalStrength::new(1.0),
            meta: serde_json::Map::new(),
        })
    }

    #[test]
    fn test_pops_in_time_order_with_stable_ties() {
        let base = DateTime::<Utc>::MIN_UTC;
        let mut bus = EventBus::new();

        bus.publish(signal_at(base + TimeDelta::seconds(2), "late"));
        bus.publish(signal_at(base, "first"));
        bus.publish(signal_at(base, "second"));
        bus.publish(signal_at(base + TimeDelta::seconds(1), "middle"));

        let order: Vec<String> = std::iter::from_fn(|| bus.pop())
            .map(|event| match event {
                Event::Signal(signal) => signal.symbol.to_string(),
                _ => unreachable!(),
            })
            .collect();

        assert_eq!(order, vec!["first", "second", "middle", "late"]);
        assert_eq!(bus.published(), 4);
        assert!(bus.is_empty());
    }
}
