use crate::bar::Bar;
use std::collections::VecDeque;

/// Fixed-capacity ring buffer of the most recently emitted [`Bar`]s for one symbol.
///
/// Backs the `latest(symbol, n)` query of a feed. Only bars that have already been emitted
/// are present, so consumers cannot look ahead of the event they are handling.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append the next emitted [`Bar`], evicting the oldest if at capacity.
    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Most recent `n` bars in chronological order (oldest first).
    pub fn latest(&self, n: usize) -> Vec<Bar> {
        let start = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(start).copied().collect()
    }

    /// Most recently emitted [`Bar`], if any.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
