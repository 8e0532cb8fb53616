//! Bounded FIFO of locally predicted moves awaiting acknowledgement

use std::collections::VecDeque;

use tracing::debug;

use super::state::{DesiredInput, MotionState};

/// Suggested capacity: two seconds at 60 ticks per second
pub const DEFAULT_HISTORY_CAPACITY: usize = 120;

/// One predicted tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedMove {
    /// State before the move, stamped with the tick's time
    pub state: MotionState,
    /// Yaw rate before the move
    pub yaw_rate: f32,
    /// Input applied during the move
    pub input: DesiredInput,
    /// Tick length
    pub dt: f32,
    /// State the move produced
    pub result: MotionState,
}

impl PredictedMove {
    pub fn timestamp(&self) -> f64 {
        self.state.timestamp
    }
}

/// Time-ordered prediction history, private to the predicting host
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    entries: VecDeque<PredictedMove>,
    capacity: usize,
    evicted: u64,
}

impl PredictionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append the newest move, dropping the oldest if full
    pub fn push(&mut self, entry: PredictedMove) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
            debug!(
                capacity = self.capacity,
                evicted = self.evicted,
                "Prediction history full, dropped oldest move"
            );
        }
        self.entries.push_back(entry);
    }

    pub fn pop_oldest(&mut self) -> Option<PredictedMove> {
        self.entries.pop_front()
    }

    /// Pop the oldest move, then keep popping every move already covered by
    /// `ack_timestamp`. Returns the last move popped.
    pub fn take_acknowledged(&mut self, ack_timestamp: f64) -> Option<PredictedMove> {
        let mut last = self.entries.pop_front()?;
        while self
            .entries
            .front()
            .is_some_and(|next| next.timestamp() <= ack_timestamp)
        {
            if let Some(next) = self.entries.pop_front() {
                last = next;
            }
        }
        Some(last)
    }

    /// Newest move, if any
    pub fn latest_mut(&mut self) -> Option<&mut PredictedMove> {
        self.entries.back_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictedMove> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PredictedMove> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Moves dropped because the history was full
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
