//! Fixed-capacity line history

use std::collections::VecDeque;

/// The most recent `capacity` lines, oldest first.
///
/// Every pushed line is numbered; the number of the newest line equals the total
/// number of lines ever written, so a snapshot can be compared against later
/// writes without keeping evicted lines around.
#[derive(Debug)]
pub struct HistoryBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    written: u64,
}

impl HistoryBuffer {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            written: 0,
        }
    }

    /// Append a line, evicting the oldest one when full. Returns its sequence number.
    pub fn push(&mut self, line: String) -> u64 {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.written += 1;
        self.written
    }

    /// Up to `count` of the newest lines in write order, plus the sequence number
    /// of the newest line written so far.
    pub fn tail(&self, count: usize) -> (Vec<String>, u64) {
        let skip = self.lines.len().saturating_sub(count);
        let lines = self.lines.iter().skip(skip).cloned().collect();
        (lines, self.written)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of lines ever pushed
    pub fn written(&self) -> u64 {
        self.written
    }
}
