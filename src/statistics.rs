//! # Occupancy batch statistics
//!
//! Raw per-frame counts are accumulated between two flushes and finalized into a [Summary].

use serde::Serialize;

/// Batch summary. Contains the mean and max count of the last flush period.
#[derive(Serialize, Copy, Clone, Debug, PartialEq)]
pub struct Summary {
    pub mean: f32,
    pub max: u32,
}

impl From<Buffer> for Option<Summary> {
    /// Finalize the batch. `None` if no count was added since the last flush.
    fn from(buff: Buffer) -> Self {
        if buff.counter > 0 {
            Some(Summary {
                mean: (buff.sum as f64 / buff.counter as f64) as f32,
                max: buff.max,
            })
        } else {
            None
        }
    }
}

/// Statistics buffer for computing mean/max of the counts of the last flush period.
///
/// Use `core::mem::take()` to finalize and reset in one step.
#[derive(Copy, Clone, Debug, Default)]
pub struct Buffer {
    max: u32,
    sum: u64,
    counter: u32,
}

impl Buffer {
    /// Add a new count to the buffer. This will add it to the accumulator,
    /// update max and increment the counter.
    pub fn update(&mut self, count: u32) {
        self.max = self.max.max(count);
        self.sum += count as u64;
        self.counter += 1;
    }

    pub fn len(&self) -> u32 {
        self.counter
    }

    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }
}
