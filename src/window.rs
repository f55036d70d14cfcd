//! # Rolling occupancy window
//!
//! Keeps the most recent detection-cycle counts and smooths single-frame detector noise
//! without growing history.

use heapless::Deque;

/// Maximum number of readings a [Window] can hold.
pub const MAX_WINDOW: usize = 256;

/// Window size out of bounds error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Bounds,
}

/// Fixed-size FIFO of occupancy readings with an over-limit threshold.
#[derive(Clone, Debug)]
pub struct Window {
    counts: Deque<u32, MAX_WINDOW>,
    size: usize,
    max_occupancy: f32,
}

impl Window {
    /// Construct an empty window.
    ///
    /// # Args
    /// * `size` - Number of readings retained. Must be in `1..=MAX_WINDOW`.
    /// * `max_occupancy` - Rolling average at or above which the window is over limit.
    pub fn new(size: usize, max_occupancy: f32) -> Result<Self, Error> {
        if !(1..=MAX_WINDOW).contains(&size) {
            return Err(Error::Bounds);
        }
        Ok(Self {
            counts: Deque::new(),
            size,
            max_occupancy,
        })
    }

    /// Add the latest reading, evicting the oldest one if the window is full.
    pub fn update(&mut self, count: u32) {
        if self.counts.len() >= self.size {
            self.counts.pop_front();
        }
        // Cannot fail: `size <= MAX_WINDOW` and one slot was just freed.
        self.counts.push_back(count).ok();
    }

    /// Mean of the retained readings. An empty window averages to zero.
    pub fn average(&self) -> f32 {
        if self.counts.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.counts.iter().map(|&c| c as u64).sum();
        sum as f32 / self.counts.len() as f32
    }

    /// Whether the rolling average reached the configured maximum (inclusive).
    pub fn is_over_limit(&self) -> bool {
        self.average() >= self.max_occupancy
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(Window::new(0, 1.0).unwrap_err(), Error::Bounds);
        assert_eq!(Window::new(MAX_WINDOW + 1, 1.0).unwrap_err(), Error::Bounds);
        assert!(Window::new(MAX_WINDOW, 1.0).is_ok());
    }

    #[test]
    fn empty_average_is_zero() {
        let window = Window::new(10, 1.0).unwrap();
        assert_eq!(window.average(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn average() {
        let mut window = Window::new(10, 100.0).unwrap();
        for c in [3, 5, 7] {
            window.update(c);
        }
        assert_eq!(window.average(), 5.0);
        // No update in between, same answer.
        assert_eq!(window.average(), window.average());
    }

    #[test]
    fn length_is_bounded() {
        let mut window = Window::new(4, 1.0).unwrap();
        for i in 0..20 {
            window.update(i);
            assert!(window.len() <= 4);
            if i >= 3 {
                assert_eq!(window.len(), 4);
            }
        }
    }

    #[test]
    fn evicts_oldest() {
        let mut window = Window::new(3, 100.0).unwrap();
        for c in [9, 0, 0] {
            window.update(c);
        }
        assert_eq!(window.average(), 3.0);
        window.update(0);
        assert_eq!(window.average(), 0.0);
    }

    #[test]
    fn limit_is_inclusive() {
        let mut window = Window::new(2, 2.0).unwrap();
        window.update(1);
        window.update(3);
        assert_eq!(window.average(), 2.0);
        assert!(window.is_over_limit());
        window.update(0);
        assert!(!window.is_over_limit());
    }

    #[test]
    fn mixed_sequence_over_limit() {
        let mut window = Window::new(10, 1.0).unwrap();
        for c in [1, 1, 1, 1, 1, 2, 2, 2, 2, 2] {
            window.update(c);
        }
        assert_eq!(window.average(), 1.5);
        assert!(window.is_over_limit());
    }
}
