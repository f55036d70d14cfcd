//! # Simulated room climate
//!
//! The room temperature follows occupancy through a first-order low-pass so that it moves
//! smoothly instead of jumping with every detection.

use miniconf::{Leaf, Tree};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, Serialize, Tree)]
pub struct ThermalModel {
    /// Temperature of the empty room in °C.
    ///
    /// # Value
    /// Any finite value. Default 22.0.
    pub base_temperature: Leaf<f32>,

    /// Temperature rise per person in K.
    ///
    /// # Value
    /// Default 0.5.
    pub occupancy_coefficient: Leaf<f32>,

    /// Fraction of the remaining distance to the target covered per frame.
    ///
    /// # Value
    /// 0.0 (exclusive) to 1.0. Default 0.1.
    pub convergence_rate: Leaf<f32>,

    /// The AC switches on above this temperature in °C.
    ///
    /// # Value
    /// Default 23.5.
    pub ac_threshold: Leaf<f32>,
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self {
            base_temperature: Leaf(22.0),
            occupancy_coefficient: Leaf(0.5),
            convergence_rate: Leaf(0.1),
            ac_threshold: Leaf(23.5),
        }
    }
}

impl ThermalModel {
    /// Steady-state temperature for `count` occupants.
    pub fn target(&self, count: u32) -> f32 {
        *self.base_temperature + *self.occupancy_coefficient * count as f32
    }

    /// Advance the temperature state one frame toward the target and return the new value.
    pub fn update(&self, temperature: &mut f32, count: u32) -> f32 {
        *temperature += (self.target(count) - *temperature) * *self.convergence_rate;
        *temperature
    }

    /// AC state. Strictly above the threshold.
    pub fn ac_on(&self, temperature: f32) -> bool {
        temperature > *self.ac_threshold
    }
}
