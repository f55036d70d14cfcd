//! # Runtime settings
//!
//! All tunables of the control loop live in one [miniconf::Tree] so they can be overridden by
//! path, e.g. `/thermal/ac_threshold`.

use miniconf::{Leaf, Tree};
use serde::Serialize;

use crate::thermal::ThermalModel;
use crate::window::MAX_WINDOW;

/// Invalid settings value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    WindowSize,
    MaxOccupancy,
    SkipFrames,
    SendInterval,
    ConvergenceRate,
    MinConfidence,
    /// Unknown path or malformed value.
    Path,
}

#[derive(Clone, Debug, Serialize, Tree)]
pub struct Settings {
    /// Number of detection cycles in the rolling occupancy average.
    ///
    /// # Value
    /// 1 to 256. Default 10.
    pub window_size: Leaf<u32>,

    /// Rolling average occupancy at which the room counts as over limit.
    ///
    /// # Value
    /// Non-negative. Default 5.0.
    pub max_occupancy: Leaf<f32>,

    /// Detection runs on every `skip_frames`-th frame.
    ///
    /// # Value
    /// At least 1. Default 5.
    pub skip_frames: Leaf<u32>,

    /// Telemetry flush period in seconds.
    ///
    /// # Value
    /// Non-negative. Default 10.0.
    pub send_interval: Leaf<f32>,

    /// Minimum detector confidence for a person to be counted.
    ///
    /// # Value
    /// 0.0 to 1.0. Default 0.5.
    pub min_confidence: Leaf<f32>,

    /// See [ThermalModel]
    pub thermal: ThermalModel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_size: Leaf(10),
            max_occupancy: Leaf(5.0),
            skip_frames: Leaf(5),
            send_interval: Leaf(10.0),
            min_confidence: Leaf(0.5),
            thermal: ThermalModel::default(),
        }
    }
}

impl Settings {
    /// Apply a JSON encoded `value` at `path`.
    ///
    /// The settings are left unchanged if the result would not [validate](Self::validate).
    pub fn set(&mut self, path: &str, value: &[u8]) -> Result<(), Error> {
        let mut next = self.clone();
        miniconf::json::set(&mut next, path, value).map_err(|e| {
            log::warn!("Setting {} failed: {:?}", path, e);
            Error::Path
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_WINDOW as u32).contains(&*self.window_size) {
            return Err(Error::WindowSize);
        }
        let max = *self.max_occupancy;
        if !(max.is_finite() && max >= 0.0) {
            return Err(Error::MaxOccupancy);
        }
        if *self.skip_frames == 0 {
            return Err(Error::SkipFrames);
        }
        let interval = *self.send_interval;
        if !(interval.is_finite() && interval >= 0.0) {
            return Err(Error::SendInterval);
        }
        let rate = *self.thermal.convergence_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(Error::ConvergenceRate);
        }
        if !(0.0..=1.0).contains(&*self.min_confidence) {
            return Err(Error::MinConfidence);
        }
        Ok(())
    }
}
