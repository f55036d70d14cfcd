//! Occupancy telemetry
//!
//! # Design
//! Once per flush period a [Telemetry] summary of the batch is handed to a notification sink
//! and the corresponding [Record] is appended to a persistence sink. Both are reported in a
//! "best-effort" fashion: failures are logged and the record is dropped, the control loop
//! carries on.
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::statistics::Summary;

/// Maximum encoded size of a [Telemetry] message.
pub const MAX_TELEMETRY_SIZE: usize = 256;

/// Flush period telemetry.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct Telemetry {
    /// Mean count over the flush period.
    pub avg_occupancy: f32,
    /// Maximum count over the flush period.
    pub max_occupancy: u32,
    /// Count of the latest detection.
    pub current_count: u32,
    /// Rolling average at or above the configured maximum.
    pub limit_exceeded: bool,
    /// Simulated room temperature in °C.
    pub temperature: f32,
    pub ac_on: bool,
}

impl Telemetry {
    pub fn new(batch: Summary, status: &crate::Status) -> Self {
        Self {
            avg_occupancy: batch.mean,
            max_occupancy: batch.max,
            current_count: status.current_count,
            limit_exceeded: status.over_limit,
            temperature: status.temperature,
            ac_on: status.ac_on,
        }
    }

    /// Encode as JSON.
    pub fn to_json(
        &self,
    ) -> Result<Vec<u8, MAX_TELEMETRY_SIZE>, serde_json_core::ser::Error> {
        serde_json_core::to_vec(self)
    }
}

/// Persisted snapshot. The sink stamps it at write time.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct Record {
    pub current_count: u32,
    pub avg_occupancy: f32,
    pub max_occupancy: u32,
    pub temperature: f32,
    pub limit_exceeded: bool,
}

impl From<&Telemetry> for Record {
    fn from(t: &Telemetry) -> Self {
        Self {
            current_count: t.current_count,
            avg_occupancy: t.avg_occupancy,
            max_occupancy: t.max_occupancy,
            temperature: t.temperature,
            limit_exceeded: t.limit_exceeded,
        }
    }
}

/// Append-only store of [Record]s.
pub trait PersistenceSink {
    type Error: core::fmt::Debug;

    fn append(&mut self, record: &Record) -> Result<(), Self::Error>;
}

/// Outbound [Telemetry] notification. Implementations should time out quickly.
pub trait NotificationSink {
    type Error: core::fmt::Debug;

    fn send(&mut self, telemetry: &Telemetry) -> Result<(), Self::Error>;
}

/// Sink that drops everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct Discard;

impl PersistenceSink for Discard {
    type Error = core::convert::Infallible;

    fn append(&mut self, _record: &Record) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl NotificationSink for Discard {
    type Error = core::convert::Infallible;

    fn send(&mut self, _telemetry: &Telemetry) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// The two downstream consumers of flushed telemetry.
pub struct Sinks<P, N> {
    pub persistence: P,
    pub notification: N,
}

impl<P: PersistenceSink, N: NotificationSink> Sinks<P, N> {
    pub fn new(persistence: P, notification: N) -> Self {
        Self {
            persistence,
            notification,
        }
    }

    /// Forward telemetry to both sinks.
    ///
    /// # Note
    /// Failures are logged and otherwise ignored. Neither sink is retried.
    pub fn publish(&mut self, telemetry: &Telemetry) {
        if let Err(e) = self.notification.send(telemetry) {
            log::warn!("Telemetry notification failed: {:?}", e);
        }
        if let Err(e) = self.persistence.append(&Record::from(telemetry)) {
            log::warn!("Telemetry persistence failed: {:?}", e);
        }
    }
}
