//! # Frame cycle controller
//!
//! Owns every accumulator of the control loop: rolling window, batch statistics, temperature
//! state, flush timer, frame counter and the detections of the last detection cycle.
//!
//! # Design
//! Detection is slow and runs only on every `skip_frames`-th frame. In between, the previous
//! detections are reused as-is: the current count holds its last detected value (zero-order
//! hold) and keeps feeding the batch and the temperature model every frame. The rolling window
//! only sees actual detection results.

use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::detect::{Control, Detections, Detector, FrameSource, Renderer};
use crate::schedule::{self, Clock, Instant, Scheduler};
use crate::settings::{self, Settings};
use crate::statistics::{Buffer, Summary};
use crate::telemetry::{NotificationSink, PersistenceSink, Sinks, Telemetry};
use crate::thermal::ThermalModel;
use crate::window::Window;

/// Control loop termination cause.
#[derive(Debug)]
pub enum Error<S, D> {
    /// The frame source failed.
    Source(S),
    /// The detector failed.
    Detector(D),
}

/// Per-frame state handed to the renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Status {
    pub current_count: u32,
    pub average: f32,
    pub over_limit: bool,
    pub temperature: f32,
    pub ac_on: bool,
}

/// Side panel entries of the display overlay, in drawing order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, AsRefStr)]
pub enum Metric {
    #[strum(serialize = "Current Count")]
    CurrentCount,
    #[strum(serialize = "Avg Occupancy")]
    AvgOccupancy,
    #[strum(serialize = "Max Limit Exceeded")]
    LimitExceeded,
    #[strum(serialize = "Temperature")]
    Temperature,
    #[strum(serialize = "AC State")]
    AcState,
}

/// Longest overlay value: `-f32::MAX` with one decimal and a unit suffix.
pub const MAX_VALUE_SIZE: usize = 48;

/// One formatted overlay entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub metric: Metric,
    pub value: heapless::String<MAX_VALUE_SIZE>,
    /// Draw in the warning color.
    pub alert: bool,
}

impl Status {
    /// Formatted overlay entry for `metric`.
    pub fn entry(&self, metric: Metric) -> Entry {
        use core::fmt::Write;

        let mut value = heapless::String::new();
        let alert = match metric {
            Metric::CurrentCount => {
                write!(value, "{}", self.current_count).ok();
                false
            }
            Metric::AvgOccupancy => {
                write!(value, "{:.1}", self.average).ok();
                false
            }
            Metric::LimitExceeded => {
                value.push_str(if self.over_limit { "YES" } else { "NO" }).ok();
                self.over_limit
            }
            Metric::Temperature => {
                write!(value, "{:.1}C", self.temperature).ok();
                false
            }
            Metric::AcState => {
                value.push_str(if self.ac_on { "ON" } else { "OFF" }).ok();
                self.ac_on
            }
        };
        Entry {
            metric,
            value,
            alert,
        }
    }

    /// All overlay entries in drawing order.
    pub fn metrics(&self) -> impl Iterator<Item = Entry> + '_ {
        Metric::iter().map(|m| self.entry(m))
    }
}

pub struct Controller {
    window: Window,
    batch: Buffer,
    thermal: ThermalModel,
    temperature: f32,
    scheduler: Scheduler,
    skip_frames: u32,
    frames: u32,
    detections: Detections,
}

impl Controller {
    /// Construct a controller. The first flush period starts at `now`.
    pub fn new(settings: &Settings, now: Instant) -> Result<Self, settings::Error> {
        settings.validate()?;
        let window = Window::new(*settings.window_size as usize, *settings.max_occupancy)
            .map_err(|_| settings::Error::WindowSize)?;
        Ok(Self {
            window,
            batch: Buffer::default(),
            thermal: settings.thermal,
            temperature: *settings.thermal.base_temperature,
            scheduler: Scheduler::new(schedule::period(*settings.send_interval), now),
            skip_frames: *settings.skip_frames,
            frames: 0,
            detections: Detections::new(),
        })
    }

    /// Process one frame.
    ///
    /// Runs detection if this frame is a detection frame, advances all accumulators and
    /// flushes a batch summary to `sinks` if the flush period elapsed at `now`.
    pub fn cycle<F, D, P, N>(
        &mut self,
        frame: &F,
        now: Instant,
        detector: &mut D,
        sinks: &mut Sinks<P, N>,
    ) -> Result<Status, D::Error>
    where
        D: Detector<F>,
        P: PersistenceSink,
        N: NotificationSink,
    {
        self.frames = self.frames.wrapping_add(1);
        if self.frames % self.skip_frames == 0 {
            self.detections = detector.detect(frame)?;
            log::debug!(
                "Frame {}: {} detections",
                self.frames,
                self.detections.len()
            );
            self.window.update(self.current_count());
        }

        let current_count = self.current_count();
        self.batch.update(current_count);
        let temperature = self.thermal.update(&mut self.temperature, current_count);

        let status = Status {
            current_count,
            average: self.window.average(),
            over_limit: self.window.is_over_limit(),
            temperature,
            ac_on: self.thermal.ac_on(temperature),
        };

        if self.scheduler.due(now) {
            self.flush(&status, now, sinks);
        }

        Ok(status)
    }

    /// Summarize the batch, publish it and start a new flush period.
    fn flush<P: PersistenceSink, N: NotificationSink>(
        &mut self,
        status: &Status,
        now: Instant,
        sinks: &mut Sinks<P, N>,
    ) {
        debug_assert!(!self.batch.is_empty(), "Flushing an empty batch");
        let Some(batch) = Option::<Summary>::from(core::mem::take(&mut self.batch)) else {
            return;
        };
        let telemetry = Telemetry::new(batch, status);
        log::info!(
            "Batch: mean {:.2}, max {}, current {}, limit exceeded {}, {:.1} C, AC {}",
            telemetry.avg_occupancy,
            telemetry.max_occupancy,
            telemetry.current_count,
            telemetry.limit_exceeded,
            telemetry.temperature,
            if telemetry.ac_on { "on" } else { "off" },
        );
        sinks.publish(&telemetry);
        self.scheduler.reset(now);
    }

    /// Run the control loop until end-of-stream or until the renderer asks to quit.
    ///
    /// The frame source is closed on every exit path.
    ///
    /// # Returns
    /// The number of frames processed.
    pub fn run<S, D, R, P, N, C>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        renderer: &mut R,
        sinks: &mut Sinks<P, N>,
        clock: &C,
    ) -> Result<u32, Error<S::Error, D::Error>>
    where
        S: FrameSource,
        D: Detector<S::Frame>,
        R: Renderer<S::Frame>,
        P: PersistenceSink,
        N: NotificationSink,
        C: Clock,
    {
        let start = self.frames;
        let result = loop {
            let frame = match source.next() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("End of stream");
                    break Ok(());
                }
                Err(e) => {
                    log::error!("Frame source failed: {:?}", e);
                    break Err(Error::Source(e));
                }
            };

            let status = match self.cycle(&frame, clock.now(), detector, sinks) {
                Ok(status) => status,
                Err(e) => {
                    log::error!("Detector failed: {:?}", e);
                    break Err(Error::Detector(e));
                }
            };

            if renderer.show(frame, &self.detections, &status) == Control::Quit {
                log::info!("Quit requested");
                break Ok(());
            }
        };
        source.close();
        result.map(|()| self.frames.wrapping_sub(start))
    }

    /// Count of the last detection cycle. Zero before the first detection.
    pub fn current_count(&self) -> u32 {
        self.detections.len() as u32
    }

    pub fn detections(&self) -> &Detections {
        &self.detections
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Number of counts accumulated since the last flush.
    pub fn pending(&self) -> u32 {
        self.batch.len()
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}
