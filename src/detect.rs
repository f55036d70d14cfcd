//! # Frame acquisition and detection interfaces
//!
//! The detector and the video source are external collaborators. The control loop only sees
//! frames as opaque values and detections as bounding boxes with a confidence.

use heapless::Vec;

/// Maximum number of detections kept per frame.
pub const MAX_DETECTIONS: usize = 128;

/// Detector class index of a person.
pub const PERSON: u16 = 0;

/// Detections of one frame.
pub type Detections = Vec<Detection, MAX_DETECTIONS>;

/// Axis-aligned box in frame pixel coordinates, top-left and bottom-right corners.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class: u16,
}

/// Keep only persons detected with at least `min_confidence`.
pub fn people(detections: &mut Detections, min_confidence: f32) {
    detections.retain(|d| d.class == PERSON && d.confidence >= min_confidence);
}

/// Object detector for people.
pub trait Detector<F> {
    type Error: core::fmt::Debug;

    /// Detect the people in `frame`.
    fn detect(&mut self, frame: &F) -> Result<Detections, Self::Error>;
}

/// Source of video frames.
pub trait FrameSource {
    type Frame;
    type Error: core::fmt::Debug;

    /// The next frame. `Ok(None)` at end-of-stream.
    fn next(&mut self) -> Result<Option<Self::Frame>, Self::Error>;

    /// Release the underlying capture device.
    fn close(&mut self);
}

/// Outcome of showing a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Displays annotated frames and reports the user's quit request.
pub trait Renderer<F> {
    fn show(
        &mut self,
        frame: F,
        detections: &[Detection],
        status: &crate::Status,
    ) -> Control;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(confidence: f32, class: u16) -> Detection {
        Detection {
            bbox: BoundingBox::default(),
            confidence,
            class,
        }
    }

    #[test]
    fn filters_people() {
        let mut detections = Detections::new();
        detections.push(detection(0.9, PERSON)).unwrap();
        detections.push(detection(0.2, PERSON)).unwrap();
        detections.push(detection(0.9, 2)).unwrap();
        detections.push(detection(0.5, PERSON)).unwrap();
        people(&mut detections, 0.5);
        assert_eq!(detections.len(), 2);
        assert!(detections.iter().all(|d| d.class == PERSON));
    }
}
