//! Replay of pre-annotated frames.
//!
//! Each line of the input is one frame. A frame lists its detections as whitespace separated
//! `x1,y1,x2,y2,confidence[,class]` tokens; an empty line is a frame without detections and a
//! line reading `q` is the quit key.

use std::io::BufRead;

use anyhow::{anyhow, bail, Context};
use occupancy_monitor::detect::{
    self, BoundingBox, Control, Detection, Detections, Detector, FrameSource, Renderer, PERSON,
};
use occupancy_monitor::Status;

pub struct Frame {
    pub index: u64,
    pub line: String,
}

pub struct Replay<R> {
    reader: Option<R>,
    index: u64,
}

impl<R: BufRead> Replay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            index: 0,
        }
    }
}

impl<R: BufRead> FrameSource for Replay<R> {
    type Frame = Frame;
    type Error = std::io::Error;

    fn next(&mut self) -> Result<Option<Frame>, Self::Error> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.index += 1;
        Ok(Some(Frame {
            index: self.index,
            line: line.trim().to_owned(),
        }))
    }

    fn close(&mut self) {
        self.reader.take();
    }
}

/// Detector reading the annotations carried by a replayed frame.
pub struct Annotations {
    pub min_confidence: f32,
}

impl Detector<Frame> for Annotations {
    type Error = anyhow::Error;

    fn detect(&mut self, frame: &Frame) -> Result<Detections, Self::Error> {
        let mut detections = Detections::new();
        for token in frame.line.split_whitespace() {
            if token == "q" {
                continue;
            }
            let detection = parse(token)
                .with_context(|| format!("frame {}: bad detection `{}`", frame.index, token))?;
            detections
                .push(detection)
                .map_err(|_| anyhow!("frame {}: too many detections", frame.index))?;
        }
        detect::people(&mut detections, self.min_confidence);
        Ok(detections)
    }
}

fn parse(token: &str) -> anyhow::Result<Detection> {
    let fields = token
        .split(',')
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()?;
    let (x1, y1, x2, y2, confidence, class) = match fields[..] {
        [x1, y1, x2, y2, c] => (x1, y1, x2, y2, c, PERSON),
        [x1, y1, x2, y2, c, class] => (x1, y1, x2, y2, c, class_index(class)?),
        _ => bail!("expected 5 or 6 fields, found {}", fields.len()),
    };
    Ok(Detection {
        bbox: BoundingBox { x1, y1, x2, y2 },
        confidence,
        class,
    })
}

/// Detector class indices are small non-negative integers.
fn class_index(class: f32) -> anyhow::Result<u16> {
    if !((0.0..=u16::MAX as f32).contains(&class) && class.fract() == 0.0) {
        bail!("invalid class index {}", class);
    }
    Ok(class as u16)
}

/// Renders the overlay side panel as a log line.
#[derive(Default)]
pub struct Console;

impl Renderer<Frame> for Console {
    fn show(&mut self, frame: Frame, detections: &[Detection], status: &Status) -> Control {
        if log::log_enabled!(log::Level::Debug) {
            let panel = status
                .metrics()
                .map(|e| {
                    let mark = if e.alert { "!" } else { "" };
                    format!("{}: {}{}", e.metric.as_ref(), e.value, mark)
                })
                .collect::<Vec<_>>()
                .join(" | ");
            log::debug!("Frame {} [{} boxes] {}", frame.index, detections.len(), panel);
        }
        if frame.line == "q" {
            Control::Quit
        } else {
            Control::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(line: &str) -> Frame {
        Frame {
            index: 1,
            line: line.to_owned(),
        }
    }

    #[test]
    fn reads_frames_until_eof() {
        let mut replay = Replay::new("a\n\nq\n".as_bytes());
        let lines: Vec<String> = std::iter::from_fn(|| replay.next().unwrap())
            .map(|f| f.line)
            .collect();
        assert_eq!(lines, ["a", "", "q"]);
    }

    #[test]
    fn close_ends_the_stream() {
        let mut replay = Replay::new("a\nb\n".as_bytes());
        replay.close();
        assert!(replay.next().unwrap().is_none());
    }

    #[test]
    fn parses_and_filters() {
        let mut detector = Annotations {
            min_confidence: 0.5,
        };
        let detections = detector
            .detect(&frame("0,0,10,20,0.9 5,5,8,8,0.3 1,1,2,2,0.8,2 3,3,4,4,0.7,0"))
            .unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(
            detections[0].bbox,
            BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 20.0
            }
        );
    }

    #[test]
    fn empty_frame_has_no_people() {
        let mut detector = Annotations {
            min_confidence: 0.5,
        };
        assert!(detector.detect(&frame("")).unwrap().is_empty());
    }

    #[test]
    fn malformed_detection_fails() {
        let mut detector = Annotations {
            min_confidence: 0.5,
        };
        assert!(detector.detect(&frame("1,2,3")).is_err());
        assert!(detector.detect(&frame("a,b,c,d,e")).is_err());
    }

    #[test]
    fn class_must_be_an_index() {
        let mut detector = Annotations {
            min_confidence: 0.5,
        };
        for bad in ["-1", "0.7", "65536", "NaN"] {
            let line = format!("0,0,1,1,0.9,{}", bad);
            assert!(detector.detect(&frame(&line)).is_err(), "{}", bad);
        }
        let detections = detector.detect(&frame("0,0,1,1,0.9,0.0")).unwrap();
        assert_eq!(detections.len(), 1);
        let detections = detector.detect(&frame("0,0,1,1,0.9,65535")).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn quit_key() {
        let status = Status {
            current_count: 0,
            average: 0.0,
            over_limit: false,
            temperature: 22.0,
            ac_on: false,
        };
        assert_eq!(Console.show(frame("q"), &[], &status), Control::Quit);
        assert_eq!(Console.show(frame(""), &[], &status), Control::Continue);
    }
}
