//! Detector frame stream: one JSON object per line.

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::Deserialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    process::{Child, Command, Stdio},
};
use thiserror::Error;

use crate::hand::{DetectedHand, Handedness, LANDMARK_COUNT, LandmarkPoint};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    #[serde(default)]
    score: f32,
    landmarks: Vec<LandmarkPoint>,
}

#[derive(Debug, Deserialize)]
struct FrameJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// One frame's detector output.
#[derive(Debug, Clone, Default)]
pub struct DetectorFrame {
    pub hands: Vec<DetectedHand>,
}

/// Parses a frame line. Hands with the wrong landmark count or a coordinate
/// that overflowed `f32` are dropped; a detector-side error reads as a frame
/// with no hands.
pub fn parse_frame(line: &str) -> Result<DetectorFrame, FrameError> {
    let raw: FrameJson = serde_json::from_str(line)?;
    if let Some(err) = raw.error {
        warn!("detector error: {err}");
        return Ok(DetectorFrame::default());
    }

    let mut hands = Vec::with_capacity(raw.hands.len());
    for (i, h) in raw.hands.into_iter().enumerate() {
        let Ok(points) = <[LandmarkPoint; LANDMARK_COUNT]>::try_from(h.landmarks.as_slice()) else {
            warn!(
                "hand #{i}: expected {LANDMARK_COUNT} landmarks, got {}; dropped",
                h.landmarks.len()
            );
            continue;
        };
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
            warn!("hand #{i}: non-finite landmark coordinate; dropped");
            continue;
        }
        let handedness = Handedness::from_label(&h.handedness);
        if handedness.is_none() {
            warn!("hand #{i}: unknown handedness {:?}", h.handedness);
        }
        hands.push(DetectedHand {
            points,
            handedness,
            score: h.score,
        });
    }
    Ok(DetectorFrame { hands })
}

pub struct DetectorStream {
    reader: Box<dyn BufRead>,
    child: Option<Child>,
    line: String,
}

impl DetectorStream {
    pub fn stdin() -> Self {
        Self::from_reader(Box::new(BufReader::new(io::stdin())))
    }

    pub fn open(path: &str) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("failed to open {path}"))?;
        Ok(Self::from_reader(Box::new(BufReader::new(f))))
    }

    /// Runs `cmd` through the shell and reads frames from its stdout.
    pub fn spawn(cmd: &str) -> Result<Self> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start detector: {cmd}"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("detector stdout unavailable"))?;
        info!("detector started (pid={})", child.id());
        let mut stream = Self::from_reader(Box::new(BufReader::new(stdout)));
        stream.child = Some(child);
        Ok(stream)
    }

    pub fn from_reader(reader: Box<dyn BufRead>) -> Self {
        Self {
            reader,
            child: None,
            line: String::new(),
        }
    }

    /// Next frame, or `None` at end of stream. Blank lines and the detector's
    /// `READY` banner are skipped.
    pub fn next_frame(&mut self) -> Option<Result<DetectorFrame, FrameError>> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "READY" {
                info!("detector ready");
                continue;
            }
            return Some(parse_frame(line));
        }
    }
}

impl Drop for DetectorStream {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(label: &str, n: usize) -> String {
        let pts: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f32 / 100.0))
            .collect();
        format!(
            r#"{{"handedness":"{label}","score":0.9,"landmarks":[{}]}}"#,
            pts.join(",")
        )
    }

    #[test]
    fn parses_two_hands() {
        let line = format!(r#"{{"hands":[{},{}]}}"#, hand_json("Left", 21), hand_json("Right", 21));
        let frame = parse_frame(&line).unwrap();
        assert_eq!(frame.hands.len(), 2);
        assert_eq!(frame.hands[0].handedness, Some(Handedness::Left));
        assert_eq!(frame.hands[1].handedness, Some(Handedness::Right));
        assert!((frame.hands[1].points[20].x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn short_hand_is_dropped() {
        let line = format!(r#"{{"hands":[{},{}]}}"#, hand_json("Left", 20), hand_json("Right", 21));
        let frame = parse_frame(&line).unwrap();
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness, Some(Handedness::Right));
    }

    #[test]
    fn odd_label_survives_parsing_without_handedness() {
        let line = format!(r#"{{"hands":[{}]}}"#, hand_json("Unknown", 21));
        let frame = parse_frame(&line).unwrap();
        assert_eq!(frame.hands[0].handedness, None);
    }

    #[test]
    fn out_of_range_coordinate_drops_hand() {
        let bad = hand_json("Left", 21).replacen(r#""x":0.01"#, r#""x":1e39"#, 1);
        let line = format!(r#"{{"hands":[{bad},{}]}}"#, hand_json("Right", 21));
        let frame = parse_frame(&line).unwrap();
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness, Some(Handedness::Right));
    }

    #[test]
    fn detector_error_means_no_hands() {
        let line = format!(r#"{{"hands":[{}],"error":"camera lost"}}"#, hand_json("Left", 21));
        assert!(parse_frame(&line).unwrap().hands.is_empty());
    }

    #[test]
    fn stream_skips_banner_and_reports_bad_lines() {
        let text = format!("READY\n\n{{\"hands\":[]}}\nnot json\n{{\"hands\":[{}]}}\n", hand_json("Right", 21));
        let mut stream = DetectorStream::from_reader(Box::new(io::Cursor::new(text.into_bytes())));

        assert!(stream.next_frame().unwrap().unwrap().hands.is_empty());
        assert!(matches!(stream.next_frame(), Some(Err(FrameError::Json(_)))));
        assert_eq!(stream.next_frame().unwrap().unwrap().hands.len(), 1);
        assert!(stream.next_frame().is_none());
    }
}
