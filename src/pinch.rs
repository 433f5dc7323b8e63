//! Pinch lever: dead zone plus stepped level updates along one locked axis.

use crate::config::Thresholds;
use crate::hand::{LandmarkPoint, round1};

/// Fingertip displacement is scaled by this before thresholding.
const LEVER_SCALE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchAxis {
    Horizontal,
    Vertical,
}

/// A level committed by a stable pinch, to be applied once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchCommit {
    pub axis: PinchAxis,
    pub level: f32,
}

#[derive(Debug, Clone)]
pub struct PinchSession {
    start_x: f32,
    start_y: f32,
    level: f32,
    prev_level: f32,
    stable_frames: u32,
    axis: Option<PinchAxis>,
}

impl PinchSession {
    pub fn start(tip: LandmarkPoint) -> Self {
        Self {
            start_x: tip.x,
            start_y: tip.y,
            level: 0.0,
            prev_level: 0.0,
            stable_frames: 0,
            axis: None,
        }
    }

    pub fn axis(&self) -> Option<PinchAxis> {
        self.axis
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Horizontal lever, positive to the right.
    pub fn lever_x(&self, tip: LandmarkPoint) -> f32 {
        round1((tip.x - self.start_x) * LEVER_SCALE)
    }

    /// Vertical lever, positive upward.
    pub fn lever_y(&self, tip: LandmarkPoint) -> f32 {
        round1((self.start_y - tip.y) * LEVER_SCALE)
    }

    /// Feeds one held frame; returns a commit once the lever has been
    /// stable for `pinch_stable_frames` frames.
    pub fn update(&mut self, tip: LandmarkPoint, th: &Thresholds) -> Option<PinchCommit> {
        let gate = th.pinch_axis_threshold;
        let lvx = self.lever_x(tip);
        let lvy = self.lever_y(tip);

        if lvy.abs() > lvx.abs() && lvy.abs() > gate {
            self.track(PinchAxis::Vertical, lvy, gate);
        } else if lvx.abs() > gate {
            self.track(PinchAxis::Horizontal, lvx, gate);
        }

        if self.stable_frames < th.pinch_stable_frames {
            return None;
        }
        self.stable_frames = 0;
        self.level = self.prev_level;
        self.axis.map(|axis| PinchCommit {
            axis,
            level: self.level,
        })
    }

    fn track(&mut self, axis: PinchAxis, lever: f32, gate: f32) {
        self.axis = Some(axis);
        if (self.prev_level - lever).abs() < gate {
            self.stable_frames += 1;
        } else {
            self.stable_frames = 0;
        }
        self.prev_level = lever;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: LandmarkPoint = LandmarkPoint::new(0.5, 0.5, 0.0);

    fn at_x(lvx: f32) -> LandmarkPoint {
        LandmarkPoint::new(START.x + lvx / LEVER_SCALE, START.y, 0.0)
    }

    fn at_y(lvy: f32) -> LandmarkPoint {
        LandmarkPoint::new(START.x, START.y - lvy / LEVER_SCALE, 0.0)
    }

    fn run(session: &mut PinchSession, tips: &[LandmarkPoint]) -> Vec<(usize, PinchCommit)> {
        let th = Thresholds::default();
        tips.iter()
            .enumerate()
            .filter_map(|(i, &t)| session.update(t, &th).map(|c| (i, c)))
            .collect()
    }

    #[test]
    fn levers_are_scaled_and_oriented() {
        let s = PinchSession::start(START);
        assert_eq!(s.lever_x(LandmarkPoint::new(0.55, 0.5, 0.0)), 0.5);
        assert_eq!(s.lever_y(LandmarkPoint::new(0.5, 0.45, 0.0)), 0.5);
        assert_eq!(s.lever_y(LandmarkPoint::new(0.5, 0.58, 0.0)), -0.8);
    }

    #[test]
    fn small_motion_never_commits() {
        let mut s = PinchSession::start(START);
        let tips: Vec<_> = [0.0, 0.05, 0.04, 0.06, 0.05].iter().map(|&v| at_x(v)).collect();
        assert!(run(&mut s, &tips).is_empty());
        assert_eq!(s.axis(), None);
        assert_eq!(s.level(), 0.0);
    }

    #[test]
    fn sustained_horizontal_lever_commits_once() {
        let mut s = PinchSession::start(START);
        // First gated frame jumps from 0 and resets; five stable frames follow.
        let tips = vec![at_x(0.5); 6];
        let commits = run(&mut s, &tips);
        assert_eq!(commits.len(), 1);
        let (frame, commit) = commits[0];
        assert_eq!(frame, 5);
        assert_eq!(commit.axis, PinchAxis::Horizontal);
        assert_eq!(commit.level, 0.5);
        assert_eq!(s.level(), 0.5);
    }

    #[test]
    fn five_gated_frames_are_not_enough() {
        let mut s = PinchSession::start(START);
        assert!(run(&mut s, &vec![at_x(0.5); 5]).is_empty());
    }

    #[test]
    fn holding_keeps_stepping() {
        let mut s = PinchSession::start(START);
        let commits = run(&mut s, &vec![at_y(-0.6); 11]);
        let frames: Vec<usize> = commits.iter().map(|(i, _)| *i).collect();
        assert_eq!(frames, vec![5, 10]);
        assert!(commits.iter().all(|(_, c)| c.axis == PinchAxis::Vertical && c.level == -0.6));
    }

    #[test]
    fn jumpy_lever_resets_stability() {
        let mut s = PinchSession::start(START);
        let levels = [0.5, 0.6, 0.7, 0.8, 1.5, 1.6, 1.6, 1.7];
        let tips: Vec<_> = levels.iter().map(|&v| at_x(v)).collect();
        assert!(run(&mut s, &tips).is_empty());
    }

    #[test]
    fn dominant_axis_wins() {
        let mut s = PinchSession::start(START);
        let th = Thresholds::default();
        s.update(LandmarkPoint::new(0.54, 0.44, 0.0), &th);
        assert_eq!(s.axis(), Some(PinchAxis::Vertical));
        s.update(LandmarkPoint::new(0.58, 0.47, 0.0), &th);
        assert_eq!(s.axis(), Some(PinchAxis::Horizontal));
    }
}
