//! Latched control state driven by the frame's governing gesture.

use log::{debug, info, warn};

use crate::actions::{ActionError, ActionSink, MouseButton, WHEEL_DELTA};
use crate::config::Thresholds;
use crate::gestures::GestureSymbol;
use crate::hand::{HandSnapshot, LandmarkPoint, lm};
use crate::pinch::{PinchAxis, PinchCommit, PinchSession};

/// Which hand's pinch is running; decides what the lever controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinchKind {
    /// Horizontal lever scrolls sideways, vertical lever scrolls.
    Minor,
    /// Horizontal lever sets brightness, vertical lever sets volume.
    Major,
}

/// Per-axis damping of palm motion so tremor doesn't move the pointer.
pub fn damping_ratio(dist_sq: f64, th: &Thresholds) -> f64 {
    if dist_sq <= th.jitter_dist_sq {
        0.0
    } else if dist_sq <= th.slow_dist_sq {
        th.slow_gain * dist_sq.sqrt()
    } else {
        th.fast_gain
    }
}

#[derive(Debug, Default)]
pub struct PointerMapper {
    prev: Option<(f64, f64)>,
}

impl PointerMapper {
    /// Maps the palm centre to an absolute pointer target relative to the
    /// current pointer position.
    pub fn target(&mut self, palm: LandmarkPoint, sink: &dyn ActionSink, th: &Thresholds) -> (f64, f64) {
        let (sw, sh) = sink.screen_size();
        let x = (f64::from(palm.x) * f64::from(sw)).trunc();
        let y = (f64::from(palm.y) * f64::from(sh)).trunc();
        let (px, py) = self.prev.unwrap_or((x, y));
        self.prev = Some((x, y));

        let (dx, dy) = (x - px, y - py);
        let ratio = damping_ratio(dx * dx + dy * dy, th);
        let (cx, cy) = sink.pointer_position();
        (cx + dx * ratio, cy + dy * ratio)
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[derive(Debug)]
pub struct Controller {
    th: Thresholds,
    /// Fist held: left button is down and the pointer follows the palm.
    dragging: bool,
    /// Three fingers held: left button is down.
    grabbing: bool,
    /// A V sign was seen; the next MID/INDEX/TWO_FINGER_CLOSED clicks.
    click_armed: bool,
    pinch_major: bool,
    pinch_minor: bool,
    pinch: Option<PinchSession>,
    muted: bool,
    pointer: PointerMapper,
}

impl Controller {
    pub fn new(th: Thresholds) -> Self {
        Self {
            th,
            dragging: false,
            grabbing: false,
            click_armed: false,
            pinch_major: false,
            pinch_minor: false,
            pinch: None,
            muted: false,
            pointer: PointerMapper::default(),
        }
    }

    pub fn set_thresholds(&mut self, th: Thresholds) {
        self.th = th;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    pub fn is_click_armed(&self) -> bool {
        self.click_armed
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn pinch_session(&self) -> Option<&PinchSession> {
        self.pinch.as_ref()
    }

    /// Applies one frame's governing gesture.
    pub fn handle(&mut self, gesture: GestureSymbol, hand: Option<&HandSnapshot>, sink: &mut dyn ActionSink) {
        let th = self.th;
        let target = match hand {
            Some(h) if gesture != GestureSymbol::Palm => {
                Some(self.pointer.target(h.point(lm::MIDDLE_MCP), sink, &th))
            }
            _ => None,
        };

        if gesture == GestureSymbol::Fist {
            if !self.dragging {
                self.dragging = true;
                info!("drag: left button down");
                report(sink.button_down(MouseButton::Left), "button down");
            } else if let Some((x, y)) = target {
                report(sink.pointer_move_to(x, y), "drag move");
            }
        } else if self.dragging {
            self.release_drag(sink);
        }

        if gesture == GestureSymbol::ThreeFingers {
            if !self.grabbing && !self.dragging {
                self.grabbing = true;
                self.toggle_mute(sink);
                report(sink.button_down(MouseButton::Left), "button down");
            } else if !self.dragging {
                if let Some((x, y)) = target {
                    report(sink.pointer_move_to(x, y), "grab move");
                }
            }
        } else if self.grabbing {
            self.grabbing = false;
            report(sink.button_up(MouseButton::Left), "button up");
        }

        if gesture != GestureSymbol::PinchMajor && self.pinch_major {
            self.end_pinch(PinchKind::Major);
        }
        if gesture != GestureSymbol::PinchMinor && self.pinch_minor {
            self.end_pinch(PinchKind::Minor);
        }

        match gesture {
            GestureSymbol::VGest => {
                self.click_armed = true;
                if let Some((x, y)) = target {
                    report(sink.pointer_move_to(x, y), "pointer move");
                }
            }
            GestureSymbol::Mid if self.click_armed => {
                self.click_armed = false;
                report(sink.click(MouseButton::Left), "left click");
            }
            GestureSymbol::Index if self.click_armed => {
                self.click_armed = false;
                report(sink.click(MouseButton::Right), "right click");
            }
            GestureSymbol::TwoFingerClosed if self.click_armed => {
                self.click_armed = false;
                report(sink.double_click(), "double click");
            }
            GestureSymbol::PinchMinor => self.drive_pinch(PinchKind::Minor, hand, sink),
            GestureSymbol::PinchMajor => self.drive_pinch(PinchKind::Major, hand, sink),
            _ => {}
        }
    }

    /// A frame without any detected hand: drop pointer history and every
    /// latch, releasing buttons that are still held.
    pub fn no_hands(&mut self, sink: &mut dyn ActionSink) {
        self.pointer.reset();
        if self.dragging {
            self.release_drag(sink);
        }
        if self.grabbing {
            self.grabbing = false;
            report(sink.button_up(MouseButton::Left), "button up");
        }
        if self.pinch_major {
            self.end_pinch(PinchKind::Major);
        }
        if self.pinch_minor {
            self.end_pinch(PinchKind::Minor);
        }
        self.click_armed = false;
    }

    fn release_drag(&mut self, sink: &mut dyn ActionSink) {
        self.dragging = false;
        info!("drag: left button up");
        report(sink.button_up(MouseButton::Left), "button up");
    }

    fn toggle_mute(&mut self, sink: &mut dyn ActionSink) {
        match sink.toggle_mute() {
            Ok(()) => {
                self.muted = !self.muted;
                info!("volume {}", if self.muted { "muted" } else { "unmuted" });
            }
            Err(e) => warn!("toggle mute failed: {e}"),
        }
    }

    fn drive_pinch(&mut self, kind: PinchKind, hand: Option<&HandSnapshot>, sink: &mut dyn ActionSink) {
        let Some(hand) = hand else {
            return;
        };
        let tip = hand.point(lm::INDEX_TIP);
        let latch = match kind {
            PinchKind::Major => &mut self.pinch_major,
            PinchKind::Minor => &mut self.pinch_minor,
        };
        if !*latch || self.pinch.is_none() {
            *latch = true;
            self.pinch = Some(PinchSession::start(tip));
            debug!("pinch {kind:?}: session started at ({:.3}, {:.3})", tip.x, tip.y);
        }

        let th = self.th;
        let commit = self.pinch.as_mut().and_then(|s| s.update(tip, &th));
        if let Some(commit) = commit {
            self.apply_pinch(kind, commit, sink);
        }
    }

    fn end_pinch(&mut self, kind: PinchKind) {
        match kind {
            PinchKind::Major => self.pinch_major = false,
            PinchKind::Minor => self.pinch_minor = false,
        }
        self.pinch = None;
        debug!("pinch {kind:?}: session ended");
    }

    fn apply_pinch(&mut self, kind: PinchKind, commit: PinchCommit, sink: &mut dyn ActionSink) {
        let PinchCommit { axis, level } = commit;
        debug!("pinch {kind:?}: {axis:?} level {level}");
        let rising = level > 0.0;
        match (kind, axis) {
            (PinchKind::Minor, PinchAxis::Vertical) => {
                let delta = if rising { WHEEL_DELTA } else { -WHEEL_DELTA };
                report(sink.scroll(delta), "scroll");
            }
            (PinchKind::Minor, PinchAxis::Horizontal) => {
                let delta = if rising { -WHEEL_DELTA } else { WHEEL_DELTA };
                report(sink.horizontal_scroll(delta), "horizontal scroll");
            }
            (PinchKind::Major, PinchAxis::Horizontal) => {
                let step = level / self.th.level_divisor;
                let res = sink
                    .brightness_level()
                    .and_then(|cur| sink.set_brightness_level((cur + step).clamp(0.0, 1.0)));
                report(res, "brightness");
            }
            (PinchKind::Major, PinchAxis::Vertical) => {
                let step = level / self.th.level_divisor;
                let res = sink
                    .volume_level()
                    .and_then(|cur| sink.set_volume_level((cur + step).clamp(0.0, 1.0)));
                report(res, "volume");
            }
        }
    }
}

fn report(res: Result<(), ActionError>, what: &str) {
    if let Err(e) = res {
        warn!("{what} failed: {e}");
    }
}
