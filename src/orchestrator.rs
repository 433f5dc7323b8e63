//! Per-frame flow: arbitrate roles, recognize both hands, pick the governing
//! gesture and hand it to the controller.

use log::trace;

use crate::actions::ActionSink;
use crate::arbiter::HandArbiter;
use crate::config::{Profile, Thresholds};
use crate::controller::Controller;
use crate::gestures::{GestureSymbol, HandRecognizer};
use crate::hand::{DetectedHand, HandRole};

/// What governed a frame, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    NoHands,
    Governed { role: HandRole, gesture: GestureSymbol },
}

#[derive(Debug)]
pub struct FrameOrchestrator {
    th: Thresholds,
    arbiter: HandArbiter,
    major: HandRecognizer,
    minor: HandRecognizer,
    controller: Controller,
}

impl FrameOrchestrator {
    pub fn new(profile: &Profile) -> Self {
        Self {
            th: profile.thresholds,
            arbiter: HandArbiter::new(profile.hands.dominant),
            major: HandRecognizer::new(HandRole::Major),
            minor: HandRecognizer::new(HandRole::Minor),
            controller: Controller::new(profile.thresholds),
        }
    }

    /// Picks up new thresholds and dominant hand; latched state is kept.
    pub fn apply_profile(&mut self, profile: &Profile) {
        self.th = profile.thresholds;
        self.arbiter.set_dominant(profile.hands.dominant);
        self.controller.set_thresholds(profile.thresholds);
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn process(&mut self, hands: &[DetectedHand], sink: &mut dyn ActionSink) -> FrameOutcome {
        if hands.is_empty() {
            self.controller.no_hands(sink);
            return FrameOutcome::NoHands;
        }

        let roles = self.arbiter.assign(hands);
        let th = self.th;
        self.major.observe(roles.major.as_ref(), &th);
        self.minor.observe(roles.minor.as_ref(), &th);
        trace!(
            "fingers major={} ({}) minor={} ({})",
            self.major.signature(),
            self.major.settled().as_str(),
            self.minor.signature(),
            self.minor.settled().as_str()
        );

        // A minor-hand pinch (scroll) wins over whatever the major hand does;
        // the major hand isn't even classified on those frames.
        let minor_gesture = self.minor.gesture(roles.minor.as_ref(), &th);
        let (role, gesture, hand) = if minor_gesture == GestureSymbol::PinchMinor {
            (HandRole::Minor, minor_gesture, roles.minor.as_ref())
        } else {
            let g = self.major.gesture(roles.major.as_ref(), &th);
            (HandRole::Major, g, roles.major.as_ref())
        };

        self.controller.handle(gesture, hand, sink);
        FrameOutcome::Governed { role, gesture }
    }

    /// Releases anything still held, as if the hands had left the frame.
    pub fn shutdown(&mut self, sink: &mut dyn ActionSink) {
        self.controller.no_hands(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, MouseButton, RecordingSink};
    use crate::config::parse_profile;
    use crate::hand::{Handedness, fixtures};

    fn profile() -> Profile {
        parse_profile(include_str!("../profiles/default.toml")).unwrap()
    }

    fn run(
        orch: &mut FrameOrchestrator,
        sink: &mut RecordingSink,
        frame: &[DetectedHand],
        n: usize,
    ) -> Vec<FrameOutcome> {
        (0..n).map(|_| orch.process(frame, sink)).collect()
    }

    #[test]
    fn major_fist_settles_then_drags() {
        let mut orch = FrameOrchestrator::new(&profile());
        let mut sink = RecordingSink::new(1920, 1080);
        let fist = [fixtures::detected(fixtures::points([false; 4]), Handedness::Right)];

        let outcomes = run(&mut orch, &mut sink, &fist, 4);
        assert!(outcomes.iter().all(|o| *o
            == FrameOutcome::Governed {
                role: HandRole::Major,
                gesture: GestureSymbol::Palm
            }));
        assert!(sink.actions().is_empty());

        orch.process(&fist, &mut sink);
        assert_eq!(sink.take(), vec![Action::ButtonDown { button: MouseButton::Left }]);
        assert!(orch.controller().is_dragging());

        assert_eq!(orch.process(&[], &mut sink), FrameOutcome::NoHands);
        assert_eq!(sink.take(), vec![Action::ButtonUp { button: MouseButton::Left }]);
        assert!(!orch.controller().is_dragging());
    }

    #[test]
    fn minor_only_hand_leaves_major_at_palm() {
        let mut orch = FrameOrchestrator::new(&profile());
        let mut sink = RecordingSink::new(1920, 1080);
        let left_fist = [fixtures::detected(fixtures::points([false; 4]), Handedness::Left)];
        let outcomes = run(&mut orch, &mut sink, &left_fist, 8);
        assert!(outcomes.iter().all(|o| matches!(
            o,
            FrameOutcome::Governed { role: HandRole::Major, gesture: GestureSymbol::Palm }
        )));
        assert!(sink.actions().is_empty());
    }

    #[test]
    fn minor_pinch_preempts_major_v_sign() {
        let mut orch = FrameOrchestrator::new(&profile());
        let mut sink = RecordingSink::new(1920, 1080);
        let v = fixtures::detected(fixtures::v_sign(), Handedness::Right);
        let open_minor = fixtures::detected(fixtures::points([true; 4]), Handedness::Left);
        let pinch_minor = fixtures::detected(
            fixtures::pinched(fixtures::points([false, true, true, true])),
            Handedness::Left,
        );

        // Settle the V sign on the major hand.
        let settled = run(&mut orch, &mut sink, &[v.clone(), open_minor], 5);
        assert_eq!(
            settled.last(),
            Some(&FrameOutcome::Governed { role: HandRole::Major, gesture: GestureSymbol::VGest })
        );
        assert!(orch.controller().is_click_armed());

        // Minor starts pinching; the V sign keeps governing until the pinch settles.
        let frame = [pinch_minor, v];
        let warmup = run(&mut orch, &mut sink, &frame, 4);
        assert!(warmup.iter().all(|o| matches!(
            o,
            FrameOutcome::Governed { role: HandRole::Major, gesture: GestureSymbol::VGest }
        )));
        sink.take();

        let outcome = orch.process(&frame, &mut sink);
        assert_eq!(
            outcome,
            FrameOutcome::Governed { role: HandRole::Minor, gesture: GestureSymbol::PinchMinor }
        );
        assert!(sink.take().is_empty(), "no pointer move while the pinch governs");
        assert!(orch.controller().pinch_session().is_some());
    }

    #[test]
    fn left_dominant_profile_swaps_roles() {
        let mut p = profile();
        p.hands.dominant = crate::arbiter::DominantHand::Left;
        let mut orch = FrameOrchestrator::new(&p);
        let mut sink = RecordingSink::new(1920, 1080);
        let left_fist = [fixtures::detected(fixtures::points([false; 4]), Handedness::Left)];
        let outcomes = run(&mut orch, &mut sink, &left_fist, 5);
        assert_eq!(
            outcomes.last(),
            Some(&FrameOutcome::Governed { role: HandRole::Major, gesture: GestureSymbol::Fist })
        );
    }
}
