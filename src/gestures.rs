use log::debug;

use crate::config::Thresholds;
use crate::fingers::FingerSignature;
use crate::hand::{HandRole, HandSnapshot, lm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureSymbol {
    Fist,
    Pinky,
    Ring,
    Mid,
    Last3,
    Index,
    First2,
    Last4,
    /// Part of the symbol set, but the signature leaves the thumb out, so
    /// classification never yields it.
    #[allow(dead_code)]
    Thumb,
    Palm,
    ThreeFingers,
    VGest,
    TwoFingerClosed,
    PinchMajor,
    PinchMinor,
    /// Extension pattern with no name of its own; never drives a control.
    Unnamed(FingerSignature),
}

impl GestureSymbol {
    /// Symbol a bare finger pattern stands for when no auxiliary check applies.
    pub fn from_signature(sig: FingerSignature) -> Self {
        match sig.0 {
            [false, false, false, false] => Self::Fist,
            [false, false, false, true] => Self::Pinky,
            [false, false, true, false] => Self::Ring,
            [false, true, false, false] => Self::Mid,
            [false, true, true, true] => Self::Last3,
            [true, false, false, false] => Self::Index,
            [true, true, false, false] => Self::First2,
            [true, true, true, false] => Self::ThreeFingers,
            [true, true, true, true] => Self::Last4,
            _ => Self::Unnamed(sig),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fist => "fist",
            Self::Pinky => "pinky",
            Self::Ring => "ring",
            Self::Mid => "mid",
            Self::Last3 => "last3",
            Self::Index => "index",
            Self::First2 => "first2",
            Self::Last4 => "last4",
            Self::Thumb => "thumb",
            Self::Palm => "palm",
            Self::ThreeFingers => "three-fingers",
            Self::VGest => "v",
            Self::TwoFingerClosed => "two-finger-closed",
            Self::PinchMajor => "pinch-major",
            Self::PinchMinor => "pinch-minor",
            Self::Unnamed(_) => "unnamed",
        }
    }
}

/// Raw (undebounced) gesture for one frame.
pub fn classify(hand: &HandSnapshot, sig: FingerSignature, th: &Thresholds) -> GestureSymbol {
    if (sig == FingerSignature::LAST3 || sig == FingerSignature::LAST4)
        && hand.dist(lm::INDEX_TIP, lm::THUMB_TIP) < th.pinch_distance
    {
        return match hand.role {
            HandRole::Minor => GestureSymbol::PinchMinor,
            HandRole::Major => GestureSymbol::PinchMajor,
        };
    }

    if sig == FingerSignature::FIRST2 {
        let spread = hand.dist(lm::INDEX_TIP, lm::MIDDLE_TIP) / hand.dist(lm::INDEX_MCP, lm::MIDDLE_MCP);
        return if spread > th.spread_ratio {
            GestureSymbol::VGest
        } else if hand.dz(lm::INDEX_TIP, lm::MIDDLE_TIP) < th.closed_depth {
            GestureSymbol::TwoFingerClosed
        } else {
            GestureSymbol::Mid
        };
    }

    GestureSymbol::from_signature(sig)
}

/// Per-role recognizer: signature, debounce counter and settled gesture.
#[derive(Debug)]
pub struct HandRecognizer {
    role: HandRole,
    signature: FingerSignature,
    settled: GestureSymbol,
    prev_raw: GestureSymbol,
    streak: u32,
}

impl HandRecognizer {
    pub fn new(role: HandRole) -> Self {
        Self {
            role,
            signature: FingerSignature::default(),
            settled: GestureSymbol::Palm,
            prev_raw: GestureSymbol::Palm,
            streak: 0,
        }
    }

    pub fn signature(&self) -> FingerSignature {
        self.signature
    }

    pub fn settled(&self) -> GestureSymbol {
        self.settled
    }

    /// Refreshes the finger signature from this frame's snapshot.
    pub fn observe(&mut self, hand: Option<&HandSnapshot>, th: &Thresholds) {
        if let Some(hand) = hand {
            self.signature = FingerSignature::encode(hand, th.extension_ratio);
        }
    }

    /// Classifies and debounces; returns the settled gesture. An absent hand
    /// reads as PALM and leaves the debounce state alone.
    pub fn gesture(&mut self, hand: Option<&HandSnapshot>, th: &Thresholds) -> GestureSymbol {
        let Some(hand) = hand else {
            return GestureSymbol::Palm;
        };
        self.push_raw(classify(hand, self.signature, th), th)
    }

    fn push_raw(&mut self, raw: GestureSymbol, th: &Thresholds) -> GestureSymbol {
        if raw == self.prev_raw {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 1;
        }
        self.prev_raw = raw;

        if self.streak > th.debounce_frames && self.settled != raw {
            debug!(
                "{} hand settled {} -> {} (fingers {})",
                self.role.as_str(),
                self.settled.as_str(),
                raw.as_str(),
                self.signature
            );
            self.settled = raw;
        }
        self.settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{HandRole, LandmarkPoint, fixtures};

    #[test]
    fn no_signature_classifies_as_thumb() {
        for bits in 0..16u8 {
            let sig = FingerSignature::from_bits(bits);
            assert_ne!(GestureSymbol::from_signature(sig), GestureSymbol::Thumb);
        }
    }

    fn th() -> Thresholds {
        Thresholds::default()
    }

    fn raw_for(pts: [LandmarkPoint; 21], role: HandRole) -> GestureSymbol {
        let hand = HandSnapshot::new(pts, role);
        let sig = FingerSignature::encode(&hand, th().extension_ratio);
        classify(&hand, sig, &th())
    }

    #[test]
    fn plain_signatures_pass_through() {
        for bits in 0u8..16 {
            let sig = FingerSignature::from_bits(bits);
            if sig == FingerSignature::FIRST2 {
                continue;
            }
            let hand = fixtures::snapshot(sig.0, HandRole::Major);
            assert_eq!(
                classify(&hand, sig, &th()),
                GestureSymbol::from_signature(sig),
                "pattern {sig}"
            );
        }
    }

    #[test]
    fn named_passthrough_symbols() {
        assert_eq!(GestureSymbol::from_signature(FingerSignature::FIST), GestureSymbol::Fist);
        assert_eq!(GestureSymbol::from_signature(FingerSignature::from_bits(0b1110)), GestureSymbol::ThreeFingers);
        assert_eq!(GestureSymbol::from_signature(FingerSignature::from_bits(0b1000)), GestureSymbol::Index);
        assert_eq!(GestureSymbol::from_signature(FingerSignature::LAST4), GestureSymbol::Last4);
        assert!(matches!(
            GestureSymbol::from_signature(FingerSignature::from_bits(0b1010)),
            GestureSymbol::Unnamed(_)
        ));
    }

    #[test]
    fn pinch_depends_on_role() {
        let pts = fixtures::pinched(fixtures::points([false, true, true, true]));
        assert_eq!(raw_for(pts, HandRole::Minor), GestureSymbol::PinchMinor);
        assert_eq!(raw_for(pts, HandRole::Major), GestureSymbol::PinchMajor);

        let open = fixtures::pinched(fixtures::points([true; 4]));
        assert_eq!(raw_for(open, HandRole::Minor), GestureSymbol::PinchMinor);
    }

    #[test]
    fn thumb_apart_is_not_a_pinch() {
        assert_eq!(raw_for(fixtures::points([false, true, true, true]), HandRole::Minor), GestureSymbol::Last3);
    }

    #[test]
    fn two_finger_variants() {
        assert_eq!(raw_for(fixtures::v_sign(), HandRole::Major), GestureSymbol::VGest);

        let closed = fixtures::points([true, true, false, false]);
        assert_eq!(raw_for(closed, HandRole::Major), GestureSymbol::TwoFingerClosed);

        let mut apart_in_depth = closed;
        apart_in_depth[lm::MIDDLE_TIP].z = 0.15;
        assert_eq!(raw_for(apart_in_depth, HandRole::Major), GestureSymbol::Mid);
    }

    #[test]
    fn settles_on_fifth_identical_observation() {
        let mut rec = HandRecognizer::new(HandRole::Major);
        for _ in 0..4 {
            assert_eq!(rec.push_raw(GestureSymbol::Fist, &th()), GestureSymbol::Palm);
        }
        assert_eq!(rec.push_raw(GestureSymbol::Fist, &th()), GestureSymbol::Fist);
    }

    #[test]
    fn interrupted_streak_starts_over() {
        let mut rec = HandRecognizer::new(HandRole::Major);
        for _ in 0..4 {
            rec.push_raw(GestureSymbol::Fist, &th());
        }
        rec.push_raw(GestureSymbol::Index, &th());
        for _ in 0..4 {
            assert_eq!(rec.push_raw(GestureSymbol::Fist, &th()), GestureSymbol::Palm);
        }
        assert_eq!(rec.push_raw(GestureSymbol::Fist, &th()), GestureSymbol::Fist);
    }

    #[test]
    fn absent_hand_reads_as_palm_without_touching_state() {
        let th = th();
        let mut rec = HandRecognizer::new(HandRole::Major);
        let fist = fixtures::snapshot([false; 4], HandRole::Major);
        for _ in 0..5 {
            rec.observe(Some(&fist), &th);
            rec.gesture(Some(&fist), &th);
        }
        assert_eq!(rec.settled(), GestureSymbol::Fist);

        rec.observe(None, &th);
        assert_eq!(rec.gesture(None, &th), GestureSymbol::Palm);
        assert_eq!(rec.settled(), GestureSymbol::Fist);
        assert_eq!(rec.signature(), FingerSignature::FIST);
    }
}
