//! Finger extension signature.

use std::fmt;

use crate::hand::{HandSnapshot, lm, round1};

/// (tip, proximal joint, wrist) per non-thumb finger, index first.
const FINGER_CHAINS: [(usize, usize, usize); 4] = [
    (lm::INDEX_TIP, lm::INDEX_MCP, lm::WRIST),
    (lm::MIDDLE_TIP, lm::MIDDLE_MCP, lm::WRIST),
    (lm::RING_TIP, lm::RING_MCP, lm::WRIST),
    (lm::PINKY_TIP, lm::PINKY_MCP, lm::WRIST),
];

/// Substituted when the proximal-to-wrist segment collapses to zero length.
const FALLBACK_DIVISOR: f32 = 0.01;

/// Extension flags for [index, middle, ring, pinky]; `true` = extended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FingerSignature(pub [bool; 4]);

impl FingerSignature {
    pub const FIST: Self = Self([false, false, false, false]);
    pub const LAST3: Self = Self([false, true, true, true]);
    pub const LAST4: Self = Self([true, true, true, true]);
    pub const FIRST2: Self = Self([true, true, false, false]);

    /// Encodes the hand's finger extension from landmark geometry.
    pub fn encode(hand: &HandSnapshot, extension_ratio: f32) -> Self {
        let mut flags = [false; 4];
        for (flag, &(tip, proximal, wrist)) in flags.iter_mut().zip(FINGER_CHAINS.iter()) {
            let reach = hand.signed_dist(tip, proximal);
            let mut base = hand.signed_dist(proximal, wrist);
            if base.abs() < f32::EPSILON {
                base = FALLBACK_DIVISOR;
            }
            *flag = round1(reach / base) > extension_ratio;
        }
        Self(flags)
    }

    /// Index finger is the most significant bit.
    pub fn bits(&self) -> u8 {
        self.0.iter().fold(0u8, |acc, &f| (acc << 1) | u8::from(f))
    }

    #[cfg(test)]
    pub fn from_bits(bits: u8) -> Self {
        let mut flags = [false; 4];
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag = bits & (0b1000 >> i) != 0;
        }
        Self(flags)
    }
}

impl fmt::Display for FingerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.bits())
    }
}
