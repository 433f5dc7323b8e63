//! Assigns detected hands to major/minor roles.

use log::debug;
use serde::Deserialize;

use crate::hand::{DetectedHand, HandRole, HandSnapshot, Handedness};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantHand {
    Left,
    Right,
}

/// This frame's hands by role; either side may be missing.
#[derive(Debug, Default)]
pub struct RoleAssignment {
    pub major: Option<HandSnapshot>,
    pub minor: Option<HandSnapshot>,
}

#[derive(Debug, Clone, Copy)]
pub struct HandArbiter {
    dominant: DominantHand,
}

impl HandArbiter {
    pub fn new(dominant: DominantHand) -> Self {
        Self { dominant }
    }

    pub fn set_dominant(&mut self, dominant: DominantHand) {
        self.dominant = dominant;
    }

    pub fn assign(&self, hands: &[DetectedHand]) -> RoleAssignment {
        let mut left: Option<&DetectedHand> = None;
        let mut right: Option<&DetectedHand> = None;

        // Only the first two results count; a repeated label replaces the earlier hand.
        for (i, hand) in hands.iter().take(2).enumerate() {
            match hand.handedness {
                Some(Handedness::Left) => left = Some(hand),
                Some(Handedness::Right) => right = Some(hand),
                None => debug!(
                    "hand #{i} (score {:.2}) has no usable handedness; left unassigned",
                    hand.score
                ),
            }
        }

        let (major, minor) = match self.dominant {
            DominantHand::Right => (right, left),
            DominantHand::Left => (left, right),
        };

        RoleAssignment {
            major: major.map(|h| HandSnapshot::new(h.points, HandRole::Major)),
            minor: minor.map(|h| HandSnapshot::new(h.points, HandRole::Minor)),
        }
    }
}
