//! World anchoring under intermittent optical tracking.
//!
//! An [`OpticalAnchor`] adapter turns raw tracker callbacks into edge signals
//! and a live pose. The [`AnchorStateMachine`] consumes those edges plus the
//! device orientation once per frame and produces the single authoritative
//! world-anchor transform: the live pose while tracking, a frozen position
//! with an orientation-derived rotation offset while dead reckoning.

pub mod machine;
pub mod optical;

pub use machine::{AnchorState, AnchorStateMachine, AnchorStatus};
pub use optical::{optical_anchor, ImageTargetAnchor, MarkerAnchor, OpticalAnchor, TrackerEdge};

use anchorwalk_bridge::types::Pose;
use glam::{Quat, Vec3};
use serde::Serialize;

/// Pose of the world anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl AnchorTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for AnchorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Pose> for AnchorTransform {
    fn from(pose: Pose) -> Self {
        Self::new(pose.position, pose.rotation)
    }
}
