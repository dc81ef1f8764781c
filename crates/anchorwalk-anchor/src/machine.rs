use crate::optical::{OpticalAnchor, TrackerEdge};
use crate::AnchorTransform;
use anchorwalk_bridge::types::Orientation;
use anchorwalk_config::{FallbackPolicy, SensorConfig, TrackerConfig};
use glam::{EulerRot, Quat, Vec3};
use serde::Serialize;

/// Where the anchor transform currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorState {
    /// The optical tracker has a fix; its pose is authoritative.
    Tracking,
    /// No fix; the transform is extrapolated from the last known anchor.
    DeadReckoning,
}

/// Status for display, separating an active fallback from a dead one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorStatus {
    Tracking,
    DeadReckoning,
    /// Dead reckoning with nothing to extrapolate from.
    Lost,
}

/// Decides how the world is anchored each frame.
pub struct AnchorStateMachine {
    state: AnchorState,
    transform: AnchorTransform,
    last_known: Option<AnchorTransform>,
    /// XYZ euler angles of `last_known`.
    reference_euler: Vec3,
    /// Running base for [`FallbackPolicy::Accumulate`].
    accumulated_euler: Vec3,
    policy: FallbackPolicy,
    damping: f32,
    fallback_active: bool,
    edges: Vec<TrackerEdge>,
}

impl AnchorStateMachine {
    pub fn new(initial: AnchorTransform, policy: FallbackPolicy, damping: f32) -> Self {
        Self {
            state: AnchorState::DeadReckoning,
            transform: initial,
            last_known: None,
            reference_euler: Vec3::ZERO,
            accumulated_euler: Vec3::ZERO,
            policy,
            damping,
            fallback_active: false,
            edges: Vec::with_capacity(4),
        }
    }

    pub fn from_config(tracker: &TrackerConfig, sensors: &SensorConfig) -> Self {
        Self::new(
            AnchorTransform::new(tracker.initial_position, tracker.initial_rotation),
            sensors.fallback,
            sensors.damping,
        )
    }

    /// Advance one frame and return the authoritative anchor transform.
    pub fn update(
        &mut self,
        optical: &mut dyn OpticalAnchor,
        orientation: &Orientation,
    ) -> AnchorTransform {
        let mut edges = std::mem::take(&mut self.edges);
        optical.poll(&mut edges);
        for edge in edges.drain(..) {
            self.apply_edge(edge);
        }
        self.edges = edges;

        match self.state {
            AnchorState::Tracking => {
                // Hold the previous transform until the first pose arrives.
                if let Some(pose) = optical.current_pose() {
                    self.transform = pose;
                }
            }
            AnchorState::DeadReckoning => self.dead_reckon(orientation),
        }

        self.transform
    }

    /// Apply one tracker edge.
    pub fn apply_edge(&mut self, edge: TrackerEdge) {
        match (self.state, edge) {
            (AnchorState::DeadReckoning, TrackerEdge::Found) => {
                tracing::info!("Optical tracking acquired");
                self.state = AnchorState::Tracking;
                self.fallback_active = false;
            }
            (AnchorState::Tracking, TrackerEdge::Lost { last_pose }) => {
                if let Some(pose) = last_pose {
                    self.capture(pose);
                }
                // Each outage starts from the reference, not the previous drift.
                self.accumulated_euler = self.reference_euler;
                self.state = AnchorState::DeadReckoning;
                tracing::info!(
                    anchored = self.last_known.is_some(),
                    "Optical tracking lost, dead reckoning"
                );
            }
            (AnchorState::Tracking, TrackerEdge::Found)
            | (AnchorState::DeadReckoning, TrackerEdge::Lost { .. }) => {}
        }
    }

    fn capture(&mut self, pose: AnchorTransform) {
        let (x, y, z) = pose.rotation.to_euler(EulerRot::XYZ);
        self.last_known = Some(pose);
        self.reference_euler = Vec3::new(x, y, z);
    }

    fn dead_reckon(&mut self, orientation: &Orientation) {
        let Some(last_known) = self.last_known else {
            // Never tracked: leave the initial transform alone.
            self.fallback_active = false;
            return;
        };

        if !orientation.available {
            self.transform = last_known;
            self.fallback_active = false;
            return;
        }

        let offset = orientation.scene_radians() * self.damping;
        let euler = match self.policy {
            FallbackPolicy::ReferenceRelative => self.reference_euler + offset,
            FallbackPolicy::Accumulate => {
                self.accumulated_euler += offset;
                self.accumulated_euler
            }
        };

        // Position stays frozen; acceleration is not integrated.
        self.transform = AnchorTransform::new(
            last_known.position,
            Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z),
        );
        self.fallback_active = true;
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn status(&self) -> AnchorStatus {
        match self.state {
            AnchorState::Tracking => AnchorStatus::Tracking,
            AnchorState::DeadReckoning if self.fallback_active => AnchorStatus::DeadReckoning,
            AnchorState::DeadReckoning => AnchorStatus::Lost,
        }
    }

    pub fn transform(&self) -> AnchorTransform {
        self.transform
    }

    /// Pose captured at the most recent loss of tracking.
    pub fn last_known(&self) -> Option<AnchorTransform> {
        self.last_known
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optical::ImageTargetAnchor;
    use anchorwalk_bridge::types::{Pose, TrackerSignal};
    use tokio::sync::mpsc;

    fn pose(x: f32, yaw: f32) -> Pose {
        Pose {
            position: Vec3::new(x, 0.5, -1.0),
            rotation: Quat::from_euler(EulerRot::XYZ, 0.1, yaw, 0.0),
        }
    }

    fn orientation(alpha: f32, beta: f32, gamma: f32) -> Orientation {
        Orientation {
            alpha,
            beta,
            gamma,
            available: true,
        }
    }

    fn rig(policy: FallbackPolicy) -> (mpsc::Sender<TrackerSignal>, ImageTargetAnchor, AnchorStateMachine) {
        let (tx, rx) = mpsc::channel(16);
        let anchor = ImageTargetAnchor::new(rx, 1.0);
        let machine = AnchorStateMachine::new(AnchorTransform::IDENTITY, policy, 0.1);
        (tx, anchor, machine)
    }

    fn euler(q: Quat) -> Vec3 {
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    #[test]
    fn found_lost_found_within_three_frames() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::ReferenceRelative);
        let still = orientation(0.0, 0.0, 0.0);
        let frame1 = pose(1.0, 0.2);

        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(frame1)).unwrap();
        let t1 = machine.update(&mut anchor, &still);
        assert_eq!(machine.state(), AnchorState::Tracking);
        assert_eq!(t1, AnchorTransform::from(frame1));

        tx.try_send(TrackerSignal::TargetLost).unwrap();
        machine.update(&mut anchor, &still);
        assert_eq!(machine.state(), AnchorState::DeadReckoning);
        assert_eq!(machine.last_known(), Some(AnchorTransform::from(frame1)));

        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(3.0, -0.3))).unwrap();
        let t3 = machine.update(&mut anchor, &still);
        assert_eq!(machine.state(), AnchorState::Tracking);
        assert_eq!(machine.last_known(), Some(AnchorTransform::from(frame1)));
        // No blending across the cut.
        assert_eq!(t3, AnchorTransform::from(pose(3.0, -0.3)));
    }

    #[test]
    fn last_known_is_pose_immediately_before_loss() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::ReferenceRelative);
        let still = orientation(0.0, 0.0, 0.0);

        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(1.0, 0.0))).unwrap();
        machine.update(&mut anchor, &still);

        // Pose refresh and loss land in the same frame.
        tx.try_send(TrackerSignal::TargetPose(pose(2.0, 0.1))).unwrap();
        tx.try_send(TrackerSignal::TargetLost).unwrap();
        machine.update(&mut anchor, &still);

        assert_eq!(machine.last_known(), Some(AnchorTransform::from(pose(2.0, 0.1))));

        // Poses after the loss are stale and never captured.
        tx.try_send(TrackerSignal::TargetPose(pose(9.0, 0.0))).unwrap();
        machine.update(&mut anchor, &still);
        assert_eq!(machine.last_known(), Some(AnchorTransform::from(pose(2.0, 0.1))));
    }

    #[test]
    fn never_tracked_is_a_no_op() {
        let initial = AnchorTransform::new(Vec3::new(0.0, 0.0, -2.0), Quat::from_rotation_y(0.3));
        let (_tx, rx) = mpsc::channel(4);
        let mut anchor = ImageTargetAnchor::new(rx, 1.0);
        let mut machine =
            AnchorStateMachine::new(initial, FallbackPolicy::ReferenceRelative, 0.1);

        for _ in 0..120 {
            let t = machine.update(&mut anchor, &orientation(45.0, 10.0, -5.0));
            assert_eq!(t, initial);
        }
        let unavailable = Orientation::default();
        assert_eq!(machine.update(&mut anchor, &unavailable), initial);

        assert_eq!(machine.state(), AnchorState::DeadReckoning);
        assert_eq!(machine.status(), AnchorStatus::Lost);
        assert!(machine.last_known().is_none());
    }

    #[test]
    fn dead_reckoning_freezes_position_and_offsets_rotation() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::ReferenceRelative);
        let tracked = pose(1.5, 0.2);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(tracked)).unwrap();
        machine.update(&mut anchor, &orientation(0.0, 0.0, 0.0));
        tx.try_send(TrackerSignal::TargetLost).unwrap();

        let t = machine.update(&mut anchor, &orientation(30.0, 20.0, -10.0));
        assert_eq!(machine.status(), AnchorStatus::DeadReckoning);
        assert_eq!(t.position, tracked.position);

        let base = euler(tracked.rotation);
        let expected = base
            + Vec3::new(
                20.0_f32.to_radians(),
                30.0_f32.to_radians(),
                (-10.0_f32).to_radians(),
            ) * 0.1;
        assert!(euler(t.rotation).abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn unavailable_orientation_holds_last_known() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::ReferenceRelative);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(1.0, 0.4))).unwrap();
        machine.update(&mut anchor, &Orientation::default());
        tx.try_send(TrackerSignal::TargetLost).unwrap();

        let t = machine.update(&mut anchor, &Orientation::default());
        assert_eq!(t, AnchorTransform::from(pose(1.0, 0.4)));
        assert_eq!(machine.status(), AnchorStatus::Lost);
    }

    // The fallback offset is measured from the captured reference, so holding
    // the device still keeps the rotation fixed however long tracking is lost.
    #[test]
    fn reference_relative_offset_is_bounded_across_frames() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::ReferenceRelative);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(0.0, 0.0))).unwrap();
        machine.update(&mut anchor, &orientation(0.0, 0.0, 0.0));
        tx.try_send(TrackerSignal::TargetLost).unwrap();

        let held = orientation(0.0, 15.0, 0.0);
        let first = machine.update(&mut anchor, &held);
        for _ in 0..200 {
            machine.update(&mut anchor, &held);
        }
        assert!(machine.transform().rotation.abs_diff_eq(first.rotation, 1e-5));
    }

    // The offset is re-added to the previous frame's rotation, so a constant
    // tilt keeps turning the world.
    #[test]
    fn accumulate_policy_reproduces_drift() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::Accumulate);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(0.0, 0.0))).unwrap();
        machine.update(&mut anchor, &orientation(0.0, 0.0, 0.0));
        tx.try_send(TrackerSignal::TargetLost).unwrap();

        let held = orientation(0.0, 1.0, 0.0);
        for _ in 0..10 {
            machine.update(&mut anchor, &held);
        }
        let x = euler(machine.transform().rotation).x;
        let expected = 0.1 + 10.0 * 1.0_f32.to_radians() * 0.1;
        assert!((x - expected).abs() < 1e-4, "x = {x}, expected {expected}");
    }

    #[test]
    fn recapture_on_next_loss() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::Accumulate);
        let still = orientation(0.0, 0.0, 0.0);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(1.0, 0.0))).unwrap();
        machine.update(&mut anchor, &still);
        tx.try_send(TrackerSignal::TargetLost).unwrap();
        machine.update(&mut anchor, &orientation(0.0, 5.0, 0.0));

        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(2.0, 0.5))).unwrap();
        machine.update(&mut anchor, &still);
        tx.try_send(TrackerSignal::TargetLost).unwrap();
        let t = machine.update(&mut anchor, &still);

        assert_eq!(machine.last_known(), Some(AnchorTransform::from(pose(2.0, 0.5))));
        // Accumulated drift from the first outage does not carry over.
        assert!(euler(t.rotation).abs_diff_eq(euler(pose(2.0, 0.5).rotation), 1e-4));
    }

    #[test]
    fn poseless_outage_restarts_from_last_known() {
        let (tx, mut anchor, mut machine) = rig(FallbackPolicy::Accumulate);
        let still = orientation(0.0, 0.0, 0.0);
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        tx.try_send(TrackerSignal::TargetPose(pose(1.0, 0.0))).unwrap();
        machine.update(&mut anchor, &still);
        tx.try_send(TrackerSignal::TargetLost).unwrap();
        for _ in 0..10 {
            machine.update(&mut anchor, &orientation(0.0, 5.0, 0.0));
        }

        // Found again, but lost before any pose arrives.
        tx.try_send(TrackerSignal::TargetFound).unwrap();
        machine.update(&mut anchor, &still);
        tx.try_send(TrackerSignal::TargetLost).unwrap();
        let t = machine.update(&mut anchor, &still);

        assert_eq!(machine.last_known(), Some(AnchorTransform::from(pose(1.0, 0.0))));
        assert!(euler(t.rotation).abs_diff_eq(euler(pose(1.0, 0.0).rotation), 1e-4));
    }
}
