//! Property tests for the anchor state machine over arbitrary tracker histories.

use anchorwalk_anchor::{AnchorState, AnchorStateMachine, AnchorTransform, ImageTargetAnchor};
use anchorwalk_bridge::types::{Orientation, Pose, TrackerSignal};
use anchorwalk_config::FallbackPolicy;
use glam::{EulerRot, Quat, Vec3};
use proptest::prelude::*;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Found,
    /// Found, but the first pose has not arrived yet.
    FoundWithoutPose,
    Lost,
    Steady,
}

fn frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        Just(Frame::Found),
        Just(Frame::FoundWithoutPose),
        Just(Frame::Lost),
        Just(Frame::Steady)
    ]
}

fn policy() -> impl Strategy<Value = FallbackPolicy> {
    prop_oneof![
        Just(FallbackPolicy::ReferenceRelative),
        Just(FallbackPolicy::Accumulate)
    ]
}

fn pose_for(frame: usize) -> Pose {
    Pose {
        position: Vec3::new(frame as f32, 0.25, -(frame as f32) * 0.5),
        rotation: Quat::from_rotation_y(frame as f32 * 0.01),
    }
}

proptest! {
    #[test]
    fn state_follows_most_recent_signal(
        frames in proptest::collection::vec(frame(), 0..64),
        policy in policy(),
        alpha in -180.0f32..180.0,
        beta in -90.0f32..90.0,
        gamma in -90.0f32..90.0,
    ) {
        let (tx, rx) = mpsc::channel(8);
        let mut anchor = ImageTargetAnchor::new(rx, 1.0);
        let mut machine = AnchorStateMachine::new(AnchorTransform::IDENTITY, policy, 0.1);
        let orientation = Orientation { alpha, beta, gamma, available: true };

        let mut tracking = false;
        let mut latest_pose: Option<Pose> = None;
        let mut expected_last_known: Option<Pose> = None;

        for (i, frame) in frames.iter().enumerate() {
            let mut just_lost = false;
            match frame {
                Frame::Found => {
                    tx.try_send(TrackerSignal::TargetFound).unwrap();
                    tx.try_send(TrackerSignal::TargetPose(pose_for(i))).unwrap();
                    tracking = true;
                    latest_pose = Some(pose_for(i));
                }
                Frame::FoundWithoutPose => {
                    tx.try_send(TrackerSignal::TargetFound).unwrap();
                    if !tracking {
                        latest_pose = None;
                    }
                    tracking = true;
                }
                Frame::Lost => {
                    tx.try_send(TrackerSignal::TargetLost).unwrap();
                    just_lost = tracking;
                    if tracking {
                        expected_last_known = latest_pose.or(expected_last_known);
                    }
                    tracking = false;
                    latest_pose = None;
                }
                Frame::Steady => {
                    if tracking {
                        tx.try_send(TrackerSignal::TargetPose(pose_for(i))).unwrap();
                        latest_pose = Some(pose_for(i));
                    }
                }
            }

            let transform = machine.update(&mut anchor, &orientation);

            let expected_state = if tracking {
                AnchorState::Tracking
            } else {
                AnchorState::DeadReckoning
            };
            prop_assert_eq!(machine.state(), expected_state);
            prop_assert_eq!(machine.last_known(), expected_last_known.map(AnchorTransform::from));

            if tracking {
                if let Some(pose) = latest_pose {
                    prop_assert_eq!(transform, AnchorTransform::from(pose));
                }
            } else if let Some(last_known) = expected_last_known {
                // Position never moves while dead reckoning.
                prop_assert_eq!(transform.position, last_known.position);

                // The first frame of an outage is one offset away from the
                // last known rotation, whatever happened in earlier outages.
                if just_lost {
                    let (x, y, z) = last_known.rotation.to_euler(EulerRot::XYZ);
                    let euler = Vec3::new(x, y, z) + orientation.scene_radians() * 0.1;
                    let expected = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
                    prop_assert!(transform.rotation.abs_diff_eq(expected, 1e-5));
                }
            } else {
                prop_assert_eq!(transform, AnchorTransform::IDENTITY);
            }
        }
    }

    #[test]
    fn silent_tracker_never_leaves_dead_reckoning(
        frames in 1usize..200,
        available in any::<bool>(),
        alpha in -180.0f32..180.0,
        beta in -90.0f32..90.0,
    ) {
        let (_tx, rx) = mpsc::channel::<TrackerSignal>(8);
        let mut anchor = ImageTargetAnchor::new(rx, 1.0);
        let initial = AnchorTransform::new(Vec3::new(0.0, 0.0, -1.0), Quat::from_rotation_x(0.2));
        let mut machine = AnchorStateMachine::new(initial, FallbackPolicy::Accumulate, 0.1);
        let orientation = Orientation { alpha, beta, gamma: 0.0, available };

        for _ in 0..frames {
            let transform = machine.update(&mut anchor, &orientation);
            prop_assert_eq!(machine.state(), AnchorState::DeadReckoning);
            prop_assert_eq!(transform, initial);
        }
    }
}
