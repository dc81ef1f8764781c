use crate::AnchorTransform;
use anchorwalk_bridge::types::TrackerSignal;
use anchorwalk_config::{TrackerBackend, TrackerConfig};
use tokio::sync::mpsc;

/// Scaled positions beyond this distance are logged as suspicious.
const SUSPICIOUS_DISTANCE: f32 = 100.0;

/// Edge-triggered tracker transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerEdge {
    /// The target just became visible.
    Found,
    /// The target just went away. Carries the pose held immediately before.
    Lost { last_pose: Option<AnchorTransform> },
}

/// A tracker backend with the found/lost/pose shape.
pub trait OpticalAnchor: Send {
    /// Drain pending tracker signals, appending one edge per transition.
    /// Called once at the start of every frame.
    fn poll(&mut self, edges: &mut Vec<TrackerEdge>);

    /// Live pose, `None` when the target is not currently tracked.
    fn current_pose(&self) -> Option<AnchorTransform>;

    fn is_tracking(&self) -> bool;
}

/// Found/lost bookkeeping shared by the adapters.
#[derive(Debug, Default)]
struct TrackState {
    tracking: bool,
    pose: Option<AnchorTransform>,
}

impl TrackState {
    fn found(&mut self, edges: &mut Vec<TrackerEdge>) {
        if !self.tracking {
            tracing::info!("Target found");
            self.tracking = true;
            edges.push(TrackerEdge::Found);
        }
    }

    fn lost(&mut self, edges: &mut Vec<TrackerEdge>) {
        if self.tracking {
            tracing::info!("Target lost");
            self.tracking = false;
            // Snapshot before the pose is cleared.
            edges.push(TrackerEdge::Lost {
                last_pose: self.pose.take(),
            });
        }
    }

    fn update_pose(&mut self, pose: AnchorTransform) {
        if !(pose.position.is_finite() && pose.rotation.is_finite()) {
            tracing::trace!(?pose, "Skipping non-finite pose");
            return;
        }
        if self.tracking {
            self.pose = Some(pose);
        } else {
            tracing::trace!("Pose while not tracking ignored");
        }
    }

    fn current_pose(&self) -> Option<AnchorTransform> {
        if self.tracking {
            self.pose
        } else {
            None
        }
    }
}

/// Natural-image target backend (position + quaternion poses).
pub struct ImageTargetAnchor {
    inbox: mpsc::Receiver<TrackerSignal>,
    track: TrackState,
    pose_scale: f32,
    warned_distance: bool,
}

impl ImageTargetAnchor {
    pub fn new(inbox: mpsc::Receiver<TrackerSignal>, pose_scale: f32) -> Self {
        Self {
            inbox,
            track: TrackState::default(),
            pose_scale,
            warned_distance: false,
        }
    }
}

impl OpticalAnchor for ImageTargetAnchor {
    fn poll(&mut self, edges: &mut Vec<TrackerEdge>) {
        while let Ok(signal) = self.inbox.try_recv() {
            match signal {
                TrackerSignal::TargetFound => {
                    self.warned_distance = false;
                    self.track.found(edges);
                }
                TrackerSignal::TargetLost => self.track.lost(edges),
                TrackerSignal::TargetPose(pose) => {
                    let position = pose.position * self.pose_scale;
                    let distance = position.length();
                    if distance > SUSPICIOUS_DISTANCE && !self.warned_distance {
                        tracing::warn!(distance, "Large target position detected");
                        self.warned_distance = true;
                    }
                    self.track
                        .update_pose(AnchorTransform::new(position, pose.rotation));
                }
                other => tracing::trace!(?other, "Ignoring marker signal on image target backend"),
            }
        }
    }

    fn current_pose(&self) -> Option<AnchorTransform> {
        self.track.current_pose()
    }

    fn is_tracking(&self) -> bool {
        self.track.tracking
    }
}

/// Fiducial marker backend (camera transform matrices).
pub struct MarkerAnchor {
    inbox: mpsc::Receiver<TrackerSignal>,
    track: TrackState,
}

impl MarkerAnchor {
    pub fn new(inbox: mpsc::Receiver<TrackerSignal>) -> Self {
        Self {
            inbox,
            track: TrackState::default(),
        }
    }
}

impl OpticalAnchor for MarkerAnchor {
    fn poll(&mut self, edges: &mut Vec<TrackerEdge>) {
        while let Ok(signal) = self.inbox.try_recv() {
            match signal {
                TrackerSignal::MarkerFound => self.track.found(edges),
                TrackerSignal::MarkerLost => self.track.lost(edges),
                TrackerSignal::MarkerMatrix(matrix) => {
                    // Scale is discarded.
                    let (_, rotation, translation) = matrix.to_scale_rotation_translation();
                    self.track
                        .update_pose(AnchorTransform::new(translation, rotation.normalize()));
                }
                other => tracing::trace!(?other, "Ignoring image target signal on marker backend"),
            }
        }
    }

    fn current_pose(&self) -> Option<AnchorTransform> {
        self.track.current_pose()
    }

    fn is_tracking(&self) -> bool {
        self.track.tracking
    }
}

/// Build the adapter for the configured backend.
pub fn optical_anchor(
    config: &TrackerConfig,
    inbox: mpsc::Receiver<TrackerSignal>,
) -> Box<dyn OpticalAnchor> {
    tracing::info!(backend = ?config.backend, "Optical anchor backend selected");
    match config.backend {
        TrackerBackend::ImageTarget => Box::new(ImageTargetAnchor::new(inbox, config.pose_scale)),
        TrackerBackend::Marker => Box::new(MarkerAnchor::new(inbox)),
    }
}
