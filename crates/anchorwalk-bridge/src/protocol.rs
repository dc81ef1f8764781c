use crate::types::{
    AccelerationSample, Capabilities, JoystickSignal, Orientation, Pose, RetryRequest,
    TrackerSignal,
};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Lines longer than this without a newline are discarded.
const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed bridge event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Bridge line exceeded {MAX_LINE_LEN} bytes without a newline")]
    LineTooLong,
}

/// A decoded event from the device bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Capabilities(Capabilities),
    Permission { granted: bool },
    Orientation(Orientation),
    Motion(AccelerationSample),
    Tracker(TrackerSignal),
    TrackerStarted,
    TrackerFailed(String),
    CameraPose(Pose),
    Joystick(JoystickSignal),
    Retry(RetryRequest),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Capabilities {
        #[serde(default)]
        orientation: bool,
        #[serde(default)]
        motion: bool,
        #[serde(default)]
        permission_api: bool,
    },
    Permission {
        granted: bool,
    },
    Orientation {
        #[serde(default)]
        alpha: Option<f32>,
        #[serde(default)]
        beta: Option<f32>,
        #[serde(default)]
        gamma: Option<f32>,
    },
    Motion {
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
        #[serde(default)]
        z: Option<f32>,
    },
    TargetFound,
    TargetLost,
    TargetPose {
        position: [f32; 3],
        quaternion: [f32; 4],
    },
    MarkerFound,
    MarkerLost,
    MarkerMatrix {
        elements: [f32; 16],
    },
    TrackerStarted,
    TrackerFailed {
        #[serde(default)]
        message: String,
    },
    CameraPose {
        position: [f32; 3],
        quaternion: [f32; 4],
    },
    JoystickStart,
    JoystickMove {
        dx: f32,
        dy: f32,
    },
    JoystickEnd,
    RetryTracker,
    RetrySensors,
}

fn pose(position: [f32; 3], quaternion: [f32; 4]) -> Pose {
    let [x, y, z, w] = quaternion;
    Pose {
        position: Vec3::from_array(position),
        rotation: Quat::from_xyzw(x, y, z, w).normalize(),
    }
}

impl From<WireEvent> for BridgeEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Capabilities {
                orientation,
                motion,
                permission_api,
            } => BridgeEvent::Capabilities(Capabilities {
                orientation,
                motion,
                permission_api,
            }),
            WireEvent::Permission { granted } => BridgeEvent::Permission { granted },
            // Platforms report null for axes they cannot measure.
            WireEvent::Orientation { alpha, beta, gamma } => {
                BridgeEvent::Orientation(Orientation {
                    alpha: alpha.unwrap_or(0.0),
                    beta: beta.unwrap_or(0.0),
                    gamma: gamma.unwrap_or(0.0),
                    available: true,
                })
            }
            WireEvent::Motion { x, y, z } => BridgeEvent::Motion(AccelerationSample {
                x: x.unwrap_or(0.0),
                y: y.unwrap_or(0.0),
                z: z.unwrap_or(0.0),
            }),
            WireEvent::TargetFound => BridgeEvent::Tracker(TrackerSignal::TargetFound),
            WireEvent::TargetLost => BridgeEvent::Tracker(TrackerSignal::TargetLost),
            WireEvent::TargetPose {
                position,
                quaternion,
            } => BridgeEvent::Tracker(TrackerSignal::TargetPose(pose(position, quaternion))),
            WireEvent::MarkerFound => BridgeEvent::Tracker(TrackerSignal::MarkerFound),
            WireEvent::MarkerLost => BridgeEvent::Tracker(TrackerSignal::MarkerLost),
            WireEvent::MarkerMatrix { elements } => {
                BridgeEvent::Tracker(TrackerSignal::MarkerMatrix(Mat4::from_cols_array(&elements)))
            }
            WireEvent::TrackerStarted => BridgeEvent::TrackerStarted,
            WireEvent::TrackerFailed { message } => BridgeEvent::TrackerFailed(message),
            WireEvent::CameraPose {
                position,
                quaternion,
            } => BridgeEvent::CameraPose(pose(position, quaternion)),
            WireEvent::JoystickStart => BridgeEvent::Joystick(JoystickSignal::Start),
            WireEvent::JoystickMove { dx, dy } => {
                BridgeEvent::Joystick(JoystickSignal::Move { dx, dy })
            }
            WireEvent::JoystickEnd => BridgeEvent::Joystick(JoystickSignal::End),
            WireEvent::RetryTracker => BridgeEvent::Retry(RetryRequest::Tracker),
            WireEvent::RetrySensors => BridgeEvent::Retry(RetryRequest::Sensors),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    Sensors,
    Tracker,
}

/// Commands sent to the device bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
    RequestPermission,
    SubscribeSensors,
    StartTracker,
    PromptRetry {
        reason: RetryReason,
        message: String,
    },
    SetWorld {
        position: [f32; 3],
        quaternion: [f32; 4],
    },
    SetCharacter {
        x: f32,
        z: f32,
        facing: f32,
    },
    /// Joystick knob offset from the base centre, in pixels.
    SetKnob {
        x: f32,
        y: f32,
    },
    Debug {
        snapshot: serde_json::Value,
    },
}

impl BridgeCommand {
    pub fn set_world(position: Vec3, rotation: Quat) -> Self {
        BridgeCommand::SetWorld {
            position: position.to_array(),
            quaternion: rotation.to_array(),
        }
    }

    /// Wrap a serializable snapshot for the device's debug panel.
    pub fn debug<T: Serialize>(snapshot: &T) -> Result<Self, ProtocolError> {
        Ok(BridgeCommand::Debug {
            snapshot: serde_json::to_value(snapshot)?,
        })
    }
}

/// Serialize a command as one newline-terminated JSON line.
pub fn encode_command(command: &BridgeCommand) -> Result<Vec<u8>, ProtocolError> {
    let mut line = serde_json::to_vec(command)?;
    line.push(b'\n');
    Ok(line)
}

/// Streaming parser for the newline-delimited JSON bridge protocol.
///
/// Feed raw TCP bytes via `push_data`, then drain events via `next_event`.
pub struct ProtocolParser {
    buffer: VecDeque<u8>,
}

impl ProtocolParser {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(8192),
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Try to extract the next complete event from the buffer.
    /// Returns `None` if no complete line is available yet.
    pub fn next_event(&mut self) -> Option<Result<BridgeEvent, ProtocolError>> {
        loop {
            let newline = match self.buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => pos,
                None => {
                    if self.buffer.len() > MAX_LINE_LEN {
                        self.buffer.clear();
                        return Some(Err(ProtocolError::LineTooLong));
                    }
                    return None;
                }
            };

            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            return Some(parse_line(line));
        }
    }
}

impl Default for ProtocolParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &[u8]) -> Result<BridgeEvent, ProtocolError> {
    let wire: WireEvent = serde_json::from_slice(line)?;
    Ok(wire.into())
}
