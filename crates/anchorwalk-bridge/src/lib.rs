pub mod feed;
pub mod protocol;
pub mod types;

use anyhow::Result;
use feed::SensorFeed;
use protocol::{encode_command, BridgeCommand, BridgeEvent, ProtocolParser};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use types::{
    AccelerationSample, Capabilities, JoystickSignal, Orientation, PermissionState, Pose,
    RetryRequest, TrackerSignal, TrackerStatus,
};

/// Capacity of the per-frame inboxes (tracker and joystick signals).
///
/// Signals arriving at a full inbox are dropped; the bridge task never waits
/// on a consumer.
pub const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Sensor permission denied")]
    PermissionDenied,
    #[error("Tracker failed to start: {0}")]
    TrackerInitFailure(String),
    #[error("Platform has no orientation sensor")]
    UnsupportedPlatform,
    #[error("Bridge connection closed")]
    Closed,
}

/// Sending halves of the snapshot cells, owned by the bridge task.
struct CellSenders {
    capabilities: watch::Sender<Option<Capabilities>>,
    permission: watch::Sender<PermissionState>,
    orientation: watch::Sender<Orientation>,
    motion: watch::Sender<AccelerationSample>,
    tracker_status: watch::Sender<TrackerStatus>,
    camera_pose: watch::Sender<Option<Pose>>,
}

/// Receiving halves of the snapshot cells.
#[derive(Clone)]
pub(crate) struct Cells {
    pub(crate) capabilities: watch::Receiver<Option<Capabilities>>,
    pub(crate) permission: watch::Receiver<PermissionState>,
    pub(crate) orientation: watch::Receiver<Orientation>,
    pub(crate) motion: watch::Receiver<AccelerationSample>,
    pub(crate) tracker_status: watch::Receiver<TrackerStatus>,
    pub(crate) camera_pose: watch::Receiver<Option<Pose>>,
}

fn cells(initial_capabilities: Option<Capabilities>) -> (CellSenders, Cells) {
    let (capabilities_tx, capabilities_rx) = watch::channel(initial_capabilities);
    let (permission_tx, permission_rx) = watch::channel(PermissionState::default());
    let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
    let (motion_tx, motion_rx) = watch::channel(AccelerationSample::default());
    let (status_tx, status_rx) = watch::channel(TrackerStatus::default());
    let (camera_tx, camera_rx) = watch::channel(None);
    (
        CellSenders {
            capabilities: capabilities_tx,
            permission: permission_tx,
            orientation: orientation_tx,
            motion: motion_tx,
            tracker_status: status_tx,
            camera_pose: camera_tx,
        },
        Cells {
            capabilities: capabilities_rx,
            permission: permission_rx,
            orientation: orientation_rx,
            motion: motion_rx,
            tracker_status: status_rx,
            camera_pose: camera_rx,
        },
    )
}

/// Sending halves of the inboxes, owned by the bridge task.
struct InboxSenders {
    tracker: mpsc::Sender<TrackerSignal>,
    joystick: mpsc::Sender<JoystickSignal>,
    retry: mpsc::Sender<RetryRequest>,
}

/// Client for the device bridge.
///
/// Connects to the bridge over TCP, parses the newline-delimited event stream,
/// and publishes the latest sensor readings. Tracker and joystick signals are
/// queued in bounded inboxes that the frame loop drains.
pub struct BridgeClient {
    cells: Cells,
    command_tx: mpsc::UnboundedSender<BridgeCommand>,
    tracker_rx: Option<mpsc::Receiver<TrackerSignal>>,
    joystick_rx: Option<mpsc::Receiver<JoystickSignal>>,
    retry_rx: Option<mpsc::Receiver<RetryRequest>>,
    subscribed: Arc<AtomicBool>,
    mock: bool,
    _task: tokio::task::JoinHandle<()>,
}

impl BridgeClient {
    /// Connect to the device bridge and start processing.
    pub async fn connect(addr: &str) -> Result<Self> {
        tracing::info!(%addr, "Connecting to device bridge");

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::info!("Connected to device bridge");

        let (senders, cells) = cells(None);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (tracker_tx, tracker_rx) = mpsc::channel(INBOX_CAPACITY);
        let (joystick_tx, joystick_rx) = mpsc::channel(INBOX_CAPACITY);
        let (retry_tx, retry_rx) = mpsc::channel(INBOX_CAPACITY);

        let task = tokio::spawn(bridge_loop(
            stream,
            senders,
            InboxSenders {
                tracker: tracker_tx,
                joystick: joystick_tx,
                retry: retry_tx,
            },
            command_rx,
        ));

        Ok(Self {
            cells,
            command_tx,
            tracker_rx: Some(tracker_rx),
            joystick_rx: Some(joystick_rx),
            retry_rx: Some(retry_rx),
            subscribed: Arc::new(AtomicBool::new(false)),
            mock: false,
            _task: task,
        })
    }

    /// Create a mock client for running without a device bridge.
    ///
    /// Reports no sensor capabilities and never delivers tracker signals.
    pub fn mock() -> Self {
        let (senders, cells) = cells(Some(Capabilities::default()));
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (tracker_tx, tracker_rx) = mpsc::channel(INBOX_CAPACITY);
        let (joystick_tx, joystick_rx) = mpsc::channel(INBOX_CAPACITY);
        let (retry_tx, retry_rx) = mpsc::channel(INBOX_CAPACITY);
        let task = tokio::spawn(async move {
            // Keep the senders alive and swallow commands.
            let _cells = senders;
            let _inboxes = (tracker_tx, joystick_tx, retry_tx);
            while let Some(command) = command_rx.recv().await {
                tracing::trace!(?command, "Mock bridge dropped command");
            }
        });
        Self {
            cells,
            command_tx,
            tracker_rx: Some(tracker_rx),
            joystick_rx: Some(joystick_rx),
            retry_rx: Some(retry_rx),
            subscribed: Arc::new(AtomicBool::new(false)),
            mock: true,
            _task: task,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// Sensor feed sharing this client's cells and subscription guard.
    pub fn sensor_feed(&self) -> SensorFeed {
        SensorFeed::new(
            self.cells.clone(),
            self.command_tx.clone(),
            self.subscribed.clone(),
        )
    }

    /// Take the tracker signal inbox. Returns `None` after the first call.
    pub fn take_tracker_inbox(&mut self) -> Option<mpsc::Receiver<TrackerSignal>> {
        self.tracker_rx.take()
    }

    /// Take the joystick signal inbox. Returns `None` after the first call.
    pub fn take_joystick_inbox(&mut self) -> Option<mpsc::Receiver<JoystickSignal>> {
        self.joystick_rx.take()
    }

    /// Take the retry request inbox. Returns `None` after the first call.
    pub fn take_retry_inbox(&mut self) -> Option<mpsc::Receiver<RetryRequest>> {
        self.retry_rx.take()
    }

    /// Latest AR camera pose reported by the external renderer.
    pub fn camera_pose(&self) -> Option<Pose> {
        *self.cells.camera_pose.borrow()
    }

    /// Queue a command for the bridge (fire-and-forget).
    pub fn send(&self, command: BridgeCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::trace!("Bridge task gone, command dropped");
        }
    }

    /// Ask the bridge to start the optical tracker and wait for the outcome.
    pub async fn start_tracker(&self) -> Result<(), BridgeError> {
        if self.mock {
            return Err(BridgeError::UnsupportedPlatform);
        }

        let mut status = self.cells.tracker_status.clone();
        status.borrow_and_update();
        self.command_tx
            .send(BridgeCommand::StartTracker)
            .map_err(|_| BridgeError::Closed)?;

        loop {
            status.changed().await.map_err(|_| BridgeError::Closed)?;
            let current = status.borrow_and_update().clone();
            match current {
                TrackerStatus::Started => {
                    tracing::info!("Tracker started");
                    return Ok(());
                }
                TrackerStatus::Failed(message) => {
                    return Err(BridgeError::TrackerInitFailure(message));
                }
                TrackerStatus::Idle | TrackerStatus::Starting => {}
            }
        }
    }
}

/// Background task: read the TCP stream, parse events, publish them; write commands.
async fn bridge_loop(
    stream: TcpStream,
    cells: CellSenders,
    inboxes: InboxSenders,
    mut command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut parser = ProtocolParser::new();
    let mut buf = [0u8; 4096];
    let mut event_count: u64 = 0;

    loop {
        tokio::select! {
            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        tracing::warn!("Device bridge connection closed");
                        break;
                    }
                    Ok(n) => {
                        parser.push_data(&buf[..n]);

                        // Drain all complete events.
                        while let Some(result) = parser.next_event() {
                            match result {
                                Ok(event) => {
                                    dispatch(event, &cells, &inboxes);
                                    event_count += 1;
                                    if event_count % 1000 == 0 {
                                        tracing::debug!(event_count, "Bridge events processed");
                                    }
                                }
                                Err(e) => {
                                    tracing::trace!(?e, "Skipping bridge line");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(?e, "Device bridge read error");
                        break;
                    }
                }
            }
            Some(command) = command_rx.recv() => {
                if matches!(command, BridgeCommand::StartTracker) {
                    cells.tracker_status.send_replace(TrackerStatus::Starting);
                }
                match encode_command(&command) {
                    Ok(line) => {
                        if let Err(e) = writer.write_all(&line).await {
                            tracing::error!(?e, "Device bridge write error");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(?e, "Failed to encode bridge command"),
                }
            }
        }
    }
}

/// Queue a signal without waiting.
fn offer<T: std::fmt::Debug>(inbox: &mpsc::Sender<T>, name: &'static str, signal: T) {
    match inbox.try_send(signal) {
        Ok(()) => {}
        Err(TrySendError::Full(signal)) => {
            tracing::debug!(inbox = name, ?signal, "Inbox full, signal dropped");
        }
        Err(TrySendError::Closed(_)) => tracing::trace!(inbox = name, "Inbox closed"),
    }
}

fn dispatch(event: BridgeEvent, cells: &CellSenders, inboxes: &InboxSenders) {
    match event {
        BridgeEvent::Capabilities(caps) => {
            tracing::info!(
                orientation = caps.orientation,
                motion = caps.motion,
                permission_api = caps.permission_api,
                "Bridge capabilities"
            );
            cells.capabilities.send_replace(Some(caps));
        }
        BridgeEvent::Permission { granted } => {
            let state = if granted {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            cells.permission.send_replace(state);
        }
        BridgeEvent::Orientation(orientation) => {
            cells.orientation.send_replace(orientation);
        }
        BridgeEvent::Motion(sample) => {
            cells.motion.send_replace(sample);
        }
        BridgeEvent::Tracker(signal) => offer(&inboxes.tracker, "tracker", signal),
        BridgeEvent::TrackerStarted => {
            cells.tracker_status.send_replace(TrackerStatus::Started);
        }
        BridgeEvent::TrackerFailed(message) => {
            tracing::warn!(%message, "Tracker reported start failure");
            cells
                .tracker_status
                .send_replace(TrackerStatus::Failed(message));
        }
        BridgeEvent::CameraPose(pose) => {
            if pose.is_finite() {
                cells.camera_pose.send_replace(Some(pose));
            } else {
                tracing::trace!(?pose, "Skipping non-finite camera pose");
            }
        }
        BridgeEvent::Joystick(signal) => offer(&inboxes.joystick, "joystick", signal),
        BridgeEvent::Retry(request) => offer(&inboxes.retry, "retry", request),
    }
}
