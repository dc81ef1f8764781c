use crate::protocol::BridgeCommand;
use crate::types::{AccelerationSample, Capabilities, Orientation, PermissionState};
use crate::{BridgeError, Cells};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Device orientation and motion readings from the bridge.
///
/// Readings are held in single-slot cells written by the bridge task and read
/// once per frame. Orientation reports `available = false` until the sensors
/// have been subscribed, which happens at most once per feed lifetime no
/// matter how many clones call [`SensorFeed::start`].
#[derive(Clone)]
pub struct SensorFeed {
    cells: Cells,
    command_tx: mpsc::UnboundedSender<BridgeCommand>,
    subscribed: Arc<AtomicBool>,
}

impl SensorFeed {
    pub(crate) fn new(
        cells: Cells,
        command_tx: mpsc::UnboundedSender<BridgeCommand>,
        subscribed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cells,
            command_tx,
            subscribed,
        }
    }

    /// Pass the permission gate (if the platform has one) and subscribe.
    ///
    /// Never retries on its own; after `PermissionDenied` the caller decides
    /// when to call [`SensorFeed::retry`].
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.is_subscribed() {
            tracing::debug!("Sensor feed already subscribed");
            return Ok(());
        }

        let caps = self.capabilities().await?;
        if !caps.orientation {
            tracing::warn!("Device orientation not supported, dead reckoning unavailable");
            return Err(BridgeError::UnsupportedPlatform);
        }
        if !caps.motion {
            tracing::info!("Device motion not supported, acceleration stays at zero");
        }

        if caps.permission_api {
            self.request_permission().await?;
            tracing::info!("Device orientation permission granted");
        }

        self.subscribe()
    }

    /// Manually re-run the permission gate after a denial.
    pub async fn retry(&self) -> Result<(), BridgeError> {
        tracing::info!("Manually requesting sensor permissions");
        self.start().await
    }

    /// Latest orientation; `available` only once subscribed.
    pub fn orientation(&self) -> Orientation {
        let mut orientation = *self.cells.orientation.borrow();
        orientation.available = self.is_subscribed();
        orientation
    }

    /// Latest acceleration sample.
    pub fn acceleration(&self) -> AccelerationSample {
        *self.cells.motion.borrow()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    async fn capabilities(&self) -> Result<Capabilities, BridgeError> {
        let mut rx = self.cells.capabilities.clone();
        let caps = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BridgeError::Closed)?;
        (*caps).ok_or(BridgeError::Closed)
    }

    async fn request_permission(&self) -> Result<(), BridgeError> {
        let mut rx = self.cells.permission.clone();
        rx.borrow_and_update();
        self.command_tx
            .send(BridgeCommand::RequestPermission)
            .map_err(|_| BridgeError::Closed)?;

        loop {
            rx.changed().await.map_err(|_| BridgeError::Closed)?;
            let state = *rx.borrow_and_update();
            match state {
                PermissionState::Granted => return Ok(()),
                PermissionState::Denied => {
                    tracing::warn!("Device orientation permission denied");
                    return Err(BridgeError::PermissionDenied);
                }
                PermissionState::Unknown => {}
            }
        }
    }

    fn subscribe(&self) -> Result<(), BridgeError> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.command_tx.send(BridgeCommand::SubscribeSensors).is_err() {
            self.subscribed.store(false, Ordering::Release);
            return Err(BridgeError::Closed);
        }
        tracing::info!("Device orientation enabled");
        Ok(())
    }
}
