mod session;

use anchorwalk_anchor::optical_anchor;
use anchorwalk_bridge::feed::SensorFeed;
use anchorwalk_bridge::protocol::{BridgeCommand, RetryReason};
use anchorwalk_bridge::types::RetryRequest;
use anchorwalk_bridge::{BridgeClient, BridgeError};
use anchorwalk_config::{AppConfig, SessionMode};
use anyhow::{Context, Result};
use session::{DebugSnapshot, FrameInputs, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Desktop application state.
struct App {
    config: AppConfig,
    session: Session,
    window: Option<Arc<Window>>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let session = Session::desktop(&config);
        Self {
            config,
            session,
            window: None,
        }
    }

    fn exit(&self, event_loop: &ActiveEventLoop) {
        // Save config on exit.
        if let Err(e) = anchorwalk_config::save_config(&self.config) {
            error!(?e, "Failed to save config");
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("AnchorWalk")
            .with_inner_size(PhysicalSize::new(1280, 720));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!(?e, "Failed to create window");
                event_loop.exit();
                return;
            }
        };

        window.request_redraw();
        self.window = Some(window);

        info!(world = self.config.world.size, "Desktop session initialized");
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.exit(event_loop),

            WindowEvent::Focused(false) => {
                // Key releases are not delivered while unfocused.
                if let Some(keys) = self.session.input_mut().keyboard_mut() {
                    keys.clear();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if code == KeyCode::Escape && event.state == ElementState::Pressed {
                    self.exit(event_loop);
                    return;
                }
                if let Some(keys) = self.session.input_mut().keyboard_mut() {
                    keys.on_key(code, event.state);
                }
            }

            WindowEvent::RedrawRequested => {
                let snapshot = self.session.tick(&FrameInputs::default());

                if let Some(window) = &self.window {
                    let interval = self.config.debug.interval_frames;
                    if interval > 0 && snapshot.frame % interval == 0 {
                        window.set_title(&desktop_title(&snapshot));
                        debug!(?snapshot, "Debug snapshot");
                    }
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

fn desktop_title(snapshot: &DebugSnapshot) -> String {
    format!(
        "AnchorWalk | x {:+.2} z {:+.2} | facing {:.0} deg",
        snapshot.character.x,
        snapshot.character.z,
        snapshot.facing.to_degrees()
    )
}

fn run_desktop(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

async fn run_ar(config: AppConfig) -> Result<()> {
    // Connect to the device bridge (fall back to mock if nothing is listening).
    let mut bridge = match BridgeClient::connect(&config.bridge.addr).await {
        Ok(client) => {
            info!("Device bridge connected");
            client
        }
        Err(e) => {
            warn!(?e, "Device bridge not available, using mock (no tracking, no sensors)");
            BridgeClient::mock()
        }
    };

    let tracker_inbox = bridge
        .take_tracker_inbox()
        .context("tracker inbox already taken")?;
    let mut joystick_rx = bridge
        .take_joystick_inbox()
        .context("joystick inbox already taken")?;
    let mut retry_rx = bridge
        .take_retry_inbox()
        .context("retry inbox already taken")?;
    let bridge = Arc::new(bridge);
    let feed = bridge.sensor_feed();

    report_sensor_start(&bridge, feed.start().await);
    start_tracker(&bridge, &feed, &mut retry_rx).await;

    // Drags made while startup was waiting are stale.
    while joystick_rx.try_recv().is_ok() {}

    let optical = optical_anchor(&config.tracker, tracker_inbox);
    let mut session = Session::ar(&config, optical);

    let period = Duration::from_secs_f64(1.0 / f64::from(config.bridge.frame_rate_hz.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let debug_interval = config.debug.interval_frames;

    info!(
        mode = ?session.mode(),
        hz = config.bridge.frame_rate_hz,
        backend = ?config.tracker.backend,
        mock = bridge.is_mock(),
        "AR frame loop running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                while let Ok(signal) = joystick_rx.try_recv() {
                    session.on_joystick(signal);
                }

                let inputs = FrameInputs {
                    orientation: feed.orientation(),
                    acceleration: feed.acceleration(),
                    camera_pose: bridge.camera_pose(),
                };
                let snapshot = session.tick(&inputs);

                let (position, rotation) = session.world_transform();
                bridge.send(BridgeCommand::set_world(position, rotation));
                let character = session.character();
                bridge.send(BridgeCommand::SetCharacter {
                    x: character.position.x,
                    z: character.position.z,
                    facing: character.facing,
                });
                if let Some(knob) = session.knob_offset() {
                    bridge.send(BridgeCommand::SetKnob { x: knob.x, y: knob.y });
                }

                if debug_interval > 0 && snapshot.frame % debug_interval == 0 {
                    debug!(?snapshot, "Debug snapshot");
                    match BridgeCommand::debug(&snapshot) {
                        Ok(command) => bridge.send(command),
                        Err(e) => warn!(?e, "Failed to encode debug snapshot"),
                    }
                }
            }

            Some(request) = retry_rx.recv() => match request {
                RetryRequest::Sensors => spawn_sensor_retry(bridge.clone(), feed.clone()),
                RetryRequest::Tracker => spawn_tracker_retry(bridge.clone()),
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Turn the outcome of a sensor start into log lines and, on denial, a retry prompt.
fn report_sensor_start(bridge: &BridgeClient, result: Result<(), BridgeError>) {
    match result {
        Ok(()) => {}
        Err(BridgeError::PermissionDenied) => bridge.send(BridgeCommand::PromptRetry {
            reason: RetryReason::Sensors,
            message: "Motion sensor access was denied. Tap to allow it.".into(),
        }),
        Err(BridgeError::UnsupportedPlatform) => {
            info!("Continuing without device orientation");
        }
        Err(e) => warn!(?e, "Sensor feed unavailable"),
    }
}

fn spawn_sensor_retry(bridge: Arc<BridgeClient>, feed: SensorFeed) {
    tokio::spawn(async move {
        let result = feed.retry().await;
        report_sensor_start(&bridge, result);
    });
}

fn spawn_tracker_retry(bridge: Arc<BridgeClient>) {
    tokio::spawn(async move {
        if let Err(e) = bridge.start_tracker().await {
            report_tracker_failure(&bridge, e);
        }
    });
}

/// Returns true when a retry prompt was shown and the user may try again.
fn report_tracker_failure(bridge: &BridgeClient, error: BridgeError) -> bool {
    match error {
        BridgeError::TrackerInitFailure(message) => {
            warn!(%message, "Failed to start tracker");
            bridge.send(BridgeCommand::PromptRetry {
                reason: RetryReason::Tracker,
                message: format!("Failed to start AR: {message}"),
            });
            true
        }
        e => {
            warn!(?e, "Tracker unavailable, world stays at its initial anchor");
            false
        }
    }
}

/// Start the optical tracker, prompting and waiting for the user after each failure.
async fn start_tracker(
    bridge: &Arc<BridgeClient>,
    feed: &SensorFeed,
    retry_rx: &mut mpsc::Receiver<RetryRequest>,
) {
    loop {
        let Err(e) = bridge.start_tracker().await else {
            return;
        };
        if !report_tracker_failure(bridge, e) {
            return;
        }

        loop {
            match retry_rx.recv().await {
                Some(RetryRequest::Tracker) => break,
                Some(RetryRequest::Sensors) => spawn_sensor_retry(bridge.clone(), feed.clone()),
                None => return,
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "anchorwalk=info,anchorwalk_bridge=info,anchorwalk_anchor=info".into()
            }),
        )
        .init();

    info!("AnchorWalk starting");

    // Load config.
    let config = anchorwalk_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    info!(mode = ?config.mode, world = config.world.size, "Config loaded");

    match config.mode {
        SessionMode::Desktop => run_desktop(config),
        SessionMode::Ar => run_ar(config).await,
    }
}
