//! Core driver logic for Helios
//!
//! [`ChargeDriver`] is a single tokio task that owns the [`ControllerState`].
//! The poll interval, grid-export change events, the stop debounce deadline,
//! external commands and shutdown all feed one `select!` loop, so every
//! mutation of controller state happens on this task.
//!
//! Two paths run the control loop:
//!
//! - tick: sensor snapshot, gate evaluation, setpoint push
//! - export change: start/stop actuation, sensor snapshot, amperage decision

use crate::config::Config;
use crate::controls::ChargingControls;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::store::StateStore;
use crate::vehicle::{LocalKeys, VehicleKeys};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

mod actuation;
mod commands;
mod runtime;
mod sensors;
mod snapshot;
mod timer;
mod types;

pub use types::{ChargePhase, ControllerState, DriverCommand, DriverSnapshot, DriverState};

use timer::StopTimer;

/// Main driver for Helios
pub struct ChargeDriver {
    config: Config,

    /// Host datapoint store
    store: Arc<dyn StateStore>,

    vehicle_keys: VehicleKeys,
    local_keys: LocalKeys,

    controls: ChargingControls,
    logger: StructuredLogger,

    state: ControllerState,
    stop_timer: StopTimer,

    /// Keys whose last read failed; their fields hold the previous value
    stale_keys: BTreeSet<String>,

    driver_state: watch::Sender<DriverState>,
    snapshot_tx: watch::Sender<Arc<DriverSnapshot>>,
    snapshot_rx: watch::Receiver<Arc<DriverSnapshot>>,

    commands_rx: mpsc::UnboundedReceiver<DriverCommand>,

    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,

    total_ticks: u64,
    total_events: u64,
}

impl ChargeDriver {
    /// Create a driver. Nothing is read or written until [`ChargeDriver::run`].
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        commands_rx: mpsc::UnboundedReceiver<DriverCommand>,
    ) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("driver")
                .with_vin(&config.vehicle.vin)
                .with_field("adapter", config.vehicle.adapter_instance.clone()),
        );
        let vehicle_keys =
            VehicleKeys::new(&config.vehicle.adapter_instance, &config.vehicle.vin);
        let local_keys = LocalKeys::new(&config.keys.local_prefix);
        let controls = ChargingControls::new(&config.controls);
        let state = ControllerState::new(config.auto_mode_default, config.controls.min_amps);

        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (driver_state, _) = watch::channel(DriverState::Initializing);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(DriverSnapshot::default()));

        let driver = Self {
            config,
            store,
            vehicle_keys,
            local_keys,
            controls,
            logger,
            state,
            stop_timer: StopTimer::default(),
            stale_keys: BTreeSet::new(),
            driver_state,
            snapshot_tx,
            snapshot_rx,
            commands_rx,
            shutdown_tx,
            shutdown_rx,
            total_ticks: 0,
            total_events: 0,
        };
        driver.publish_snapshot();
        driver
    }

    pub fn get_state(&self) -> DriverState {
        self.driver_state.borrow().clone()
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    /// Handle for stopping the driver from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller_state(&self) -> &ControllerState {
        &self.state
    }

    pub fn vehicle_keys(&self) -> &VehicleKeys {
        &self.vehicle_keys
    }

    pub fn local_keys(&self) -> &LocalKeys {
        &self.local_keys
    }
}
