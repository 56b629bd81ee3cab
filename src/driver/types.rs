use crate::controls::{AmpsDecision, ChargeIntent, Gates};
use crate::error::Result;
use crate::vehicle::PortLatch;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Main driver state
#[derive(Debug, Clone, PartialEq)]
pub enum DriverState {
    /// Driver is initializing
    Initializing,
    /// Driver is running normally
    Running,
    /// Driver is shutting down
    ShuttingDown,
}

impl DriverState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
        }
    }
}

/// Commands accepted by the driver from external components (web, etc.)
#[derive(Debug)]
pub enum DriverCommand {
    /// Enable (`true`) or disable PV-only charging
    SetAutoMode {
        enabled: bool,
        /// Receives the outcome of persisting the mode flag
        reply: Option<oneshot::Sender<Result<()>>>,
    },
}

/// Charge session lifecycle as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargePhase {
    #[default]
    Idle,
    /// Start sent, waiting for current to flow
    Starting,
    Charging,
    /// Stop debounce timer armed
    StopPending,
    /// Stop sent, waiting for current to fall away
    Stopped,
}

/// Live readings plus everything derived from them.
///
/// Owned exclusively by the driver task; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub battery_soc: f64,
    pub charge_limit_soc: f64,
    pub charging_state: String,
    pub port_latch: PortLatch,
    pub port_door_open: bool,
    pub pv_export_power_w: f64,
    pub grid_import_power_w: f64,
    pub reserve_battery_soc: f64,
    pub auto_mode_enabled: bool,
    pub actual_current_a: f64,

    pub requested_amps: i32,
    /// `None` until the first successful push
    pub last_sent_amps: Option<i32>,
    pub gates: Gates,
    pub intent: ChargeIntent,
    pub last_decision: Option<AmpsDecision>,

    /// Latched once the actual current confirms a start
    pub is_charging: bool,
    /// Latched once the actual current confirms a stop; cleared by the next start
    pub is_stopped: bool,
    pub phase: ChargePhase,
    /// When the last start or stop command went out
    pub last_command_at: Option<Instant>,
    /// Phase to return to if a pending stop is cancelled
    pub resume_phase: Option<ChargePhase>,

    /// Consecutive ticks with actual current away from the pushed setpoint
    pub divergent_ticks: u32,
    pub convergence_warned: bool,
}

impl ControllerState {
    pub fn new(auto_mode_enabled: bool, min_amps: i32) -> Self {
        Self {
            battery_soc: 0.0,
            charge_limit_soc: 0.0,
            charging_state: String::new(),
            port_latch: PortLatch::Unknown,
            port_door_open: false,
            pv_export_power_w: 0.0,
            grid_import_power_w: 0.0,
            reserve_battery_soc: 0.0,
            auto_mode_enabled,
            actual_current_a: 0.0,
            requested_amps: min_amps,
            last_sent_amps: None,
            gates: Gates::default(),
            intent: ChargeIntent::None,
            last_decision: None,
            is_charging: false,
            is_stopped: false,
            phase: ChargePhase::Idle,
            last_command_at: None,
            resume_phase: None,
            divergent_ticks: 0,
            convergence_warned: false,
        }
    }

    /// Actual current rounded to whole amps, the base for stepping
    pub fn last_confirmed_amps(&self) -> i32 {
        self.actual_current_a.round() as i32
    }
}

/// Read-only view of the controller published after every cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverSnapshot {
    pub timestamp: String,
    pub driver_state: String,
    pub phase: ChargePhase,
    pub auto_mode_enabled: bool,
    pub intent: ChargeIntent,
    pub requested_amps: i32,
    pub last_sent_amps: Option<i32>,
    pub actual_current_a: f64,
    pub pv_export_power_w: f64,
    pub grid_import_power_w: f64,
    /// Only reported when a reserve battery is configured
    pub reserve_battery_soc: Option<f64>,
    pub battery_soc: f64,
    pub charge_limit_soc: f64,
    pub charging_state: String,
    pub port_latch: String,
    pub port_door_open: bool,
    pub gates: Gates,
    pub is_charging: bool,
    pub is_stopped: bool,
    /// Seconds until a pending stop is sent
    pub stop_pending_seconds: Option<f64>,
    pub last_decision: Option<AmpsDecision>,
    /// Datapoints currently holding a last-known value
    pub stale_keys: Vec<String>,
    pub total_ticks: u64,
    pub total_events: u64,
}
