//! Charging control algorithms for Helios
//!
//! Gate evaluation and the incremental (bang-bang) amperage decision. Both
//! are pure: they look at a snapshot of readings and return a verdict; the
//! driver owns state and performs any I/O.

use crate::config::ControlsConfig;
use crate::logging::{StructuredLogger, get_logger};
use crate::vehicle::PortLatch;
use serde::{Deserialize, Serialize};

/// What the decision wants the charge session to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeIntent {
    #[default]
    None,
    Start,
    Stop,
}

/// Which branch produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// PV-only mode is off
    ManualMode,
    /// Reserve battery below its threshold
    ReserveBattery,
    /// Export above the increase threshold
    Surplus,
    /// Import above the decrease threshold
    Deficit,
    /// Both thresholds crossed in the same cycle
    SurplusAndDeficit,
    /// Inside the hysteresis band
    Hold,
}

impl DecisionReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualMode => "manual_mode",
            Self::ReserveBattery => "reserve_battery",
            Self::Surplus => "surplus",
            Self::Deficit => "deficit",
            Self::SurplusAndDeficit => "surplus_and_deficit",
            Self::Hold => "hold",
        }
    }
}

/// Limit applied after stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clamp {
    Min,
    Max,
}

/// Derived go/no-go conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Gates {
    pub port_latch_ok: bool,
    pub reserve_battery_ok: bool,
}

/// Cable engaged and port door open
pub fn port_latch_ok(latch: &PortLatch, door_open: bool) -> bool {
    latch.is_engaged() && door_open
}

/// An absent reserve battery never blocks; a present one passes at or above `threshold`
pub fn reserve_battery_ok(present: bool, soc: f64, threshold: f64) -> bool {
    !present || soc >= threshold
}

/// Readings the amperage decision works from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionInputs {
    pub auto_mode_enabled: bool,
    pub reserve_battery_ok: bool,
    pub pv_export_power_w: f64,
    pub grid_import_power_w: f64,
    /// Current the vehicle reports it is actually drawing, in whole amps
    pub last_confirmed_amps: i32,
    /// Setpoint from the previous decision, kept inside the hysteresis band
    pub previous_requested_amps: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmpsDecision {
    pub requested_amps: i32,
    pub intent: ChargeIntent,
    pub reason: DecisionReason,
    pub clamp: Option<Clamp>,
}

/// Charging control system
#[derive(Debug, Clone)]
pub struct ChargingControls {
    config: ControlsConfig,
    logger: StructuredLogger,
}

impl ChargingControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            config: config.clone(),
            logger: get_logger("controls"),
        }
    }

    pub fn config(&self) -> &ControlsConfig {
        &self.config
    }

    pub fn evaluate_gates(&self, latch: &PortLatch, door_open: bool, reserve_soc: f64) -> Gates {
        let gates = Gates {
            port_latch_ok: port_latch_ok(latch, door_open),
            reserve_battery_ok: reserve_battery_ok(
                self.config.reserve_battery_present,
                reserve_soc,
                self.config.reserve_battery_soc_threshold,
            ),
        };
        self.logger.trace(&format!(
            "Gates: latch={} door_open={} reserve_soc={:.1} -> {:?}",
            latch, door_open, reserve_soc, gates
        ));
        gates
    }

    /// Compute the requested current and start/stop intent.
    ///
    /// Precedence: manual mode, then the reserve battery gate, then
    /// incremental stepping. Increase and decrease are evaluated
    /// independently and in that order, so crossing both thresholds nets
    /// `+increase_step - decrease_step` on the confirmed current.
    pub fn decide(&self, inputs: &DecisionInputs) -> AmpsDecision {
        let c = &self.config;

        if !inputs.auto_mode_enabled {
            return self.log_decision(AmpsDecision {
                requested_amps: c.max_manual_amps,
                intent: ChargeIntent::Start,
                reason: DecisionReason::ManualMode,
                clamp: None,
            });
        }

        if !inputs.reserve_battery_ok {
            return self.log_decision(AmpsDecision {
                requested_amps: c.min_amps,
                intent: ChargeIntent::Stop,
                reason: DecisionReason::ReserveBattery,
                clamp: None,
            });
        }

        let increase = inputs.pv_export_power_w > c.increase_threshold_w;
        let decrease = inputs.grid_import_power_w > c.decrease_threshold_w;

        let mut intent = ChargeIntent::None;
        let mut amps = if increase || decrease {
            inputs.last_confirmed_amps
        } else {
            inputs.previous_requested_amps
        };
        if increase {
            amps = amps.saturating_add(c.increase_step);
            intent = ChargeIntent::Start;
        }
        if decrease {
            amps = amps.saturating_sub(c.decrease_step);
        }

        let reason = match (increase, decrease) {
            (true, true) => DecisionReason::SurplusAndDeficit,
            (true, false) => DecisionReason::Surplus,
            (false, true) => DecisionReason::Deficit,
            (false, false) => DecisionReason::Hold,
        };

        let mut clamp = None;
        if amps <= c.min_amps {
            amps = c.min_amps;
            intent = ChargeIntent::Stop;
            clamp = Some(Clamp::Min);
        } else if amps > c.max_amps {
            amps = c.max_amps;
            clamp = Some(Clamp::Max);
        }

        self.log_decision(AmpsDecision {
            requested_amps: amps,
            intent,
            reason,
            clamp,
        })
    }

    fn log_decision(&self, decision: AmpsDecision) -> AmpsDecision {
        self.logger.debug(&format!(
            "Charging amps: {} (intent={:?}, reason={}, clamp={:?})",
            decision.requested_amps,
            decision.intent,
            decision.reason.as_str(),
            decision.clamp
        ));
        decision
    }
}
