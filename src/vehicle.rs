//! Vehicle adapter datapoints for Helios
//!
//! The vehicle is never contacted directly. A telematics adapter on the host
//! mirrors its state into `charge_state.*` datapoints and turns writes to
//! `remote.*` datapoints into API calls; this module knows those key names.

use crate::store::StateValue;
use std::fmt;

/// Datapoint keys exposed by the vehicle adapter for one car
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleKeys {
    pub charge_start: String,
    pub charge_stop: String,
    pub set_charging_amps: String,
    pub battery_level: String,
    pub charge_limit_soc: String,
    pub charging_state: String,
    pub charge_port_latch: String,
    pub charge_port_door_open: String,
    pub charger_actual_current: String,
}

impl VehicleKeys {
    /// Build keys as `<adapter_instance>.<vin>.<path>`; an empty VIN is skipped
    pub fn new(adapter_instance: &str, vin: &str) -> Self {
        let root = [adapter_instance, vin]
            .iter()
            .map(|s| s.trim_matches('.'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        let key = |path: &str| format!("{}.{}", root, path);

        Self {
            charge_start: key("remote.charge_start"),
            charge_stop: key("remote.charge_stop"),
            set_charging_amps: key("remote.set_charging_amps-charging_amps"),
            battery_level: key("charge_state.battery_level"),
            charge_limit_soc: key("charge_state.charge_limit_soc"),
            charging_state: key("charge_state.charging_state"),
            charge_port_latch: key("charge_state.charge_port_latch"),
            charge_port_door_open: key("charge_state.charge_port_door_open"),
            charger_actual_current: key("charge_state.charger_actual_current"),
        }
    }
}

/// Datapoints owned by the controller itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalKeys {
    pub amps: String,
    pub start: String,
    pub stop: String,
    pub is_started: String,
    pub is_stopped: String,
    /// PV-only mode flag (`true`: charge from grid export only)
    pub auto_mode: String,
}

impl LocalKeys {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('.');
        let key = |name: &str| format!("{}.{}", prefix, name);
        Self {
            amps: key("Amps"),
            start: key("Start"),
            stop: key("Stop"),
            is_started: key("isStarted"),
            is_stopped: key("isStopped"),
            auto_mode: key("ChargeAllPV"),
        }
    }

    /// Keys created at startup with their seed values
    pub fn initial_states(&self, auto_mode_default: bool) -> Vec<(String, StateValue)> {
        vec![
            (self.amps.clone(), StateValue::from(0)),
            (self.start.clone(), StateValue::from(false)),
            (self.stop.clone(), StateValue::from(false)),
            (self.is_started.clone(), StateValue::from(false)),
            (self.is_stopped.clone(), StateValue::from(false)),
            (self.auto_mode.clone(), StateValue::from(auto_mode_default)),
        ]
    }
}

/// Charge port latch as reported by the adapter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PortLatch {
    Engaged,
    Disengaged,
    Blocking,
    #[default]
    Unknown,
    Other(String),
}

impl PortLatch {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Engaged" => Self::Engaged,
            "Disengaged" => Self::Disengaged,
            "Blocking" => Self::Blocking,
            "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Engaged)
    }
}

impl fmt::Display for PortLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engaged => f.write_str("Engaged"),
            Self::Disengaged => f.write_str("Disengaged"),
            Self::Blocking => f.write_str("Blocking"),
            Self::Unknown => f.write_str("Unknown"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_keys_follow_adapter_layout() {
        let keys = VehicleKeys::new("tesla-motors.0", "5YJ3E7EB0KF000000");
        assert_eq!(
            keys.set_charging_amps,
            "tesla-motors.0.5YJ3E7EB0KF000000.remote.set_charging_amps-charging_amps"
        );
        assert_eq!(
            keys.charge_port_latch,
            "tesla-motors.0.5YJ3E7EB0KF000000.charge_state.charge_port_latch"
        );
    }

    #[test]
    fn empty_vin_is_skipped() {
        let keys = VehicleKeys::new("tesla-motors.0", "");
        assert_eq!(keys.charge_start, "tesla-motors.0.remote.charge_start");
    }

    #[test]
    fn local_keys_and_seeds() {
        let keys = LocalKeys::new("javascript.0.Tesla.Charge.");
        assert_eq!(keys.auto_mode, "javascript.0.Tesla.Charge.ChargeAllPV");
        let seeds = keys.initial_states(false);
        assert_eq!(seeds.len(), 6);
        assert!(seeds.contains(&(keys.auto_mode.clone(), StateValue::Bool(false))));
        assert!(seeds.contains(&(keys.amps.clone(), StateValue::from(0))));
    }

    #[test]
    fn port_latch_parsing() {
        assert!(PortLatch::parse(" Engaged ").is_engaged());
        assert_eq!(PortLatch::parse("Disengaged"), PortLatch::Disengaged);
        assert_eq!(PortLatch::parse(""), PortLatch::Unknown);
        assert_eq!(
            PortLatch::parse("<invalid>"),
            PortLatch::Other("<invalid>".to_string())
        );
        assert_eq!(PortLatch::Blocking.to_string(), "Blocking");
    }
}
