use super::ChargeDriver;
use super::types::DriverSnapshot;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

impl ChargeDriver {
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<DriverSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub(super) fn build_snapshot(&self) -> DriverSnapshot {
        let s = &self.state;
        DriverSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            driver_state: self.driver_state.borrow().as_str().to_string(),
            phase: s.phase,
            auto_mode_enabled: s.auto_mode_enabled,
            intent: s.intent,
            requested_amps: s.requested_amps,
            last_sent_amps: s.last_sent_amps,
            actual_current_a: s.actual_current_a,
            pv_export_power_w: s.pv_export_power_w,
            grid_import_power_w: s.grid_import_power_w,
            reserve_battery_soc: self
                .config
                .controls
                .reserve_battery_present
                .then_some(s.reserve_battery_soc),
            battery_soc: s.battery_soc,
            charge_limit_soc: s.charge_limit_soc,
            charging_state: s.charging_state.clone(),
            port_latch: s.port_latch.to_string(),
            port_door_open: s.port_door_open,
            gates: s.gates,
            is_charging: s.is_charging,
            is_stopped: s.is_stopped,
            stop_pending_seconds: self
                .stop_timer
                .remaining(Instant::now())
                .map(|d| d.as_secs_f64()),
            last_decision: s.last_decision,
            stale_keys: self.stale_keys.iter().cloned().collect(),
            total_ticks: self.total_ticks,
            total_events: self.total_events,
        }
    }

    pub(super) fn publish_snapshot(&self) {
        // send_replace works with no receivers left
        self.snapshot_tx.send_replace(Arc::new(self.build_snapshot()));
    }
}
