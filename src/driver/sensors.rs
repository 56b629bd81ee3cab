use super::{ChargeDriver, ChargePhase};
use crate::store::StateValue;
use crate::vehicle::PortLatch;

impl ChargeDriver {
    /// Read every configured datapoint into controller state.
    ///
    /// A failed or empty read leaves the field at its previous value.
    pub(crate) async fn read_sensors(&mut self) {
        let keys = self.vehicle_keys.clone();

        if let Some(v) = self.read_number(&keys.battery_level).await {
            self.state.battery_soc = v;
        }
        if let Some(v) = self.read_number(&keys.charge_limit_soc).await {
            self.state.charge_limit_soc = v;
        }
        if let Some(v) = self.read_text(&keys.charging_state).await {
            self.state.charging_state = v;
        }
        if let Some(v) = self.read_text(&keys.charge_port_latch).await {
            self.state.port_latch = PortLatch::parse(&v);
        }
        if let Some(v) = self.read_bool(&keys.charge_port_door_open).await {
            self.state.port_door_open = v;
        }
        if let Some(v) = self.read_number(&keys.charger_actual_current).await {
            self.state.actual_current_a = v.max(0.0);
        }

        let export_key = self.config.keys.pv_export_power.clone();
        if let Some(v) = self.read_number(&export_key).await {
            self.state.pv_export_power_w = self.non_negative(&export_key, v);
        }
        let import_key = self.config.keys.grid_import_power.clone();
        if let Some(v) = self.read_number(&import_key).await {
            self.state.grid_import_power_w = self.non_negative(&import_key, v);
        }

        let reserve_key = self.config.keys.reserve_battery_soc.clone();
        if self.config.controls.reserve_battery_present
            && let Some(v) = self.read_number(&reserve_key).await
        {
            self.state.reserve_battery_soc = v;
        }

        let mode_key = self.local_keys.auto_mode.clone();
        if let Some(v) = self.read_bool(&mode_key).await {
            self.state.auto_mode_enabled = v;
        }

        if self.confirm_phase() {
            self.mirror_latches().await;
        }
    }

    pub(crate) fn evaluate_gates(&mut self) {
        let gates = self.controls.evaluate_gates(
            &self.state.port_latch,
            self.state.port_door_open,
            self.state.reserve_battery_soc,
        );
        if gates != self.state.gates {
            self.logger.info(&format!(
                "Gates changed: port_latch_ok={} reserve_battery_ok={}",
                gates.port_latch_ok, gates.reserve_battery_ok
            ));
        }
        self.state.gates = gates;
    }

    /// Advance Starting/Stopped once the actual current confirms the command.
    ///
    /// Returns whether `is_charging`/`is_stopped` changed.
    fn confirm_phase(&mut self) -> bool {
        let actual = self.state.actual_current_a;
        let controls = &self.config.controls;
        match self.state.phase {
            ChargePhase::Starting if actual >= controls.start_confirm_amps => {
                self.state.phase = ChargePhase::Charging;
                self.state.is_charging = true;
                self.state.is_stopped = false;
                self.logger
                    .info(&format!("Charging confirmed at {:.1} A", actual));
                true
            }
            ChargePhase::StopPending
                if self.state.resume_phase == Some(ChargePhase::Starting)
                    && actual >= controls.start_confirm_amps =>
            {
                self.state.resume_phase = Some(ChargePhase::Charging);
                self.state.is_charging = true;
                self.state.is_stopped = false;
                true
            }
            ChargePhase::Stopped if actual <= controls.stop_confirm_epsilon => {
                self.state.phase = ChargePhase::Idle;
                self.state.is_stopped = true;
                self.state.is_charging = false;
                self.logger
                    .info(&format!("Stop confirmed at {:.1} A", actual));
                true
            }
            _ => false,
        }
    }

    /// Warn once when the vehicle keeps drawing something other than the setpoint
    pub(crate) fn check_convergence(&mut self) {
        let controls = &self.config.controls;
        let target = match self.state.last_sent_amps {
            Some(amps) if self.state.phase == ChargePhase::Charging => amps,
            _ => {
                self.state.divergent_ticks = 0;
                self.state.convergence_warned = false;
                return;
            }
        };

        let gap = (self.state.actual_current_a - f64::from(target)).abs();
        if gap <= controls.current_tolerance {
            if self.state.convergence_warned {
                self.logger.info(&format!(
                    "Actual current converged to setpoint {} A",
                    target
                ));
            }
            self.state.divergent_ticks = 0;
            self.state.convergence_warned = false;
            return;
        }

        self.state.divergent_ticks = self.state.divergent_ticks.saturating_add(1);
        if controls.convergence_warn_ticks > 0
            && self.state.divergent_ticks >= controls.convergence_warn_ticks
            && !self.state.convergence_warned
        {
            self.state.convergence_warned = true;
            self.logger.warn(&format!(
                "Actual current {:.1} A has not followed setpoint {} A for {} ticks",
                self.state.actual_current_a, target, self.state.divergent_ticks
            ));
        }
    }

    async fn read_value(&mut self, key: &str) -> Option<StateValue> {
        match self.store.get(key).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                self.mark_stale(key, "no value");
                None
            }
            Err(e) => {
                self.mark_stale(key, &e.to_string());
                None
            }
        }
    }

    async fn read_number(&mut self, key: &str) -> Option<f64> {
        let value = self.read_value(key).await?;
        match value.as_f64() {
            Some(n) if n.is_finite() => {
                self.mark_fresh(key);
                Some(n)
            }
            _ => {
                self.mark_stale(key, &format!("expected a number, got {:?}", value));
                None
            }
        }
    }

    async fn read_bool(&mut self, key: &str) -> Option<bool> {
        let value = self.read_value(key).await?;
        match value.as_bool() {
            Some(b) => {
                self.mark_fresh(key);
                Some(b)
            }
            None => {
                self.mark_stale(key, &format!("expected a boolean, got {:?}", value));
                None
            }
        }
    }

    async fn read_text(&mut self, key: &str) -> Option<String> {
        let value = self.read_value(key).await?;
        self.mark_fresh(key);
        Some(value.to_string())
    }

    fn mark_stale(&mut self, key: &str, why: &str) {
        if self.stale_keys.insert(key.to_string()) {
            self.logger.warn(&format!(
                "Read of {} failed ({}); holding last known value",
                key, why
            ));
        } else {
            self.logger
                .debug(&format!("Read of {} still failing ({})", key, why));
        }
    }

    fn mark_fresh(&mut self, key: &str) {
        if self.stale_keys.remove(key) {
            self.logger.info(&format!("Read of {} recovered", key));
        }
    }

    fn non_negative(&self, key: &str, watts: f64) -> f64 {
        if watts < 0.0 {
            self.logger.warn(&format!(
                "Negative power {} W on {}; treating as 0",
                watts, key
            ));
            0.0
        } else {
            watts
        }
    }
}
