use super::timer::sleep_until_deadline;
use super::{ChargeDriver, ChargePhase, DriverState};
use crate::controls::DecisionInputs;
use crate::error::Result;
use crate::store::StateChange;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};

impl ChargeDriver {
    /// Run the driver main loop until shutdown is requested
    pub async fn run(&mut self) -> Result<()> {
        self.config.validate()?;
        self.logger.info("Starting charge controller main loop");

        self.bootstrap().await;

        let export_key = self.config.keys.pv_export_power.clone();
        let mut export_rx = match self.store.watch(&export_key).await {
            Ok(rx) => Some(rx),
            Err(e) => {
                self.logger.error(&format!(
                    "Cannot watch {}: {}; amperage decisions are disabled",
                    export_key, e
                ));
                None
            }
        };

        self.driver_state.send(DriverState::Running).ok();
        self.publish_snapshot();

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_seconds));
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let stop_deadline = self.stop_timer.deadline();
            tokio::select! {
                _ = poll_interval.tick() => {
                    self.on_tick().await;
                }
                change = next_change(&mut export_rx) => {
                    match change {
                        Some(change) => self.on_export_changed(&change).await,
                        None => {
                            self.logger.error(&format!("Change stream for {} closed", export_key));
                            export_rx = None;
                        }
                    }
                }
                _ = sleep_until_deadline(stop_deadline) => {
                    self.fire_stop_timer().await;
                    self.publish_snapshot();
                }
                Some(cmd) = self.commands_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.driver_state.send(DriverState::ShuttingDown).ok();
        self.shutdown();
        Ok(())
    }

    /// Create local datapoints and adopt whatever the vehicle is doing right now
    pub(crate) async fn bootstrap(&mut self) {
        for (key, initial) in self.local_keys.initial_states(self.config.auto_mode_default) {
            match self.store.create(&key, initial).await {
                Ok(true) => self.logger.info(&format!("Created datapoint {}", key)),
                Ok(false) => {}
                Err(e) => self
                    .logger
                    .warn(&format!("Could not create datapoint {}: {}", key, e)),
            }
        }

        self.read_sensors().await;
        self.evaluate_gates();

        let controls = &self.config.controls;
        let actual = self.state.actual_current_a;
        if actual >= controls.start_confirm_amps {
            self.state.is_charging = true;
            self.state.phase = ChargePhase::Charging;
        } else if actual <= controls.stop_confirm_epsilon {
            self.state.is_stopped = true;
            self.state.phase = ChargePhase::Idle;
        }
        self.state.requested_amps = self
            .state
            .last_confirmed_amps()
            .min(controls.max_amps)
            .max(controls.min_amps);

        self.logger.info(&format!(
            "Initial state: phase={:?} actual={:.1} A auto_mode={} gates={:?}",
            self.state.phase, actual, self.state.auto_mode_enabled, self.state.gates
        ));
    }

    /// Periodic path: snapshot, gates, setpoint push
    pub(crate) async fn on_tick(&mut self) {
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.logger.trace("Tick");
        self.read_sensors().await;
        self.evaluate_gates();
        self.check_convergence();
        self.push_setpoint().await;
        self.publish_snapshot();
    }

    /// Event path: actuate the pending intent, then snapshot and decide
    pub(crate) async fn on_export_changed(&mut self, change: &StateChange) {
        self.total_events = self.total_events.saturating_add(1);
        self.logger
            .trace(&format!("{} changed to {:?}", change.key, change.value));
        self.actuate_intent().await;
        self.read_sensors().await;
        self.apply_decision().await;
        self.publish_snapshot();
    }

    async fn apply_decision(&mut self) {
        let inputs = DecisionInputs {
            auto_mode_enabled: self.state.auto_mode_enabled,
            reserve_battery_ok: self.state.gates.reserve_battery_ok,
            pv_export_power_w: self.state.pv_export_power_w,
            grid_import_power_w: self.state.grid_import_power_w,
            last_confirmed_amps: self.state.last_confirmed_amps(),
            previous_requested_amps: self.state.requested_amps,
        };
        let decision = self.controls.decide(&inputs);

        let previous = self.state.intent;
        self.state.requested_amps = decision.requested_amps;
        self.state.intent = decision.intent;
        self.state.last_decision = Some(decision);
        self.mirror_intent(previous).await;
    }

    fn shutdown(&mut self) {
        if self.stop_timer.cancel() {
            self.logger.warn("Shutting down with a stop pending; stop not sent");
        }
        self.logger.info("Charge controller stopped");
    }
}

async fn next_change(rx: &mut Option<mpsc::UnboundedReceiver<StateChange>>) -> Option<StateChange> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
