use super::{ChargeDriver, ChargePhase};
use crate::controls::ChargeIntent;
use crate::store::StateValue;
use tokio::time::{Duration, Instant};

impl ChargeDriver {
    /// Act on the intent left by the previous decision
    pub(crate) async fn actuate_intent(&mut self) {
        match self.state.intent {
            ChargeIntent::Start => self.actuate_start().await,
            ChargeIntent::Stop => self.actuate_stop().await,
            ChargeIntent::None => {}
        }
    }

    async fn actuate_start(&mut self) {
        if self.state.phase == ChargePhase::StopPending {
            self.stop_timer.cancel();
            let resume = self.state.resume_phase.take().unwrap_or(ChargePhase::Idle);
            self.state.phase = resume;
            self.logger
                .info(&format!("Pending stop cancelled, back to {:?}", resume));
        }

        let resend = match self.state.phase {
            ChargePhase::Charging => return,
            ChargePhase::Starting if !self.command_retry_due() => return,
            ChargePhase::Starting => true,
            _ => false,
        };

        if !self.state.gates.port_latch_ok {
            self.logger.debug(&format!(
                "Start held: port latch {} door_open={}",
                self.state.port_latch, self.state.port_door_open
            ));
            return;
        }

        let key = self.vehicle_keys.charge_start.clone();
        if !self.write_command(&key, StateValue::from(true)).await {
            return;
        }
        self.state.is_stopped = false;
        self.state.phase = ChargePhase::Starting;
        self.state.last_command_at = Some(Instant::now());
        if resend {
            self.logger.warn(&format!(
                "Start not confirmed (actual {:.1} A), charge start re-sent",
                self.state.actual_current_a
            ));
        } else {
            self.logger.info(&format!(
                "Charge start sent (requested {} A)",
                self.state.requested_amps
            ));
        }
        self.mirror_latches().await;
    }

    async fn actuate_stop(&mut self) {
        match self.state.phase {
            ChargePhase::StopPending => {}
            ChargePhase::Idle if self.state.is_stopped => {}
            ChargePhase::Stopped => {
                if self.command_retry_due() {
                    self.logger.warn(&format!(
                        "Stop not confirmed (actual {:.1} A), re-sending",
                        self.state.actual_current_a
                    ));
                    self.send_stop().await;
                }
            }
            _ => {
                let delay = Duration::from_secs(self.config.controls.stop_delay_seconds);
                self.stop_timer.arm(delay);
                self.state.resume_phase = Some(self.state.phase);
                self.state.phase = ChargePhase::StopPending;
                self.logger.info(&format!(
                    "Stop requested, sending in {:?} unless cancelled",
                    delay
                ));
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn fire_stop_timer_if_due(&mut self) {
        if self.stop_timer.is_due(Instant::now()) {
            self.fire_stop_timer().await;
        }
    }

    /// Debounce elapsed: send the stop command
    pub(crate) async fn fire_stop_timer(&mut self) {
        if !self.stop_timer.cancel() {
            return;
        }
        let resume = self.state.resume_phase.take();
        if !self.send_stop().await {
            // Leave the stop unsent so the next stop intent arms again
            self.state.phase = resume.unwrap_or(ChargePhase::Idle);
        }
    }

    async fn send_stop(&mut self) -> bool {
        let key = self.vehicle_keys.charge_stop.clone();
        if !self.write_command(&key, StateValue::from(true)).await {
            return false;
        }
        self.state.phase = ChargePhase::Stopped;
        self.state.last_command_at = Some(Instant::now());
        self.logger.info("Charge stop sent");
        true
    }

    /// An unconfirmed start or stop may go out again once this returns true
    fn command_retry_due(&self) -> bool {
        let retry = Duration::from_secs(self.config.controls.command_retry_seconds);
        self.state
            .last_command_at
            .is_none_or(|sent| sent.elapsed() >= retry)
    }

    /// Push the requested current if it differs from what was last sent
    pub(crate) async fn push_setpoint(&mut self) {
        let amps = self.state.requested_amps;
        if self.state.last_sent_amps == Some(amps) {
            return;
        }

        let key = self.vehicle_keys.set_charging_amps.clone();
        let write_res = self.store.set(&key, StateValue::from(amps)).await;
        let mirror_key = self.local_keys.amps.clone();
        self.write_mirror(&mirror_key, StateValue::from(amps)).await;

        match write_res {
            Ok(()) => {
                self.logger.info(&format!(
                    "Setpoint {} A sent (previous {:?})",
                    amps, self.state.last_sent_amps
                ));
                self.state.last_sent_amps = Some(amps);
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to send setpoint {} A: {}", amps, e));
            }
        }
    }

    /// Reflect a new intent in the local Start/Stop datapoints
    pub(crate) async fn mirror_intent(&mut self, previous: ChargeIntent) {
        let intent = self.state.intent;
        if intent == previous {
            return;
        }
        let start = self.local_keys.start.clone();
        let stop = self.local_keys.stop.clone();
        self.write_mirror(&start, StateValue::from(intent == ChargeIntent::Start))
            .await;
        self.write_mirror(&stop, StateValue::from(intent == ChargeIntent::Stop))
            .await;
    }

    pub(super) async fn mirror_latches(&mut self) {
        let started = self.local_keys.is_started.clone();
        let stopped = self.local_keys.is_stopped.clone();
        self.write_mirror(&started, StateValue::from(self.state.is_charging))
            .await;
        self.write_mirror(&stopped, StateValue::from(self.state.is_stopped))
            .await;
    }

    /// Fire-and-forget command write; failures are logged and reported as `false`
    async fn write_command(&self, key: &str, value: StateValue) -> bool {
        match self.store.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to write command {}: {}", key, e));
                false
            }
        }
    }

    async fn write_mirror(&self, key: &str, value: StateValue) {
        if let Err(e) = self.store.set(key, value).await {
            self.logger
                .warn(&format!("Failed to update {}: {}", key, e));
        }
    }
}
