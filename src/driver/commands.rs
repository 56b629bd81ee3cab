use super::{ChargeDriver, DriverCommand};
use crate::error::Result;
use crate::store::StateValue;

impl ChargeDriver {
    pub(crate) async fn handle_command(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::SetAutoMode { enabled, reply } => {
                let result = self.set_auto_mode(enabled).await;
                if let Some(reply) = reply {
                    reply.send(result).ok();
                }
            }
        }
        self.publish_snapshot();
    }

    /// Switch PV-only mode; takes effect on the next amperage decision.
    ///
    /// The mode flag datapoint is the source of truth, so nothing changes
    /// unless it was written.
    pub async fn set_auto_mode(&mut self, enabled: bool) -> Result<()> {
        let key = self.local_keys.auto_mode.clone();
        if let Err(e) = self.store.set(&key, StateValue::from(enabled)).await {
            self.logger
                .warn(&format!("Failed to persist mode flag {}: {}", key, e));
            return Err(e);
        }
        if self.state.auto_mode_enabled != enabled {
            self.logger.info(&format!(
                "Mode changed to {}",
                if enabled { "PV-only" } else { "manual" }
            ));
        }
        self.state.auto_mode_enabled = enabled;
        Ok(())
    }
}
