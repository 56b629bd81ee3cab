use super::*;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            base_url: "http://127.0.0.1:8087".to_string(),
            watch_interval_ms: 1000,
            request_timeout_ms: 2000,
            max_retries: 3,
            retry_delay_ms: 250,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            adapter_instance: "tesla-motors.0".to_string(),
            vin: String::new(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            pv_export_power: "0_userdata.0.Energie.Energymeter.Wirkleistung.Einspeisung"
                .to_string(),
            grid_import_power: "0_userdata.0.Energie.Energymeter.Wirkleistung.Bezug".to_string(),
            reserve_battery_soc: "modbus.1.inputRegisters.30845_SOC".to_string(),
            local_prefix: "javascript.0.Tesla.Charge".to_string(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            reserve_battery_present: true,
            reserve_battery_soc_threshold: 80.0,
            increase_threshold_w: 800.0,
            decrease_threshold_w: 100.0,
            min_amps: 0,
            max_amps: 16,
            increase_step: 1,
            decrease_step: 1,
            max_manual_amps: 16,
            stop_delay_seconds: 10,
            command_retry_seconds: 30,
            start_confirm_amps: 1.0,
            stop_confirm_epsilon: 0.5,
            current_tolerance: 1.0,
            convergence_warn_ticks: 6,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/helios.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            vehicle: VehicleConfig::default(),
            keys: KeysConfig::default(),
            controls: ControlsConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            poll_interval_seconds: 10,
            auto_mode_default: true,
        }
    }
}
