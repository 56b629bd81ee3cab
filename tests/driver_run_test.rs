use helios::config::Config;
use helios::driver::{ChargeDriver, ChargePhase, DriverCommand};
use helios::store::{MemoryStateStore, StateStore, StateValue};
use helios::vehicle::VehicleKeys;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> Config {
    let mut config = Config::default();
    config.vehicle.vin = "LRW3E7FS2NC000000".to_string();
    config.controls.reserve_battery_present = true;
    config.controls.reserve_battery_soc_threshold = 95.0;
    config.controls.increase_threshold_w = 700.0;
    config.controls.decrease_threshold_w = 0.0;
    config
}

async fn seed(store: &MemoryStateStore, config: &Config, actual: f64) -> VehicleKeys {
    let keys = VehicleKeys::new(&config.vehicle.adapter_instance, &config.vehicle.vin);
    let values = [
        (keys.battery_level.as_str(), StateValue::from(40.0)),
        (keys.charge_limit_soc.as_str(), StateValue::from(90.0)),
        (keys.charging_state.as_str(), StateValue::from("Charging")),
        (keys.charge_port_latch.as_str(), StateValue::from("Engaged")),
        (keys.charge_port_door_open.as_str(), StateValue::from(true)),
        (keys.charger_actual_current.as_str(), StateValue::from(actual)),
        (config.keys.pv_export_power.as_str(), StateValue::from(0.0)),
        (config.keys.grid_import_power.as_str(), StateValue::from(0.0)),
        (config.keys.reserve_battery_soc.as_str(), StateValue::from(99.0)),
    ];
    for (key, value) in values {
        store.set(key, value).await.unwrap();
    }
    keys
}

#[tokio::test(start_paused = true)]
async fn reserve_drop_stops_charging_after_debounce() {
    let config = config();
    let store = MemoryStateStore::new();
    let keys = seed(&store, &config, 10.0).await;

    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let mut driver = ChargeDriver::new(config.clone(), Arc::new(store.clone()), cmd_rx);
    let shutdown = driver.shutdown_handle();
    let snapshots = driver.subscribe_snapshot();
    let task = tokio::spawn(async move { driver.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(snapshots.borrow().phase, ChargePhase::Charging);

    // Reserve battery falls below threshold; the tick picks up the gate
    store
        .set(&config.keys.reserve_battery_soc, 50.0.into())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!snapshots.borrow().gates.reserve_battery_ok);

    // Two export updates: decide stop, then arm the debounce
    store.set(&config.keys.pv_export_power, 4000.0.into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.set(&config.keys.pv_export_power, 4100.0.into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(snapshots.borrow().phase, ChargePhase::StopPending);
    assert_eq!(store.write_count(&keys.charge_stop), 0);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(store.writes(&keys.charge_stop), vec![StateValue::Bool(true)]);
    assert_eq!(snapshots.borrow().phase, ChargePhase::Stopped);

    shutdown.send(()).unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn manual_mode_via_command_charges_at_full_current() {
    let config = config();
    let store = MemoryStateStore::new();
    let keys = seed(&store, &config, 0.0).await;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let mut driver = ChargeDriver::new(config.clone(), Arc::new(store.clone()), cmd_rx);
    let shutdown = driver.shutdown_handle();
    let task = tokio::spawn(async move { driver.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    cmd_tx
        .send(DriverCommand::SetAutoMode {
            enabled: false,
            reply: Some(reply_tx),
        })
        .unwrap();
    assert!(reply_rx.await.unwrap().is_ok());
    tokio::time::sleep(Duration::from_millis(50)).await;

    store.set(&config.keys.pv_export_power, 0.0.into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.set(&config.keys.pv_export_power, 0.0.into()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(store.write_count(&keys.charge_start), 1);
    assert_eq!(
        store.writes(&keys.set_charging_amps).last(),
        Some(&StateValue::from(16))
    );

    shutdown.send(()).unwrap();
    assert!(task.await.unwrap().is_ok());
}
