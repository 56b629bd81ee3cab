use helios::config::ControlsConfig;
use helios::controls::{
    ChargeIntent, ChargingControls, Clamp, DecisionInputs, DecisionReason, reserve_battery_ok,
};
use helios::vehicle::PortLatch;

fn scenario_config() -> ControlsConfig {
    ControlsConfig {
        increase_threshold_w: 700.0,
        decrease_threshold_w: 0.0,
        min_amps: 0,
        max_amps: 16,
        increase_step: 1,
        decrease_step: 1,
        max_manual_amps: 16,
        ..ControlsConfig::default()
    }
}

fn auto_inputs(export_w: f64, import_w: f64, confirmed: i32) -> DecisionInputs {
    DecisionInputs {
        auto_mode_enabled: true,
        reserve_battery_ok: true,
        pv_export_power_w: export_w,
        grid_import_power_w: import_w,
        last_confirmed_amps: confirmed,
        previous_requested_amps: confirmed,
    }
}

#[test]
fn surplus_scenario_steps_up_and_starts() {
    let controls = ChargingControls::new(&scenario_config());
    let d = controls.decide(&auto_inputs(900.0, 0.0, 5));
    assert_eq!(d.requested_amps, 6);
    assert_eq!(d.intent, ChargeIntent::Start);
    assert_eq!(d.reason, DecisionReason::Surplus);
    assert_eq!(d.clamp, None);
}

#[test]
fn manual_mode_ignores_readings() {
    let controls = ChargingControls::new(&scenario_config());
    for (export, import) in [(0.0, 0.0), (5000.0, 0.0), (0.0, 9000.0)] {
        let d = controls.decide(&DecisionInputs {
            auto_mode_enabled: false,
            reserve_battery_ok: false,
            ..auto_inputs(export, import, 3)
        });
        assert_eq!(d.requested_amps, 16);
        assert_eq!(d.intent, ChargeIntent::Start);
        assert_eq!(d.reason, DecisionReason::ManualMode);
    }
}

#[test]
fn reserve_gate_stops_despite_surplus() {
    let config = ControlsConfig {
        reserve_battery_present: true,
        reserve_battery_soc_threshold: 95.0,
        ..scenario_config()
    };
    let controls = ChargingControls::new(&config);
    let gates = controls.evaluate_gates(&PortLatch::Engaged, true, 50.0);
    assert!(!gates.reserve_battery_ok);

    let d = controls.decide(&DecisionInputs {
        reserve_battery_ok: gates.reserve_battery_ok,
        ..auto_inputs(6000.0, 0.0, 10)
    });
    assert_eq!(d.requested_amps, 0);
    assert_eq!(d.intent, ChargeIntent::Stop);
    assert_eq!(d.reason, DecisionReason::ReserveBattery);
}

#[test]
fn reserve_threshold_is_inclusive() {
    assert!(reserve_battery_ok(true, 95.0, 95.0));
    assert!(!reserve_battery_ok(true, 94.99, 95.0));
    assert!(reserve_battery_ok(false, 0.0, 95.0));
}

#[test]
fn surplus_and_deficit_net_out_on_confirmed_current() {
    let config = ControlsConfig {
        increase_step: 3,
        decrease_step: 1,
        ..scenario_config()
    };
    let controls = ChargingControls::new(&config);
    let d = controls.decide(&DecisionInputs {
        previous_requested_amps: 12,
        ..auto_inputs(900.0, 50.0, 7)
    });
    assert_eq!(d.requested_amps, 9);
    assert_eq!(d.intent, ChargeIntent::Start);
    assert_eq!(d.reason, DecisionReason::SurplusAndDeficit);
}

#[test]
fn deficit_to_minimum_flips_to_stop() {
    let controls = ChargingControls::new(&scenario_config());
    let d = controls.decide(&auto_inputs(0.0, 400.0, 1));
    assert_eq!(d.requested_amps, 0);
    assert_eq!(d.intent, ChargeIntent::Stop);
    assert_eq!(d.clamp, Some(Clamp::Min));
}

#[test]
fn increase_past_maximum_is_clamped_without_intent_change() {
    let controls = ChargingControls::new(&scenario_config());
    let d = controls.decide(&auto_inputs(3000.0, 0.0, 16));
    assert_eq!(d.requested_amps, 16);
    assert_eq!(d.intent, ChargeIntent::Start);
    assert_eq!(d.clamp, Some(Clamp::Max));

    let d = controls.decide(&DecisionInputs {
        previous_requested_amps: 40,
        ..auto_inputs(0.0, 0.0, 40)
    });
    assert_eq!(d.requested_amps, 16);
    assert_eq!(d.intent, ChargeIntent::None);
}

#[test]
fn requested_amps_always_within_limits() {
    let config = ControlsConfig {
        min_amps: 5,
        max_amps: 13,
        max_manual_amps: 13,
        increase_step: 4,
        decrease_step: 2,
        ..scenario_config()
    };
    let controls = ChargingControls::new(&config);
    for auto in [true, false] {
        for reserve_ok in [true, false] {
            for export in [0.0, 700.0, 701.0, 10_000.0] {
                for import in [0.0, 0.1, 5_000.0] {
                    for confirmed in [-3, 0, 5, 9, 13, 32] {
                        let d = controls.decide(&DecisionInputs {
                            auto_mode_enabled: auto,
                            reserve_battery_ok: reserve_ok,
                            pv_export_power_w: export,
                            grid_import_power_w: import,
                            last_confirmed_amps: confirmed,
                            previous_requested_amps: confirmed,
                        });
                        assert!(
                            (5..=13).contains(&d.requested_amps),
                            "{:?} out of range",
                            d
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn port_latch_gate_needs_engaged_cable_and_open_door() {
    let controls = ChargingControls::new(&scenario_config());
    assert!(controls.evaluate_gates(&PortLatch::Engaged, true, 0.0).port_latch_ok);
    assert!(!controls.evaluate_gates(&PortLatch::Engaged, false, 0.0).port_latch_ok);
    assert!(
        !controls
            .evaluate_gates(&PortLatch::parse("Disengaged"), true, 0.0)
            .port_latch_ok
    );
}
