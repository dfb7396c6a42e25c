mod common;

use std::sync::Arc;

use bf_app::hardware::sim::{LoggingFan, LoggingPump, SimulatedKettle};
use bf_app::{AppConfig, ControlEngine, Hardware, MemorySettingsStore, MessageStyle, Mode};
use bf_controls::AutotuneConfig;
use bf_core::ManualClock;
use bf_sim::KettleParams;
use common::CountingBuzzer;

struct TuningRig {
    engine: ControlEngine,
    clock: ManualClock,
    buzzer: CountingBuzzer,
    store: Arc<MemorySettingsStore>,
}

fn tuning_rig(params: KettleParams, autotune: AutotuneConfig) -> TuningRig {
    let clock = ManualClock::new();
    let kettle = SimulatedKettle::new(params, 1.0, clock.shared()).unwrap();
    let buzzer = CountingBuzzer::default();
    let store = Arc::new(MemorySettingsStore::default());
    let hardware = Hardware {
        sensor: Box::new(kettle.sensor()),
        heater: Box::new(kettle.heater()),
        fan: Box::new(LoggingFan),
        pump: Box::new(LoggingPump),
        buzzer: Box::new(buzzer.clone()),
    };
    let config = AppConfig {
        autotune,
        ..AppConfig::default()
    };
    let engine =
        ControlEngine::new(config, hardware, Box::new(store.clone()), clock.shared()).unwrap();
    TuningRig {
        engine,
        clock,
        buzzer,
        store,
    }
}

fn relay_45() -> AutotuneConfig {
    AutotuneConfig {
        output_step: 45.0,
        relay_bias: 45.0,
        ..AutotuneConfig::default()
    }
}

/// Tick until the engine leaves Tuning. Returns the number of ticks.
fn run_until_off(rig: &mut TuningRig, limit: usize) -> usize {
    for i in 0..limit {
        rig.engine.tick();
        if rig.engine.mode() != Mode::Tuning {
            return i + 1;
        }
        rig.clock.advance_secs(1.0);
    }
    limit
}

#[test]
fn successful_autotune_adopts_selected_rule() {
    let params = KettleParams::first_order(1.0, 300.0, 60.0, 20.0);
    let mut rig = tuning_rig(params, relay_45());
    rig.engine
        .set_mode_with_rule(Mode::Tuning, Some("pessen-integral"))
        .unwrap();

    rig.engine.tick();
    assert_eq!(rig.engine.state().duty_cycle, 90.0);
    assert_eq!(rig.engine.status().autotune_peak_count, Some(0));
    rig.clock.advance_secs(1.0);

    let ticks = run_until_off(&mut rig, 7_200);
    assert!(ticks < 7_200, "autotune did not finish");
    assert_eq!(rig.engine.mode(), Mode::Off);
    assert_eq!(rig.engine.state().duty_cycle, 0.0);
    assert_eq!(rig.buzzer.count(), 1);

    let messages = rig.engine.drain_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].style, MessageStyle::Success);
    assert_eq!(messages[0].text, "Autotune successful");

    let gains = rig.engine.pid_settings();
    assert_ne!(gains.p, 1.0);
    assert!(gains.p > 0.0 && gains.i > 0.0 && gains.d > 0.0);
    // Pessen: Kp = Ku / 28, Kd = Kp * Pu / 133 with Pu of a few minutes.
    assert!(gains.d > gains.p);

    let stored = rig.store.stored().unwrap();
    assert_eq!((stored.kp, stored.ki, stored.kd), (gains.p, gains.i, gains.d));
}

#[test]
fn failed_autotune_keeps_gains() {
    let params = KettleParams::first_order(0.0, 300.0, 60.0, 20.0);
    let autotune = AutotuneConfig {
        relay_timeout_s: 300.0,
        ..relay_45()
    };
    let mut rig = tuning_rig(params, autotune);
    rig.engine.set_mode(Mode::Tuning).unwrap();

    let ticks = run_until_off(&mut rig, 1_000);
    assert_eq!(ticks, 302);
    assert_eq!(rig.engine.mode(), Mode::Off);
    assert_eq!(rig.buzzer.count(), 1);

    let messages = rig.engine.drain_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].style, MessageStyle::Error);
    assert_eq!(messages[0].text, "Autotune failed");

    let gains = rig.engine.pid_settings();
    assert_eq!((gains.p, gains.i, gains.d), (1.0, 1.0, 1.0));
    assert_eq!(rig.store.save_count(), 0);
}
