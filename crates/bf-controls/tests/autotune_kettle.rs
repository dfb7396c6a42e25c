//! Closed-loop relay autotune against a simulated first-order-plus-dead-time
//! kettle, checked against the analytic limit cycle of that process.

use bf_controls::{AutotuneConfig, AutotuneState, Autotuner, ControlError, TuningRule};
use bf_core::ManualClock;
use bf_sim::{KettleParams, KettleSim};

const GAIN: f64 = 1.0;
const TAU: f64 = 300.0;
const DEAD_TIME: f64 = 60.0;
const AMBIENT: f64 = 20.0;
const SETPOINT: f64 = 65.0;
const BIAS: f64 = 45.0;
const STEP: f64 = 45.0;
const BAND: f64 = 0.5;

fn config() -> AutotuneConfig {
    AutotuneConfig {
        output_step: STEP,
        relay_bias: BIAS,
        noise_band: BAND,
        lookback_s: 60.0,
        ..AutotuneConfig::default()
    }
}

/// Drive the tuner against the plant until it finishes. Returns the
/// simulated time it took.
fn tune(params: KettleParams, config: AutotuneConfig, limit_s: u64) -> (Autotuner, u64) {
    let clock = ManualClock::new();
    let mut kettle = KettleSim::new(params, 1.0).unwrap();
    let mut tuner = Autotuner::new(1.0, SETPOINT, config, clock.shared()).unwrap();

    for t in 0..limit_s {
        let done = tuner.run(kettle.temperature());
        kettle.set_duty(tuner.output());
        kettle.step().unwrap();
        if done {
            return (tuner, t);
        }
        clock.advance_secs(1.0);
    }
    (tuner, limit_s)
}

fn within(actual: f64, expected: f64, rel: f64) -> bool {
    ((actual - expected) / expected).abs() < rel
}

#[test]
fn relay_autotune_finds_ultimate_gain_and_period() {
    let params = KettleParams::first_order(GAIN, TAU, DEAD_TIME, AMBIENT);
    let (tuner, elapsed) = tune(params, config(), 7_200);

    assert_eq!(tuner.state(), AutotuneState::Succeeded, "after {elapsed} s");
    assert_eq!(tuner.output(), 0.0);

    // Limit cycle of a FOPDT process under relay feedback.
    let hi = AMBIENT + GAIN * (BIAS + STEP);
    let lo = AMBIENT + GAIN * (BIAS - STEP);
    let decay = (-DEAD_TIME / TAU).exp();
    let peak = hi - (hi - (SETPOINT + BAND)) * decay;
    let trough = lo + ((SETPOINT - BAND) - lo) * decay;
    let amplitude = 0.5 * (peak - trough);
    let ku = 4.0 * STEP / (std::f64::consts::PI * amplitude);
    let fall = DEAD_TIME + TAU * ((peak - lo) / ((SETPOINT - BAND) - lo)).ln();
    let rise = DEAD_TIME + TAU * ((hi - trough) / (hi - (SETPOINT + BAND))).ln();
    let pu = fall + rise;

    let osc = tuner.oscillation().unwrap();
    assert!(within(osc.amplitude, amplitude, 0.10), "{osc:?} vs a = {amplitude}");
    assert!(within(osc.ku, ku, 0.10), "{osc:?} vs ku = {ku}");
    assert!(within(osc.pu_s, pu, 0.10), "{osc:?} vs pu = {pu}");

    let gains = tuner.pid_parameters(TuningRule::ZieglerNichols).unwrap();
    let kp = ku / 34.0;
    assert!(within(gains.kp, kp, 0.10));
    assert!(within(gains.ki, kp / (pu / 40.0), 0.15));
    assert!(within(gains.kd, kp * (pu / 160.0), 0.15));

    for rule in Autotuner::tuning_rules() {
        let g = tuner.pid_parameters(*rule).unwrap();
        assert!(g.kp > 0.0 && g.ki > 0.0 && g.kd > 0.0, "{rule}: {g:?}");
    }
}

#[test]
fn tuning_a_default_kettle_succeeds() {
    let mut params = KettleParams::default();
    params.boiling_point_c = None;
    let (tuner, elapsed) = tune(params, AutotuneConfig::default(), 4 * 3_600);
    assert_eq!(tuner.state(), AutotuneState::Succeeded, "after {elapsed} s");
    assert!(tuner.pid_parameters_by_name("no-overshoot").is_ok());
}

#[test]
fn dead_heater_fails_on_relay_timeout() {
    let params = KettleParams::first_order(0.0, TAU, DEAD_TIME, AMBIENT);
    let config = AutotuneConfig {
        relay_timeout_s: 600.0,
        ..config()
    };
    let (tuner, elapsed) = tune(params, config, 7_200);

    assert_eq!(tuner.state(), AutotuneState::Failed);
    assert_eq!(elapsed, 601);
    assert!(matches!(
        tuner.pid_parameters(TuningRule::ZieglerNichols),
        Err(ControlError::NotTuned { .. })
    ));
}
