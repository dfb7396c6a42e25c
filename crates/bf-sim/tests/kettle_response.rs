use bf_sim::{
    IntegratorType, KettleModel, KettleParams, KettleSim, SimOptions, TransientModel, run_sim,
};

#[test]
fn run_sim_matches_analytic_heating_curve() {
    let params = KettleParams::first_order(0.8, 600.0, 0.0, 18.0);
    let mut model = KettleModel::new(params.clone());
    model.duty = 75.0;

    let opts = SimOptions {
        dt: 2.0,
        t_end: 1_800.0,
        record_every: 30,
        ..SimOptions::default()
    };
    let record = run_sim(&mut model, &opts).unwrap();

    let target = params.steady_state_c(75.0);
    for (t, x) in record.t.iter().zip(&record.x) {
        let expected = target + (18.0 - target) * (-t / 600.0).exp();
        assert!(
            (x.temperature_c - expected).abs() < 1e-6,
            "t = {t}: {} vs {expected}",
            x.temperature_c
        );
    }
    assert_eq!(model.initial_state().temperature_c, 18.0);
}

#[test]
fn integrators_agree_on_slow_kettle() {
    let params = KettleParams::default();
    let mut rk4 = KettleSim::new(params.clone(), 1.0).unwrap();
    let mut euler = KettleSim::new(params, 1.0)
        .unwrap()
        .with_integrator(IntegratorType::ForwardEuler);

    rk4.set_duty(60.0);
    euler.set_duty(60.0);
    let a = rk4.advance_to(1_200.0).unwrap();
    let b = euler.advance_to(1_200.0).unwrap();

    assert!(a > 20.0);
    assert!((a - b).abs() < 0.05, "rk4 {a} vs euler {b}");
}

#[test]
fn cools_towards_ambient_once_heater_is_off() {
    let mut sim = KettleSim::new(KettleParams::default(), 1.0)
        .unwrap()
        .with_temperature(80.0);
    let mut last = sim.temperature();
    for _ in 0..600 {
        let t = sim.step().unwrap();
        assert!(t <= last);
        assert!(t > 20.0);
        last = t;
    }
}
