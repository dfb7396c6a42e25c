use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bf_app::hardware::sim::SimulatedKettle;
use bf_app::{
    AppConfig, AppError, AppResult, BrewService, ControlEngine, ControlLoop, JsonSettingsStore,
    MemorySettingsStore, Mode, SettingsStore, StatusSnapshot,
};
use bf_controls::{AutotuneState, Autotuner};
use bf_core::units::constants::water_heat_capacity;
use bf_core::{Clock, ManualClock, SystemClock, celsius, clamp_percent, kg, s, watts};
use bf_sim::{KettleModel, KettleParams, KettleSim, SimOptions, run_sim};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Plant integration step for the simulated kettle, in seconds.
const PLANT_DT_S: f64 = 0.1;

#[derive(Parser)]
#[command(name = "bf-cli")]
#[command(about = "BrewFlow CLI - kettle temperature controller", long_about = None)]
struct Cli {
    /// Application config (YAML). Defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "config/brewflow.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller against the simulated kettle, faster than real time
    Simulate {
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        kettle: KettleArgs,
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 3600.0)]
        duration: f64,
        /// Include the chart series in the printed status
        #[arg(long)]
        chart: bool,
    },
    /// Relay-autotune the simulated kettle and print the gains of every rule
    Autotune {
        #[command(flatten)]
        kettle: KettleArgs,
        /// Target temperature the relay oscillates around
        #[arg(long)]
        setpoint: Option<f64>,
    },
    /// Run the real-time control loop on the simulated kettle
    Serve {
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        kettle: KettleArgs,
        /// Wall-clock run time in seconds
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
        /// Seconds between status log lines
        #[arg(long, default_value_t = 10.0)]
        report_every: f64,
    },
    /// Open-loop heater step on the kettle model (no probe lag), printed as CSV
    StepResponse {
        #[command(flatten)]
        kettle: KettleArgs,
        /// Constant heater duty cycle (%)
        #[arg(long, default_value_t = 100.0)]
        duty: f64,
        /// Time step in seconds
        #[arg(long, default_value_t = 1.0)]
        dt: f64,
        /// End time in seconds
        #[arg(long, default_value_t = 3600.0)]
        t_end: f64,
        /// Print every N-th step
        #[arg(long, default_value_t = 60)]
        every: usize,
    },
    /// Print the persisted operator settings
    Settings,
}

#[derive(Args)]
struct KettleArgs {
    /// Water volume in litres
    #[arg(long, default_value_t = 20.0)]
    volume_l: f64,
    /// Heating element power in watts
    #[arg(long, default_value_t = 3_500.0)]
    heater_w: f64,
    /// Heat loss to ambient in W/K
    #[arg(long, default_value_t = 25.0)]
    loss_w_per_k: f64,
    /// Ambient temperature in degrees Celsius
    #[arg(long, default_value_t = 20.0)]
    ambient_c: f64,
    /// Heater-to-probe lag in seconds
    #[arg(long, default_value_t = 30.0)]
    dead_time_s: f64,
}

impl KettleArgs {
    fn params(&self) -> AppResult<KettleParams> {
        let volume_l = ensure_positive(self.volume_l, "volume")?;
        let params = KettleParams::from_physical(
            watts(self.heater_w),
            water_heat_capacity(kg(volume_l)),
            self.loss_w_per_k,
            celsius(self.ambient_c),
            s(self.dead_time_s),
        )?;
        Ok(params)
    }
}

#[derive(Args)]
struct RunArgs {
    /// Mode to enter: off, manual, auto, boil, tuning
    #[arg(long, default_value = "auto")]
    mode: Mode,
    /// Setpoint in degrees Celsius (defaults to the stored initial setpoint)
    #[arg(long)]
    setpoint: Option<f64>,
    /// Heater duty cycle (%) for manual mode
    #[arg(long, default_value_t = 50.0)]
    duty: f64,
    /// Tuning rule adopted by a successful autotune
    #[arg(long)]
    rule: Option<String>,
    /// Persist settings to the configured JSON file instead of memory
    #[arg(long)]
    persist: bool,
}

fn main() -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Simulate {
            run,
            kettle,
            duration,
            chart,
        } => cmd_simulate(config, kettle.params()?, &run, duration, chart),
        Commands::Autotune { kettle, setpoint } => {
            cmd_autotune(&config, kettle.params()?, setpoint)
        }
        Commands::Serve {
            run,
            kettle,
            duration,
            report_every,
        } => cmd_serve(config, kettle.params()?, &run, duration, report_every),
        Commands::StepResponse {
            kettle,
            duty,
            dt,
            t_end,
            every,
        } => cmd_step_response(kettle.params()?, duty, dt, t_end, every),
        Commands::Settings => cmd_settings(&config.settings_path),
    }
}

fn settings_store(config: &AppConfig, persist: bool) -> Box<dyn SettingsStore> {
    if persist {
        Box::new(JsonSettingsStore::new(&config.settings_path))
    } else {
        let seed = JsonSettingsStore::new(&config.settings_path)
            .load()
            .unwrap_or_default();
        Box::new(MemorySettingsStore::with_settings(seed))
    }
}

fn ensure_positive(value: f64, what: &str) -> AppResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AppError::InvalidInput(format!("{what} must be positive")))
    }
}

/// Apply the requested mode the way an operator would.
fn apply_run_args(service: &BrewService, run: &RunArgs) -> AppResult<()> {
    if let Some(setpoint) = run.setpoint {
        service.set_setpoint(setpoint)?;
    }
    match run.mode {
        Mode::Manual => service.set_duty_cycle(run.duty),
        mode => service.set_mode(mode, run.rule.as_deref()),
    }
}

fn cmd_simulate(
    config: AppConfig,
    params: KettleParams,
    run: &RunArgs,
    duration: f64,
    chart: bool,
) -> AppResult<()> {
    let duration = ensure_positive(duration, "duration")?;
    let clock = ManualClock::new();
    let kettle = SimulatedKettle::new(params, PLANT_DT_S, clock.shared())?;
    let tick = Duration::from_millis(config.tick_period_ms);
    let store = settings_store(&config, run.persist);
    let engine = ControlEngine::new(config, kettle.hardware(), store, clock.shared())?;
    let service = BrewService::new(engine);

    apply_run_args(&service, run)?;
    println!(
        "Simulating {:.0} s in {} mode from {:.1} °C",
        duration,
        run.mode,
        kettle.temperature()
    );

    let mut ticks = 0_u64;
    while clock.now().as_secs_f64() < duration {
        service.tick();
        for message in service.drain_messages() {
            println!("[{}] {}", message.style, message.text);
        }
        clock.advance(tick);
        ticks += 1;
    }

    let mut status = service.status();
    if !chart {
        strip_chart(&mut status);
    }
    println!("✓ {ticks} ticks, kettle at {:.2} °C", kettle.temperature());
    print_json(&status)
}

fn strip_chart(status: &mut StatusSnapshot) {
    status.chart_x.clear();
    status.chart_temperature_y.clear();
    status.chart_setpoint_y.clear();
    status.chart_duty_cycle_y.clear();
}

fn cmd_autotune(config: &AppConfig, params: KettleParams, setpoint: Option<f64>) -> AppResult<()> {
    let setpoint = match setpoint {
        Some(sp) => sp,
        None => {
            JsonSettingsStore::new(&config.settings_path)
                .load()
                .unwrap_or_default()
                .initial_setpoint
        }
    };
    let clock = ManualClock::new();
    let mut kettle = KettleSim::new(params, PLANT_DT_S)?;
    let mut tuner = Autotuner::new(
        config.sample_time_s,
        setpoint,
        config.autotune.clone(),
        clock.shared(),
    )?;
    let step = Duration::from_secs_f64(config.sample_time_s);

    println!("Autotuning around {setpoint:.1} °C");
    while !tuner.state().is_terminal() {
        let temperature = kettle.advance_to(clock.now().as_secs_f64())?;
        tuner.run(temperature);
        kettle.set_duty(tuner.output());
        clock.advance(step);
    }
    let elapsed = clock.now().as_secs_f64();

    if tuner.state() == AutotuneState::Failed {
        let reason = tuner.failure_reason().unwrap_or("unknown");
        println!("✗ Autotune failed after {elapsed:.0} s: {reason}");
        return Err(AppError::Simulation(format!("autotune failed: {reason}")));
    }

    if let Some(osc) = tuner.oscillation() {
        println!(
            "✓ Autotune succeeded after {elapsed:.0} s ({} peaks)",
            tuner.peak_count()
        );
        println!(
            "  Ku = {:.4}  Pu = {:.1} s  amplitude = {:.3} °C",
            osc.ku, osc.pu_s, osc.amplitude
        );
    }
    println!("  {:<18} {:>10} {:>10} {:>10}", "rule", "kp", "ki", "kd");
    for rule in Autotuner::tuning_rules() {
        let gains = tuner.pid_parameters(*rule)?;
        println!(
            "  {:<18} {:>10.4} {:>10.5} {:>10.3}",
            rule.to_string(),
            gains.kp,
            gains.ki,
            gains.kd
        );
    }
    Ok(())
}

fn cmd_serve(
    config: AppConfig,
    params: KettleParams,
    run: &RunArgs,
    duration: f64,
    report_every: f64,
) -> AppResult<()> {
    let duration = Duration::from_secs_f64(ensure_positive(duration, "duration")?);
    let report_every = Duration::from_secs_f64(ensure_positive(report_every, "report interval")?);
    let clock = SystemClock::shared();
    let kettle = SimulatedKettle::new(params, PLANT_DT_S, clock.clone())?;
    let period = Duration::from_millis(config.tick_period_ms);
    let store = settings_store(&config, run.persist);
    let engine = ControlEngine::new(config, kettle.hardware_with_timed_buzzer(), store, clock)?;
    let service = BrewService::new(engine);

    apply_run_args(&service, run)?;
    let handle = ControlLoop::spawn(service.clone(), period)?;

    let started = Instant::now();
    while started.elapsed() < duration {
        thread::sleep(report_every.min(duration.saturating_sub(started.elapsed())));
        let status = service.status();
        info!(
            mode = %status.mode,
            temperature = ?status.temperature,
            setpoint = status.setpoint,
            duty_cycle = status.duty_cycle,
            "status"
        );
        for message in service.drain_messages() {
            info!(style = %message.style, "{}", message.text);
        }
    }

    let ticks = handle.shutdown()?;
    println!("✓ Served {ticks} ticks, kettle at {:.2} °C", kettle.temperature());
    let mut status = service.status();
    strip_chart(&mut status);
    print_json(&status)
}

fn cmd_step_response(
    params: KettleParams,
    duty: f64,
    dt: f64,
    t_end: f64,
    every: usize,
) -> AppResult<()> {
    let mut model = KettleModel::new(params);
    model.duty = clamp_percent(duty);
    let opts = SimOptions {
        dt,
        t_end,
        record_every: every,
        ..SimOptions::default()
    };
    let record = run_sim(&mut model, &opts)?;

    println!("time_s,temperature_c");
    for (t, x) in record.t.iter().zip(&record.x) {
        println!("{t:.1},{:.3}", x.temperature_c);
    }
    Ok(())
}

fn cmd_settings(path: &Path) -> AppResult<()> {
    let store = JsonSettingsStore::new(path);
    let settings = match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            println!("Could not load {} ({e}); showing defaults", path.display());
            Default::default()
        }
    };
    print_json(&settings)
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::InvalidInput(format!("failed to render JSON: {e}")))?;
    println!("{json}");
    Ok(())
}
