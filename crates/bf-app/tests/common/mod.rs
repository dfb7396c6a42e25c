#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bf_app::hardware::{Buzzer, FanOutput, HeaterOutput, PumpOutput, TemperatureSensor};
use bf_app::{AppConfig, ControlEngine, Hardware, MemorySettingsStore, SensorReading, Settings};
use bf_core::ManualClock;
use parking_lot::Mutex;

/// Sensor replaying queued readings, then repeating the last one.
#[derive(Clone)]
pub struct ScriptedSensor {
    script: Arc<Mutex<(VecDeque<SensorReading>, SensorReading)>>,
}

impl ScriptedSensor {
    pub fn new(initial: f64) -> Self {
        Self {
            script: Arc::new(Mutex::new((VecDeque::new(), SensorReading::valid(initial)))),
        }
    }

    pub fn push(&self, values: &[f64]) {
        let mut script = self.script.lock();
        script.0.extend(values.iter().map(|v| SensorReading::valid(*v)));
    }

    pub fn fail(&self) {
        self.script.lock().0.push_back(SensorReading::invalid());
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read_temperature(&mut self) -> SensorReading {
        let mut script = self.script.lock();
        if let Some(next) = script.0.pop_front() {
            script.1 = next;
        }
        script.1
    }
}

#[derive(Clone, Default)]
pub struct Recorder<T>(pub Arc<Mutex<Vec<T>>>);

impl<T: Clone> Recorder<T> {
    pub fn values(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.0.lock().last().cloned()
    }
}

impl HeaterOutput for Recorder<f64> {
    fn set_duty_cycle(&mut self, percent: f64) {
        self.0.lock().push(percent);
    }
}

#[derive(Clone, Default)]
pub struct FanRecorder(pub Recorder<f64>);

impl FanOutput for FanRecorder {
    fn set_fan_power(&mut self, percent: f64) {
        self.0.0.lock().push(percent);
    }
}

impl PumpOutput for Recorder<bool> {
    fn set_pump(&mut self, on: bool) {
        self.0.lock().push(on);
    }
}

#[derive(Clone, Default)]
pub struct CountingBuzzer(pub Arc<AtomicUsize>);

impl CountingBuzzer {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Buzzer for CountingBuzzer {
    fn sound(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine wired to recording doubles.
pub struct Rig {
    pub engine: ControlEngine,
    pub clock: ManualClock,
    pub sensor: ScriptedSensor,
    pub heater: Recorder<f64>,
    pub fan: FanRecorder,
    pub pump: Recorder<bool>,
    pub buzzer: CountingBuzzer,
    pub store: Arc<MemorySettingsStore>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, Arc::new(MemorySettingsStore::default()))
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::build(
            AppConfig::default(),
            Arc::new(MemorySettingsStore::with_settings(settings)),
        )
    }

    fn build(config: AppConfig, store: Arc<MemorySettingsStore>) -> Self {
        let clock = ManualClock::new();
        let sensor = ScriptedSensor::new(20.0);
        let heater = Recorder::<f64>::default();
        let fan = FanRecorder::default();
        let pump = Recorder::<bool>::default();
        let buzzer = CountingBuzzer::default();

        let hardware = Hardware {
            sensor: Box::new(sensor.clone()),
            heater: Box::new(heater.clone()),
            fan: Box::new(fan.clone()),
            pump: Box::new(pump.clone()),
            buzzer: Box::new(buzzer.clone()),
        };
        let engine =
            ControlEngine::new(config, hardware, Box::new(store.clone()), clock.shared()).unwrap();

        Self {
            engine,
            clock,
            sensor,
            heater,
            fan,
            pump,
            buzzer,
            store,
        }
    }

    /// Tick once per queued reading, one second apart.
    pub fn run(&mut self, readings: &[f64]) {
        self.sensor.push(readings);
        for _ in readings {
            self.step();
        }
    }

    pub fn step(&mut self) {
        self.engine.tick();
        self.clock.advance_secs(1.0);
    }
}
