//! Simulated kettle hardware and logging outputs.
//!
//! The sensor advances the shared plant to the current clock reading before
//! sampling it, so the simulation runs at whatever pace the clock does: wall
//! time under [`bf_core::SystemClock`], as fast as the loop under
//! [`bf_core::ManualClock`].

use std::sync::Arc;

use bf_core::SharedClock;
use bf_sim::{KettleParams, KettleSim, SimResult};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    Buzzer, FanOutput, Hardware, HeaterOutput, OutputPin, PumpOutput, SensorReading,
    TemperatureSensor, TimedBuzzer,
};

/// Kettle plant shared between the simulated sensor and heater.
#[derive(Clone)]
pub struct SimulatedKettle {
    plant: Arc<Mutex<KettleSim>>,
    clock: SharedClock,
}

impl SimulatedKettle {
    pub fn new(params: KettleParams, dt_s: f64, clock: SharedClock) -> SimResult<Self> {
        Ok(Self::from_sim(KettleSim::new(params, dt_s)?, clock))
    }

    pub fn from_sim(sim: KettleSim, clock: SharedClock) -> Self {
        Self {
            plant: Arc::new(Mutex::new(sim)),
            clock,
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            kettle: self.clone(),
        }
    }

    pub fn heater(&self) -> SimHeater {
        SimHeater {
            kettle: self.clone(),
        }
    }

    /// Water temperature right now, without advancing the plant.
    pub fn temperature(&self) -> f64 {
        self.plant.lock().temperature()
    }

    /// Simulated sensor and heater with logging fan, pump and buzzer.
    pub fn hardware(&self) -> Hardware {
        Hardware {
            sensor: Box::new(self.sensor()),
            heater: Box::new(self.heater()),
            fan: Box::new(LoggingFan),
            pump: Box::new(LoggingPump),
            buzzer: Box::new(LoggingBuzzer),
        }
    }

    /// Like [`SimulatedKettle::hardware`], with a real-time buzzer pulse on a
    /// logging pin.
    pub fn hardware_with_timed_buzzer(&self) -> Hardware {
        Hardware {
            buzzer: Box::new(TimedBuzzer::new(Box::new(LoggingPin::new("buzzer")))),
            ..self.hardware()
        }
    }
}

impl std::fmt::Debug for SimulatedKettle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedKettle")
            .field("plant", &*self.plant.lock())
            .finish_non_exhaustive()
    }
}

pub struct SimSensor {
    kettle: SimulatedKettle,
}

impl TemperatureSensor for SimSensor {
    fn read_temperature(&mut self) -> SensorReading {
        let now_s = self.kettle.clock.now().as_secs_f64();
        match self.kettle.plant.lock().advance_to(now_s) {
            Ok(t) => SensorReading::valid(t),
            Err(e) => {
                warn!(error = %e, "simulated kettle failed");
                SensorReading::invalid()
            }
        }
    }
}

pub struct SimHeater {
    kettle: SimulatedKettle,
}

impl HeaterOutput for SimHeater {
    fn set_duty_cycle(&mut self, percent: f64) {
        debug!(percent, "heater duty");
        self.kettle.plant.lock().set_duty(percent);
    }
}

#[derive(Debug, Default)]
pub struct LoggingFan;

impl FanOutput for LoggingFan {
    fn set_fan_power(&mut self, percent: f64) {
        info!(percent, "fan power");
    }
}

#[derive(Debug, Default)]
pub struct LoggingPump;

impl PumpOutput for LoggingPump {
    fn set_pump(&mut self, on: bool) {
        info!(on, "pump");
    }
}

#[derive(Debug, Default)]
pub struct LoggingBuzzer;

impl Buzzer for LoggingBuzzer {
    fn sound(&mut self) {
        info!("buzzer");
    }
}

#[derive(Debug)]
pub struct LoggingPin {
    name: &'static str,
}

impl LoggingPin {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl OutputPin for LoggingPin {
    fn set(&mut self, on: bool) {
        info!(pin = self.name, on, "output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::ManualClock;

    #[test]
    fn sensor_follows_clock_and_heater() {
        let clock = ManualClock::new();
        let params = KettleParams::first_order(1.0, 100.0, 0.0, 20.0);
        let kettle = SimulatedKettle::new(params, 1.0, clock.shared()).unwrap();
        let mut sensor = kettle.sensor();
        let mut heater = kettle.heater();

        assert_eq!(sensor.read_temperature(), SensorReading::valid(20.0));

        heater.set_duty_cycle(100.0);
        clock.advance_secs(100.0);
        let reading = sensor.read_temperature().trusted().unwrap();
        let expected = 20.0 + 100.0 * (1.0 - (-1.0_f64).exp());
        assert!((reading - expected).abs() < 1e-6);
        assert_eq!(kettle.temperature(), reading);
    }

    #[test]
    fn reading_without_time_passing_is_stable() {
        let clock = ManualClock::new();
        let kettle = SimulatedKettle::new(KettleParams::default(), 1.0, clock.shared()).unwrap();
        let mut sensor = kettle.sensor();
        kettle.heater().set_duty_cycle(100.0);
        let a = sensor.read_temperature();
        let b = sensor.read_temperature();
        assert_eq!(a, b);
    }
}
