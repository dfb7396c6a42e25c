//! Actuator and sensor interfaces.
//!
//! The engine talks to hardware only through these traits. GPIO/PWM bindings
//! live outside this workspace; [`sim`] provides a simulated kettle plus
//! logging outputs.

pub mod sim;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, after, never, select, unbounded};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Default buzzer pulse length.
pub const BUZZER_PULSE: Duration = Duration::from_millis(500);

/// One temperature reading. `value` is only meaningful when `valid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub valid: bool,
}

impl SensorReading {
    pub fn valid(value: f64) -> Self {
        Self { value, valid: true }
    }

    pub fn invalid() -> Self {
        Self {
            value: f64::NAN,
            valid: false,
        }
    }

    /// Value if the reading can be trusted.
    pub fn trusted(self) -> Option<f64> {
        (self.valid && self.value.is_finite()).then_some(self.value)
    }
}

pub trait TemperatureSensor: Send {
    fn read_temperature(&mut self) -> SensorReading;
}

pub trait HeaterOutput: Send {
    /// Heater PWM duty in percent.
    fn set_duty_cycle(&mut self, percent: f64);
}

pub trait FanOutput: Send {
    fn set_fan_power(&mut self, percent: f64);
}

pub trait PumpOutput: Send {
    fn set_pump(&mut self, on: bool);
}

pub trait Buzzer: Send {
    /// Sound a short alert. Must not block.
    fn sound(&mut self);
}

/// A digital output line.
pub trait OutputPin: Send {
    fn set(&mut self, on: bool);
}

/// The devices the engine drives.
pub struct Hardware {
    pub sensor: Box<dyn TemperatureSensor>,
    pub heater: Box<dyn HeaterOutput>,
    pub fan: Box<dyn FanOutput>,
    pub pump: Box<dyn PumpOutput>,
    pub buzzer: Box<dyn Buzzer>,
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware").finish_non_exhaustive()
    }
}

/// Buzzer on an output pin, switched off by a one-shot timer.
///
/// One worker thread owns the shutoff deadline. Sounding again before the
/// pulse ended moves the deadline: only the shutoff of the latest pulse takes
/// effect. Dropping the buzzer switches the pin off and joins the worker.
pub struct TimedBuzzer {
    pin: Arc<Mutex<Box<dyn OutputPin>>>,
    pulse: Duration,
    shutoff: Option<Sender<Instant>>,
    worker: Option<JoinHandle<()>>,
}

impl TimedBuzzer {
    pub fn new(pin: Box<dyn OutputPin>) -> Self {
        Self::with_pulse(pin, BUZZER_PULSE)
    }

    pub fn with_pulse(pin: Box<dyn OutputPin>, pulse: Duration) -> Self {
        let pin = Arc::new(Mutex::new(pin));
        let (tx, rx) = unbounded::<Instant>();
        let worker_pin = Arc::clone(&pin);
        let (shutoff, worker) = match thread::Builder::new()
            .name("buzzer-off".to_string())
            .spawn(move || run_shutoff(worker_pin, rx))
        {
            Ok(worker) => (Some(tx), Some(worker)),
            Err(e) => {
                warn!(error = %e, "could not start buzzer shutoff worker");
                (None, None)
            }
        };
        Self {
            pin,
            pulse,
            shutoff,
            worker,
        }
    }
}

fn run_shutoff(pin: Arc<Mutex<Box<dyn OutputPin>>>, deadlines: Receiver<Instant>) {
    let mut pending: Option<Instant> = None;
    loop {
        let timer = match pending {
            Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
            None => never(),
        };
        select! {
            recv(deadlines) -> msg => match msg {
                Ok(deadline) => pending = Some(deadline),
                Err(_) => {
                    if pending.is_some() {
                        pin.lock().set(false);
                    }
                    break;
                }
            },
            recv(timer) -> _ => {
                pin.lock().set(false);
                debug!("buzzer off");
                pending = None;
            }
        }
    }
}

impl Buzzer for TimedBuzzer {
    fn sound(&mut self) {
        self.pin.lock().set(true);
        debug!(pulse_ms = self.pulse.as_millis() as u64, "buzzer on");

        let scheduled = self
            .shutoff
            .as_ref()
            .is_some_and(|tx| tx.send(Instant::now() + self.pulse).is_ok());
        if !scheduled {
            warn!("buzzer shutoff unavailable, switching off at once");
            self.pin.lock().set(false);
        }
    }
}

impl Drop for TimedBuzzer {
    fn drop(&mut self) {
        self.shutoff.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("buzzer shutoff worker panicked");
            }
        }
    }
}
