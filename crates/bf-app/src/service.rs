//! Locked service facade and the periodic control loop.
//!
//! One `parking_lot::Mutex` guards the whole engine. The loop thread and every
//! frontend call hold it for the full duration of their operation, so a tick
//! never interleaves with a command.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::engine::{
    BoilSettings, ControlEngine, Health, OtherSettings, PidSettings, StatusSnapshot,
};
use crate::error::{AppError, AppResult};
use crate::messages::Message;
use crate::state::Mode;

/// Thread-safe handle to the control engine. Cheap to clone.
#[derive(Clone)]
pub struct BrewService {
    engine: Arc<Mutex<ControlEngine>>,
}

impl BrewService {
    pub fn new(engine: ControlEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut ControlEngine) -> R) -> R {
        f(&mut *self.engine.lock())
    }

    pub fn tick(&self) {
        self.engine.lock().tick();
    }

    pub fn status(&self) -> StatusSnapshot {
        self.engine.lock().status()
    }

    pub fn health(&self) -> Health {
        self.engine.lock().health()
    }

    pub fn set_setpoint(&self, setpoint: f64) -> AppResult<()> {
        self.engine.lock().set_setpoint(setpoint)
    }

    pub fn set_duty_cycle(&self, duty: f64) -> AppResult<()> {
        self.engine.lock().set_duty_cycle(duty)
    }

    pub fn set_mode(&self, mode: Mode, tuning_rule: Option<&str>) -> AppResult<()> {
        self.engine.lock().set_mode_with_rule(mode, tuning_rule)
    }

    pub fn set_pump(&self, on: bool) {
        self.engine.lock().set_pump(on);
    }

    pub fn pid_settings(&self) -> PidSettings {
        self.engine.lock().pid_settings()
    }

    pub fn set_pid_settings(&self, gains: PidSettings) -> AppResult<()> {
        self.engine.lock().set_pid_settings(gains)
    }

    pub fn boil_settings(&self) -> BoilSettings {
        self.engine.lock().boil_settings()
    }

    pub fn set_boil_settings(&self, boil: BoilSettings) -> AppResult<()> {
        self.engine.lock().set_boil_settings(boil)
    }

    pub fn other_settings(&self) -> OtherSettings {
        self.engine.lock().other_settings()
    }

    pub fn set_other_settings(&self, other: OtherSettings) -> AppResult<()> {
        self.engine.lock().set_other_settings(other)
    }

    pub fn drain_messages(&self) -> Vec<Message> {
        self.engine.lock().drain_messages()
    }
}

impl std::fmt::Debug for BrewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrewService").finish_non_exhaustive()
    }
}

/// Background thread ticking the engine at a fixed period.
pub struct ControlLoop;

impl ControlLoop {
    /// Start ticking `service` every `period`.
    pub fn spawn(service: BrewService, period: Duration) -> AppResult<ControlLoopHandle> {
        if period.is_zero() {
            return Err(AppError::InvalidInput(
                "tick period must be positive".to_string(),
            ));
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || run_loop(service, period, stop_rx))
            .map_err(|e| AppError::ControlLoop(format!("failed to spawn control loop: {e}")))?;
        info!(period_ms = period.as_millis() as u64, "control loop started");

        Ok(ControlLoopHandle {
            stop: stop_tx,
            thread: Some(thread),
        })
    }
}

fn run_loop(service: BrewService, period: Duration, stop: Receiver<()>) -> u64 {
    let ticker = tick(period);
    let mut ticks = 0_u64;
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                service.tick();
                ticks += 1;
            }
        }
    }
    debug!(ticks, "control loop exiting");
    ticks
}

/// Owner of a running [`ControlLoop`]. Dropping it stops the loop too.
pub struct ControlLoopHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<u64>>,
}

impl ControlLoopHandle {
    /// Stop the loop after the in-flight tick and wait for it. Returns the
    /// number of ticks run.
    pub fn shutdown(mut self) -> AppResult<u64> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> AppResult<u64> {
        let Some(thread) = self.thread.take() else {
            return Ok(0);
        };
        // A full channel or a gone receiver both mean the loop is stopping.
        let _ = self.stop.try_send(());
        let ticks = thread
            .join()
            .map_err(|_| AppError::ControlLoop("control loop thread panicked".to_string()))?;
        info!(ticks, "control loop stopped");
        Ok(ticks)
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            tracing::error!(error = %e, "control loop shutdown failed");
        }
    }
}
