//! Control engine and service layer for brewflow.
//!
//! This crate owns the kettle control state and everything that mutates it:
//! the mode state machine, the periodic tick, chart history, operator
//! messages and settings persistence. Frontends (the CLI, an HTTP adapter)
//! reach the engine only through [`BrewService`], which serializes every
//! operation behind one lock.

pub mod config;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod history;
pub mod messages;
pub mod service;
pub mod settings;
pub mod state;

pub use config::AppConfig;
pub use engine::{BoilSettings, ControlEngine, OtherSettings, PidSettings, StatusSnapshot};
pub use error::{AppError, AppResult};
pub use hardware::{Hardware, SensorReading};
pub use history::{ChartHistory, ChartSample};
pub use messages::{Message, MessageStyle};
pub use service::{BrewService, ControlLoop, ControlLoopHandle};
pub use settings::{JsonSettingsStore, MemorySettingsStore, Settings, SettingsStore};
pub use state::{ActiveController, ControlState, Mode};
