//! # envnode-core
//!
//! Core logic for the envnode device agent.
//!
//! This crate provides:
//! - Event model for network and Wi-Fi notifications
//! - Connectivity observer that turns those events into log lines
//! - The sampling cycle state machine for the environmental sensor
//! - Traits for the host collaborators (event source, sensor bus, device info, delay)
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable both on Linux (tokio) and on bare firmware targets.

pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod log;
pub mod model;
pub mod observer;

pub use config::AgentConfig;
pub use controller::{CycleOutcome, CycleState, SamplingController, SamplingCycle, Step};
pub use error::{ConfigError, SensorError};
pub use host::{Delay, DeviceInfo, EventSubscriber, SensorBus, SensorHandle};
pub use log::{LogSink, RecordingSink, Severity, TracingSink};
pub use model::*;
pub use observer::ConnectivityObserver;
