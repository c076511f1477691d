//! # envnode-runtime
//!
//! Tokio host runtime for the envnode agent.
//!
//! This crate provides:
//! - [`EventBus`]: the host side of network/Wi-Fi event subscription
//! - [`drive_cycle`]: async driver for the core sampling state machine
//! - [`Agent`]: the single-consumer event loop that ties them to a timer
//! - Simulated sensor, device counters and link events for running on Linux
//! - JSON configuration loading

pub mod agent;
pub mod config;
pub mod event_bus;
pub mod sim;

pub use agent::{drive_cycle, Agent, AgentStats};
pub use config::{config_path_from_env, load_config, CONFIG_ENV_VAR};
pub use event_bus::EventBus;
pub use sim::{simulated_link, ProcessInfo, SimulatedSensorBus};
