//! Contracts with the host runtime and the hardware collaborators.
//!
//! The core never talks to the network stack, the bus transport or the
//! allocator directly. Each platform implements these traits:
//! - Linux: tokio event bus and simulated sensor (`envnode-runtime`)
//! - Firmware: the vendor event loop, I2C driver and heap counters
//!
//! All methods are synchronous to support embedded platforms.

use crate::error::SensorError;
use crate::model::{CorrelationToken, DeviceStats, NetworkEvent, WifiEvent};

/// Handler invoked for every network event.
pub type NetworkHandler = Box<dyn FnMut(&NetworkEvent) + Send>;

/// Handler invoked for every Wi-Fi event.
pub type WifiHandler = Box<dyn FnMut(&WifiEvent) + Send>;

/// Registration side of the host's event delivery.
///
/// Handlers run to completion, one event at a time per event kind.
pub trait EventSubscriber {
    /// Register a handler for link-layer network events.
    fn subscribe_network(&mut self, handler: NetworkHandler);

    /// Register a handler for Wi-Fi events.
    ///
    /// Returns the correlation token the host passes back in station events
    /// delivered to this handler.
    fn subscribe_wifi(&mut self, handler: WifiHandler) -> CorrelationToken;
}

/// The shared bus the environmental sensor sits on.
pub trait SensorBus {
    /// Exclusive handle to an initialized sensor.
    type Handle: SensorHandle;

    /// Initialize the sensor at `address` and take it for the rest of the cycle.
    fn acquire(&mut self, address: u8) -> Result<Self::Handle, SensorError>;
}

/// An acquired sensor. Dropping it without calling [`release`](SensorHandle::release)
/// is a bug in the caller; use the controller's scoped guard instead.
pub trait SensorHandle {
    /// Temperature in degrees Celsius.
    fn read_temperature(&mut self) -> Result<f32, SensorError>;

    /// Relative humidity in percent.
    fn read_humidity(&mut self) -> Result<f32, SensorError>;

    /// Pressure in raw sensor units (Pa).
    fn read_pressure(&mut self) -> Result<f32, SensorError>;

    /// Give the bus back.
    fn release(self);
}

/// Device introspection counters.
pub trait DeviceInfo {
    fn device_id(&self) -> String;

    fn uptime_secs(&self) -> f64;

    fn heap_total_bytes(&self) -> u64;

    fn heap_free_bytes(&self) -> u64;

    /// Read all counters as one snapshot.
    fn snapshot(&self) -> DeviceStats {
        DeviceStats::new(
            self.device_id(),
            self.uptime_secs(),
            self.heap_total_bytes(),
            self.heap_free_bytes(),
        )
    }
}

/// Blocking delay for synchronous targets.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

impl<F: FnMut(u32)> Delay for F {
    fn delay_ms(&mut self, ms: u32) {
        self(ms)
    }
}
