//! Event and measurement types.
//!
//! Every value here is transient: events live for one handler call and
//! readings live for one sampling cycle. Nothing is cached between them.

use std::fmt;

pub use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};

/// Link-layer network state notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Disconnected,
    Connecting,
    Connected,
    IpAcquired,
    /// A host event code outside the mapped set. Never logged.
    Other(i32),
}

impl NetworkEvent {
    /// Decode a host network event code (offset from the network event group base).
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NetworkEvent::Disconnected,
            1 => NetworkEvent::Connecting,
            2 => NetworkEvent::Connected,
            3 => NetworkEvent::IpAcquired,
            other => NetworkEvent::Other(other),
        }
    }
}

/// Opaque correlation token handed to Wi-Fi handlers at subscription time.
///
/// Only its identity is ever rendered, never anything it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CorrelationToken(pub usize);

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Wi-Fi station and access-point notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    StationDisconnected { reason: i32 },
    StationConnecting(CorrelationToken),
    StationConnected(CorrelationToken),
    StationIpAcquired(CorrelationToken),
    ApClientConnected { mac: MacAddr6 },
    ApClientDisconnected { mac: MacAddr6 },
    /// A host event code outside the mapped set (scan done, etc.). Never logged.
    Other(i32),
}

/// Everything the host can deliver into the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Network(NetworkEvent),
    Wifi(WifiEvent),
    TimerTick,
}

/// Render a MAC address as six lower-case, colon-separated hex octets.
pub fn format_mac(mac: &MacAddr6) -> String {
    let b = mac.as_bytes();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}

/// Device health counters, read as one snapshot at the start of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub device_id: String,

    /// Seconds since boot.
    pub uptime_secs: f64,

    /// Total heap size in bytes.
    pub heap_total: u64,

    /// Free heap in bytes. Never larger than `heap_total`.
    pub heap_free: u64,
}

impl DeviceStats {
    /// Build a snapshot, clamping `heap_free` when the allocator raced the read.
    pub fn new(
        device_id: impl Into<String>,
        uptime_secs: f64,
        heap_total: u64,
        heap_free: u64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            uptime_secs,
            heap_total,
            heap_free: heap_free.min(heap_total),
        }
    }
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - uptime: {:.2}, RAM: {}, {} free",
            self.device_id, self.uptime_secs, self.heap_total, self.heap_free
        )
    }
}

/// One temperature/humidity/pressure reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature_c: f64,

    /// Relative humidity in percent.
    pub humidity_rh: f64,

    /// Kilopascals, quantized to 0.01 kPa at conversion.
    pub pressure_kpa: f64,
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temp {:.2} *C, humidity {:.2} %RH, pressure {:.2} kPa",
            self.temperature_c, self.humidity_rh, self.pressure_kpa
        )
    }
}
