//! Simulated collaborators for running the agent on a Linux host.
//!
//! - [`SimulatedSensorBus`]: a BME280 that is either present or absent
//! - [`ProcessInfo`]: uptime from process start, heap figures of a small MCU
//! - [`simulated_link`]: a scripted Wi-Fi association feeding the event channel

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use envnode_core::{
    CorrelationToken, DeviceInfo, HostEvent, MacAddr6, NetworkEvent, SensorBus, SensorError,
    SensorHandle, WifiEvent,
};

/// Sensor bus with one simulated BME280 on it.
///
/// Readings drift slowly with every acquisition so consecutive cycles differ.
#[derive(Debug, Clone)]
pub struct SimulatedSensorBus {
    present: bool,
    held: Arc<AtomicBool>,
    samples: Arc<AtomicU64>,
}

impl SimulatedSensorBus {
    pub fn new(present: bool) -> Self {
        Self {
            present,
            held: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a handle is currently outstanding.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Number of successful acquisitions so far.
    pub fn acquisitions(&self) -> u64 {
        self.samples.load(Ordering::SeqCst)
    }
}

impl SensorBus for SimulatedSensorBus {
    type Handle = SimulatedSensor;

    fn acquire(&mut self, address: u8) -> Result<SimulatedSensor, SensorError> {
        if !self.present {
            return Err(SensorError::NotFound { address });
        }
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(SensorError::Bus("sensor already acquired".to_string()));
        }
        let n = self.samples.fetch_add(1, Ordering::SeqCst);
        debug!(address, sample = n, "simulated sensor acquired");
        Ok(SimulatedSensor {
            held: self.held.clone(),
            phase: n as f32,
        })
    }
}

/// Acquired simulated sensor.
#[derive(Debug)]
pub struct SimulatedSensor {
    held: Arc<AtomicBool>,
    phase: f32,
}

impl SensorHandle for SimulatedSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        Ok(21.5 + 1.5 * (self.phase * 0.3).sin())
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        Ok(45.0 + 5.0 * (self.phase * 0.2).cos())
    }

    fn read_pressure(&mut self) -> Result<f32, SensorError> {
        Ok(101_325.0 + 150.0 * (self.phase * 0.1).sin())
    }

    fn release(self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

/// Device counters for the host process.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    device_id: String,
    started: Instant,
    heap_total: u64,
}

impl ProcessInfo {
    /// Heap size of the simulated device, in bytes.
    pub const HEAP_TOTAL: u64 = 320 * 1024;

    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            started: Instant::now(),
            heap_total: Self::HEAP_TOTAL,
        }
    }
}

impl DeviceInfo for ProcessInfo {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn heap_total_bytes(&self) -> u64 {
        self.heap_total
    }

    fn heap_free_bytes(&self) -> u64 {
        // Baseline usage plus a little churn that follows uptime.
        let churn = (self.started.elapsed().as_secs() % 64) * 256;
        self.heap_total - self.heap_total / 3 - churn
    }
}

/// Client that joins the simulated access point after the station is up.
fn ap_client_mac() -> MacAddr6 {
    MacAddr6::new(0x3c, 0x71, 0xbf, 0x0a, 0x1b, 0x2c)
}

/// Play a station association followed by an AP client visit into `events`.
///
/// Returns when the script is done or the receiver is gone.
pub async fn simulated_link(events: mpsc::Sender<HostEvent>, token: CorrelationToken) {
    let mac = ap_client_mac();
    let script = [
        (Duration::from_millis(500), HostEvent::Network(NetworkEvent::Connecting)),
        (Duration::ZERO, HostEvent::Wifi(WifiEvent::StationConnecting(token))),
        (Duration::from_millis(1200), HostEvent::Wifi(WifiEvent::StationConnected(token))),
        (Duration::ZERO, HostEvent::Network(NetworkEvent::Connected)),
        (Duration::from_millis(800), HostEvent::Wifi(WifiEvent::StationIpAcquired(token))),
        (Duration::ZERO, HostEvent::Network(NetworkEvent::IpAcquired)),
        // Scan-done notifications are not mapped and must stay silent.
        (Duration::from_secs(5), HostEvent::Wifi(WifiEvent::Other(6))),
        (
            Duration::from_secs(25),
            HostEvent::Wifi(WifiEvent::ApClientConnected { mac }),
        ),
        (
            Duration::from_secs(60),
            HostEvent::Wifi(WifiEvent::ApClientDisconnected { mac }),
        ),
    ];

    for (wait, event) in script {
        tokio::time::sleep(wait).await;
        if events.send(event).await.is_err() {
            debug!("event receiver dropped, stopping simulated link");
            return;
        }
    }
    info!("simulated link script finished");
}
