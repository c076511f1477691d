//! Sampling cycle controller.
//!
//! Every timer tick runs one fresh [`SamplingCycle`]:
//!
//! ```text
//! Idle -> StatsLogged -> Acquiring -> Settling -> Reading -> Released -> CycleComplete
//!                            |                                              ^
//!                            +------------- sensor missing -----------------+
//! ```
//!
//! The cycle is a plain state machine driven by [`SamplingCycle::advance`].
//! Settling is the only suspension point: `advance` returns [`Step::Suspend`]
//! and the driver decides how to wait (a blocking delay on firmware, a timer
//! future under tokio). Nothing survives from one cycle to the next.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::AgentConfig;
use crate::error::SensorError;
use crate::host::{Delay, DeviceInfo, SensorBus, SensorHandle};
use crate::log::LogSink;
use crate::model::SensorReading;

/// Position of a cycle in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    StatsLogged,
    Acquiring,
    Settling,
    Reading,
    Released,
    CycleComplete,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// All three quantities were read.
    Sampled(SensorReading),
    /// Acquisition failed; the rest of the cycle was skipped.
    SensorMissing,
    /// Acquisition succeeded but a read failed or returned an impossible value.
    ReadFailed(SensorError),
}

/// What the driver must do after a call to [`SamplingCycle::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Call `advance` again right away.
    Continue,
    /// Wait this long, then call `advance` again.
    Suspend(Duration),
    /// The cycle is over.
    Complete(CycleOutcome),
}

/// Scoped ownership of an acquired sensor.
///
/// Released exactly once: explicitly through [`release`](Self::release), or on
/// drop if the cycle is abandoned while holding it.
struct SensorGuard<H: SensorHandle> {
    handle: Option<H>,
}

impl<H: SensorHandle> SensorGuard<H> {
    fn new(handle: H) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn read(&mut self, pressure_divisor: f64) -> Result<SensorReading, SensorError> {
        match self.handle.as_mut() {
            Some(handle) => read_reading(handle, pressure_divisor),
            None => Err(SensorError::Bus("sensor already released".to_string())),
        }
    }

    fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl<H: SensorHandle> Drop for SensorGuard<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}

/// One acquire -> settle -> read -> release pass over the sensor.
pub struct SamplingCycle<'a, B: SensorBus, D: DeviceInfo> {
    bus: &'a mut B,
    device: &'a D,
    sink: &'a dyn LogSink,
    config: &'a AgentConfig,
    state: CycleState,
    guard: Option<SensorGuard<B::Handle>>,
    reading: Option<Result<SensorReading, SensorError>>,
    outcome: Option<CycleOutcome>,
}

impl<'a, B: SensorBus, D: DeviceInfo> SamplingCycle<'a, B, D> {
    pub fn new(
        bus: &'a mut B,
        device: &'a D,
        sink: &'a dyn LogSink,
        config: &'a AgentConfig,
    ) -> Self {
        Self {
            bus,
            device,
            sink,
            config,
            state: CycleState::Idle,
            guard: None,
            reading: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run the next transition.
    pub fn advance(&mut self) -> Step {
        match self.state {
            CycleState::Idle => {
                let stats = self.device.snapshot();
                self.sink.info(&stats.to_string());
                self.transition(CycleState::StatsLogged);
                Step::Continue
            }
            CycleState::StatsLogged => {
                self.transition(CycleState::Acquiring);
                Step::Continue
            }
            CycleState::Acquiring => match self.bus.acquire(self.config.sensor_address) {
                Ok(handle) => {
                    self.guard = Some(SensorGuard::new(handle));
                    self.sink.info(&format!(
                        "Found sensor. Waiting {} seconds before taking readings...",
                        self.config.settle_delay_ms as f64 / 1000.0
                    ));
                    self.transition(CycleState::Settling);
                    Step::Suspend(self.config.settle_delay())
                }
                Err(e) => {
                    debug!(error = %e, "sensor acquisition failed");
                    self.sink.error("Can't find sensor, skipping iteration");
                    self.complete(CycleOutcome::SensorMissing)
                }
            },
            CycleState::Settling => {
                self.transition(CycleState::Reading);
                Step::Continue
            }
            CycleState::Reading => {
                let divisor = self.config.pressure_divisor;
                self.reading = self.guard.as_mut().map(|guard| guard.read(divisor));
                if let Some(guard) = self.guard.take() {
                    guard.release();
                }
                self.transition(CycleState::Released);
                Step::Continue
            }
            CycleState::Released => {
                let outcome = match self.reading.take() {
                    Some(Ok(reading)) => {
                        self.sink.info(&format!("Readings - {}", reading));
                        CycleOutcome::Sampled(reading)
                    }
                    Some(Err(e)) => {
                        self.sink.error(&format!("Sensor read failed: {}", e));
                        CycleOutcome::ReadFailed(e)
                    }
                    None => {
                        let e = SensorError::Bus("sensor handle missing".to_string());
                        self.sink.error(&format!("Sensor read failed: {}", e));
                        CycleOutcome::ReadFailed(e)
                    }
                };
                self.complete(outcome)
            }
            CycleState::CycleComplete => {
                Step::Complete(self.outcome.clone().unwrap_or(CycleOutcome::SensorMissing))
            }
        }
    }

    fn transition(&mut self, next: CycleState) {
        debug!(from = ?self.state, to = ?next, "sampling cycle transition");
        self.state = next;
    }

    fn complete(&mut self, outcome: CycleOutcome) -> Step {
        self.transition(CycleState::CycleComplete);
        self.outcome = Some(outcome.clone());
        Step::Complete(outcome)
    }
}

/// Owns the sensor bus and runs one cycle per timer tick.
///
/// A cycle borrows the controller mutably for its whole duration, so at most
/// one cycle can hold the bus at a time even on a multi-threaded host.
pub struct SamplingController<B: SensorBus, D: DeviceInfo> {
    bus: B,
    device: D,
    sink: Arc<dyn LogSink>,
    config: AgentConfig,
}

impl<B: SensorBus, D: DeviceInfo> SamplingController<B, D> {
    pub fn new(bus: B, device: D, sink: Arc<dyn LogSink>, config: AgentConfig) -> Self {
        Self {
            bus,
            device,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Start a fresh cycle in the `Idle` state.
    pub fn cycle(&mut self) -> SamplingCycle<'_, B, D> {
        SamplingCycle::new(&mut self.bus, &self.device, self.sink.as_ref(), &self.config)
    }

    /// Run a whole cycle, blocking on `delay` while the sensor settles.
    pub fn run_blocking(&mut self, delay: &mut impl Delay) -> CycleOutcome {
        let mut cycle = self.cycle();
        loop {
            match cycle.advance() {
                Step::Continue => {}
                Step::Suspend(duration) => {
                    delay.delay_ms(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX))
                }
                Step::Complete(outcome) => return outcome,
            }
        }
    }
}

const TEMPERATURE_RANGE_C: (f64, f64) = (-40.0, 85.0);
const HUMIDITY_RANGE_RH: (f64, f64) = (0.0, 100.0);
const PRESSURE_RANGE_KPA: (f64, f64) = (30.0, 110.0);

/// Issue all three reads, then check them.
fn read_reading<H: SensorHandle>(
    handle: &mut H,
    pressure_divisor: f64,
) -> Result<SensorReading, SensorError> {
    let temperature = handle.read_temperature();
    let humidity = handle.read_humidity();
    let pressure = handle.read_pressure();

    let (temperature, humidity, pressure) = (temperature?, humidity?, pressure?);

    Ok(SensorReading {
        temperature_c: plausible(
            "temperature",
            temperature,
            f64::from(temperature),
            TEMPERATURE_RANGE_C,
        )?,
        humidity_rh: plausible("humidity", humidity, f64::from(humidity), HUMIDITY_RANGE_RH)?,
        pressure_kpa: plausible(
            "pressure",
            pressure,
            pressure_to_kpa(pressure, pressure_divisor),
            PRESSURE_RANGE_KPA,
        )?,
    })
}

/// Check `value` against `(min, max)`; errors carry the `raw` sensor value.
fn plausible(
    quantity: &'static str,
    raw: f32,
    value: f64,
    (min, max): (f64, f64),
) -> Result<f64, SensorError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SensorError::Implausible { quantity, value: raw })
    }
}

/// Convert raw pressure to kPa, rounded half away from zero to 0.01 kPa.
///
/// Rounding happens in raw units so that exact halves such as 101325 Pa stay exact.
pub fn pressure_to_kpa(raw: f32, divisor: f64) -> f64 {
    (f64::from(raw) * 100.0 / divisor).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{RecordingSink, Severity};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Acquire(u8),
        Temperature,
        Humidity,
        Pressure,
        Release,
    }

    #[derive(Clone, Default)]
    struct MockBus {
        present: bool,
        temperature: f32,
        humidity: f32,
        pressure: f32,
        failing: Option<Call>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    struct MockHandle {
        bus: MockBus,
    }

    impl MockBus {
        fn present(temperature: f32, humidity: f32, pressure: f32) -> Self {
            Self {
                present: true,
                temperature,
                humidity,
                pressure,
                ..Default::default()
            }
        }

        fn failing_on(mut self, call: Call) -> Self {
            self.failing = Some(call);
            self
        }

        fn value(&self, call: Call, value: f32) -> Result<f32, SensorError> {
            let failed = self.failing.as_ref() == Some(&call);
            self.record(call);
            if failed {
                Err(SensorError::Bus("i2c nack".to_string()))
            } else {
                Ok(value)
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl SensorBus for MockBus {
        type Handle = MockHandle;

        fn acquire(&mut self, address: u8) -> Result<MockHandle, SensorError> {
            self.record(Call::Acquire(address));
            if self.present {
                Ok(MockHandle { bus: self.clone() })
            } else {
                Err(SensorError::NotFound { address })
            }
        }
    }

    impl SensorHandle for MockHandle {
        fn read_temperature(&mut self) -> Result<f32, SensorError> {
            self.bus.value(Call::Temperature, self.bus.temperature)
        }

        fn read_humidity(&mut self) -> Result<f32, SensorError> {
            self.bus.value(Call::Humidity, self.bus.humidity)
        }

        fn read_pressure(&mut self) -> Result<f32, SensorError> {
            self.bus.value(Call::Pressure, self.bus.pressure)
        }

        fn release(self) {
            self.bus.record(Call::Release);
        }
    }

    struct StaticInfo;

    impl DeviceInfo for StaticInfo {
        fn device_id(&self) -> String {
            "node-1".to_string()
        }

        fn uptime_secs(&self) -> f64 {
            10.0
        }

        fn heap_total_bytes(&self) -> u64 {
            1000
        }

        fn heap_free_bytes(&self) -> u64 {
            400
        }
    }

    fn controller(bus: MockBus) -> (SamplingController<MockBus, StaticInfo>, RecordingSink) {
        let sink = RecordingSink::new();
        let controller = SamplingController::new(
            bus,
            StaticInfo,
            Arc::new(sink.clone()),
            AgentConfig::default(),
        );
        (controller, sink)
    }

    #[test]
    fn test_states_visited_in_order() {
        let (mut controller, _sink) = controller(MockBus::present(21.0, 40.0, 100_000.0));
        let mut cycle = controller.cycle();
        let mut states = vec![cycle.state()];

        loop {
            let step = cycle.advance();
            states.push(cycle.state());
            if let Step::Complete(_) = step {
                break;
            }
        }

        assert_eq!(
            states,
            vec![
                CycleState::Idle,
                CycleState::StatsLogged,
                CycleState::Acquiring,
                CycleState::Settling,
                CycleState::Reading,
                CycleState::Released,
                CycleState::CycleComplete,
            ]
        );
    }

    #[test]
    fn test_settling_is_the_only_suspension() {
        let (mut controller, _sink) = controller(MockBus::present(21.0, 40.0, 100_000.0));
        let mut cycle = controller.cycle();
        let mut suspensions = Vec::new();

        loop {
            match cycle.advance() {
                Step::Continue => {}
                Step::Suspend(d) => {
                    assert_eq!(cycle.state(), CycleState::Settling);
                    suspensions.push(d);
                }
                Step::Complete(_) => break,
            }
        }

        assert_eq!(suspensions, vec![Duration::from_millis(2000)]);
    }

    #[test]
    fn test_missing_sensor_skips_without_release() {
        let bus = MockBus::default();
        let (mut controller, sink) = controller(bus.clone());
        let mut delays = Vec::new();

        let outcome = controller.run_blocking(&mut |ms: u32| delays.push(ms));

        assert_eq!(outcome, CycleOutcome::SensorMissing);
        assert_eq!(bus.calls(), vec![Call::Acquire(0x76)]);
        assert!(delays.is_empty());
        assert_eq!(sink.severities(), vec![Severity::Info, Severity::Error]);
        assert_eq!(sink.messages()[1], "Can't find sensor, skipping iteration");
    }

    #[test]
    fn test_complete_is_sticky() {
        let (mut controller, _sink) = controller(MockBus::default());
        let mut cycle = controller.cycle();
        while !matches!(cycle.advance(), Step::Complete(_)) {}
        assert_eq!(cycle.advance(), Step::Complete(CycleOutcome::SensorMissing));
    }

    #[test]
    fn test_nan_reading_is_read_failure_and_still_releases() {
        let bus = MockBus::present(f32::NAN, 40.0, 100_000.0);
        let (mut controller, sink) = controller(bus.clone());

        let outcome = controller.run_blocking(&mut |_ms: u32| {});

        assert!(matches!(
            outcome,
            CycleOutcome::ReadFailed(SensorError::Implausible {
                quantity: "temperature",
                ..
            })
        ));
        assert_eq!(
            bus.calls(),
            vec![
                Call::Acquire(0x76),
                Call::Temperature,
                Call::Humidity,
                Call::Pressure,
                Call::Release,
            ]
        );
        assert_eq!(sink.severities().last(), Some(&Severity::Error));
        assert!(sink.messages().last().unwrap().starts_with("Sensor read failed"));
    }

    #[test]
    fn test_bus_error_is_read_failure_and_still_releases() {
        let bus = MockBus::present(21.0, 40.0, 100_000.0).failing_on(Call::Humidity);
        let (mut controller, sink) = controller(bus.clone());

        let outcome = controller.run_blocking(&mut |_ms: u32| {});

        assert_eq!(
            outcome,
            CycleOutcome::ReadFailed(SensorError::Bus("i2c nack".to_string()))
        );
        assert_eq!(
            bus.calls(),
            vec![
                Call::Acquire(0x76),
                Call::Temperature,
                Call::Humidity,
                Call::Pressure,
                Call::Release,
            ]
        );
        assert_eq!(
            sink.messages().last().unwrap(),
            &format!("Sensor read failed: {}", SensorError::Bus("i2c nack".to_string()))
        );
        assert_eq!(sink.severities().last(), Some(&Severity::Error));
    }

    #[test]
    fn test_pressure_range_follows_divisor() {
        // Sensor reporting hectopascals.
        let bus = MockBus::present(21.0, 40.0, 1013.25);
        let sink = RecordingSink::new();
        let config = AgentConfig {
            pressure_divisor: 10.0,
            ..Default::default()
        };
        config.validate().unwrap();
        let mut controller =
            SamplingController::new(bus, StaticInfo, Arc::new(sink.clone()), config);

        let outcome = controller.run_blocking(&mut |_ms: u32| {});

        match outcome {
            CycleOutcome::Sampled(reading) => assert_eq!(reading.pressure_kpa, 101.33),
            other => panic!("expected a reading, got {other:?}"),
        }
        assert!(sink.severities().iter().all(|s| *s == Severity::Info));
    }

    #[test]
    fn test_pressure_outside_range_is_implausible() {
        let bus = MockBus::present(21.0, 40.0, 20_000.0);
        let (mut controller, _sink) = controller(bus);

        let outcome = controller.run_blocking(&mut |_ms: u32| {});

        assert_eq!(
            outcome,
            CycleOutcome::ReadFailed(SensorError::Implausible {
                quantity: "pressure",
                value: 20_000.0,
            })
        );
    }

    #[test]
    fn test_dropping_settling_cycle_releases_sensor() {
        let bus = MockBus::present(21.0, 40.0, 100_000.0);
        let (mut controller, _sink) = controller(bus.clone());
        {
            let mut cycle = controller.cycle();
            while !matches!(cycle.advance(), Step::Suspend(_)) {}
        }
        assert_eq!(bus.calls(), vec![Call::Acquire(0x76), Call::Release]);
    }

    #[test]
    fn test_pressure_to_kpa_rounds_exact_half_up() {
        assert_eq!(pressure_to_kpa(101_325.0, 1000.0), 101.33);
        assert_eq!(pressure_to_kpa(98_760.0, 1000.0), 98.76);
    }
}
