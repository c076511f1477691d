//! The agent event loop.
//!
//! One task consumes host events and timer ticks. Each one is handled to
//! completion before the next is looked at, so a sampling cycle that is
//! waiting for the sensor to settle holds up every other event, exactly like
//! a single-threaded firmware dispatcher would.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use envnode_core::{
    AgentConfig, ConfigError, ConnectivityObserver, CorrelationToken, CycleOutcome, DeviceInfo,
    HostEvent, LogSink, SamplingController, SamplingCycle, SensorBus, Step,
};

use crate::event_bus::EventBus;

/// Run a sampling cycle to completion, sleeping on the tokio timer while the
/// sensor settles.
///
/// Dropping the future mid-cycle drops the cycle, which releases the sensor.
pub async fn drive_cycle<B: SensorBus, D: DeviceInfo>(
    mut cycle: SamplingCycle<'_, B, D>,
) -> CycleOutcome {
    loop {
        match cycle.advance() {
            Step::Continue => {}
            Step::Suspend(duration) => {
                debug!(?duration, "sampling cycle suspended");
                tokio::time::sleep(duration).await;
            }
            Step::Complete(outcome) => return outcome,
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub cycles: u64,
    pub sampled: u64,
    pub sensor_missing: u64,
    pub read_failed: u64,
    pub events: u64,
}

impl AgentStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Sampled(_) => self.sampled += 1,
            CycleOutcome::SensorMissing => self.sensor_missing += 1,
            CycleOutcome::ReadFailed(_) => self.read_failed += 1,
        }
    }
}

/// Connectivity observer and sampling controller wired to one event loop.
pub struct Agent<B: SensorBus, D: DeviceInfo> {
    events: EventBus,
    controller: SamplingController<B, D>,
    wifi_token: CorrelationToken,
    stats: AgentStats,
}

impl<B: SensorBus, D: DeviceInfo> Agent<B, D> {
    /// Build the agent and subscribe the observer to the event bus.
    ///
    /// Fails if `config` does not pass [`AgentConfig::validate`].
    pub fn new(
        sensor: B,
        device: D,
        sink: Arc<dyn LogSink>,
        config: AgentConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut events = EventBus::new();
        let observer = ConnectivityObserver::new(sink.clone());
        let wifi_token = observer.attach(&mut events);
        let controller = SamplingController::new(sensor, device, sink, config);

        Ok(Self {
            events,
            controller,
            wifi_token,
            stats: AgentStats::default(),
        })
    }

    /// Token the host passes to Wi-Fi station events for this agent.
    pub fn wifi_token(&self) -> CorrelationToken {
        self.wifi_token
    }

    pub fn config(&self) -> &AgentConfig {
        self.controller.config()
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    /// Handle one host event to completion.
    ///
    /// A timer tick runs a full sampling cycle and returns its outcome.
    pub async fn handle(&mut self, event: HostEvent) -> Option<CycleOutcome> {
        match event {
            HostEvent::TimerTick => {
                let outcome = drive_cycle(self.controller.cycle()).await;
                self.stats.record(&outcome);
                Some(outcome)
            }
            other => {
                self.stats.events += 1;
                self.events.publish(&other);
                None
            }
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// The sample timer first fires one period after start. Ticks that would
    /// have fired while a cycle was running are pushed back rather than
    /// bunched up. If the event channel closes, sampling carries on until
    /// shutdown.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<HostEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> AgentStats {
        let period = self.controller.config().sample_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut events_open = true;

        info!(period_ms = period.as_millis() as u64, "agent running");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.handle(HostEvent::TimerTick).await;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.handle(event).await;
                    }
                    None => {
                        warn!("host event channel closed, sampling continues");
                        events_open = false;
                    }
                },
            }
        }

        info!(
            cycles = self.stats.cycles,
            sampled = self.stats.sampled,
            sensor_missing = self.stats.sensor_missing,
            read_failed = self.stats.read_failed,
            events = self.stats.events,
            "agent stopped"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ProcessInfo, SimulatedSensorBus};
    use envnode_core::{NetworkEvent, RecordingSink, Severity};
    use std::time::Duration;

    fn agent(present: bool) -> (Agent<SimulatedSensorBus, ProcessInfo>, RecordingSink) {
        let sink = RecordingSink::new();
        let agent = Agent::new(
            SimulatedSensorBus::new(present),
            ProcessInfo::new("test-node"),
            Arc::new(sink.clone()),
            AgentConfig::default(),
        )
        .unwrap();
        (agent, sink)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = AgentConfig {
            sample_interval_ms: 0,
            ..Default::default()
        };

        let result = Agent::new(
            SimulatedSensorBus::new(true),
            ProcessInfo::new("test-node"),
            Arc::new(RecordingSink::new()),
            config,
        );

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_waits_for_settle_delay() {
        let (mut agent, sink) = agent(true);
        let start = Instant::now();

        let outcome = agent.handle(HostEvent::TimerTick).await;

        assert!(matches!(outcome, Some(CycleOutcome::Sampled(_))));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(2000), "waited {waited:?}");
        assert!(waited < Duration::from_millis(2100), "waited {waited:?}");
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_sensor_does_not_sleep() {
        let (mut agent, sink) = agent(false);
        let start = Instant::now();

        let outcome = agent.handle(HostEvent::TimerTick).await;

        assert_eq!(outcome, Some(CycleOutcome::SensorMissing));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(sink.severities(), vec![Severity::Info, Severity::Error]);
        assert_eq!(agent.stats().sensor_missing, 1);
    }

    #[tokio::test]
    async fn test_network_event_goes_to_observer() {
        let (mut agent, sink) = agent(true);

        let outcome = agent.handle(HostEvent::Network(NetworkEvent::Connecting)).await;

        assert_eq!(outcome, None);
        assert_eq!(sink.messages(), vec!["Net connecting...".to_string()]);
        assert_eq!(agent.stats().events, 1);
    }
}
