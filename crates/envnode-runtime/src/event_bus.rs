//! In-process event bus.
//!
//! Plays the part of the host's event loop: handlers are registered once at
//! startup and every published event runs each matching handler to completion,
//! in subscription order, before `publish` returns.

use tracing::trace;

use envnode_core::host::{NetworkHandler, WifiHandler};
use envnode_core::{CorrelationToken, EventSubscriber, HostEvent};

/// Base value for the correlation tokens handed out to Wi-Fi subscribers.
const TOKEN_BASE: usize = 0x1000;

#[derive(Default)]
pub struct EventBus {
    network: Vec<NetworkHandler>,
    wifi: Vec<(CorrelationToken, WifiHandler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_subscribers(&self) -> usize {
        self.network.len()
    }

    pub fn wifi_subscribers(&self) -> usize {
        self.wifi.len()
    }

    /// Deliver one event to every subscriber of its kind.
    ///
    /// Returns the number of handlers invoked. Timer ticks have no subscribers
    /// here; the agent drives the sampling cycle itself.
    pub fn publish(&mut self, event: &HostEvent) -> usize {
        match event {
            HostEvent::Network(network) => {
                for handler in self.network.iter_mut() {
                    handler(network);
                }
                trace!(?network, handlers = self.network.len(), "network event delivered");
                self.network.len()
            }
            HostEvent::Wifi(wifi) => {
                for (_, handler) in self.wifi.iter_mut() {
                    handler(wifi);
                }
                trace!(?wifi, handlers = self.wifi.len(), "wifi event delivered");
                self.wifi.len()
            }
            HostEvent::TimerTick => 0,
        }
    }
}

impl EventSubscriber for EventBus {
    fn subscribe_network(&mut self, handler: NetworkHandler) {
        self.network.push(handler);
    }

    fn subscribe_wifi(&mut self, handler: WifiHandler) -> CorrelationToken {
        let token = CorrelationToken(TOKEN_BASE + self.wifi.len());
        self.wifi.push((token, handler));
        token
    }
}
