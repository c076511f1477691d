//! Connectivity observer.
//!
//! Projects network and Wi-Fi notifications onto log lines. The observer has
//! no state of its own and never touches connectivity, so it can be called at
//! any rate and in any interleaving with a sampling cycle.

use std::sync::Arc;

use crate::host::EventSubscriber;
use crate::log::LogSink;
use crate::model::{format_mac, CorrelationToken, NetworkEvent, WifiEvent};

/// Logs connectivity transitions.
#[derive(Clone)]
pub struct ConnectivityObserver {
    sink: Arc<dyn LogSink>,
}

impl ConnectivityObserver {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Subscribe both handlers on the host. Called once at startup.
    ///
    /// Returns the correlation token the host assigned to the Wi-Fi subscription.
    pub fn attach(&self, host: &mut impl EventSubscriber) -> CorrelationToken {
        let network = self.clone();
        host.subscribe_network(Box::new(move |event: &NetworkEvent| {
            network.on_network_event(event)
        }));

        let wifi = self.clone();
        host.subscribe_wifi(Box::new(move |event: &WifiEvent| wifi.on_wifi_event(event)))
    }

    pub fn on_network_event(&self, event: &NetworkEvent) {
        if let Some(message) = network_message(event) {
            self.sink.info(message);
        }
    }

    pub fn on_wifi_event(&self, event: &WifiEvent) {
        if let Some(message) = wifi_message(event) {
            self.sink.info(&message);
        }
    }
}

fn network_message(event: &NetworkEvent) -> Option<&'static str> {
    match event {
        NetworkEvent::Disconnected => Some("Net disconnected"),
        NetworkEvent::Connecting => Some("Net connecting..."),
        NetworkEvent::Connected => Some("Net connected"),
        NetworkEvent::IpAcquired => Some("Net got IP address"),
        NetworkEvent::Other(_) => None,
    }
}

fn wifi_message(event: &WifiEvent) -> Option<String> {
    let message = match event {
        WifiEvent::StationDisconnected { reason } => {
            format!("WiFi STA disconnected, reason {}", reason)
        }
        WifiEvent::StationConnecting(token) => format!("WiFi STA connecting {}", token),
        WifiEvent::StationConnected(token) => format!("WiFi STA connected {}", token),
        WifiEvent::StationIpAcquired(token) => format!("WiFi STA IP acquired {}", token),
        WifiEvent::ApClientConnected { mac } => {
            format!("WiFi AP STA connected MAC {}", format_mac(mac))
        }
        WifiEvent::ApClientDisconnected { mac } => {
            format!("WiFi AP STA disconnected MAC {}", format_mac(mac))
        }
        WifiEvent::Other(_) => return None,
    };
    Some(message)
}
