//! The two contracts spoken between a host and its plugins.
//!
//! - [`HostContract`] is published by the host; plugins call it.
//! - [`PluginCallbackContract`] is published by each plugin; the host calls it
//!   to deliver [`HostEvent`]s.

use serde::{Deserialize, Serialize};

use super::Contract;
use crate::domain::host::{HostEvent, HostEventKind, HostWindow, SubscriptionId};

/// Marker for the host-side service.
#[derive(Debug, Clone, Copy)]
pub enum HostContract {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostRequest {
    /// Liveness check; the host answers `Pong("pong")`.
    Ping,
    /// The host's current main window, if it has one.
    HostInfo,
    /// Register a callback channel for the given event kinds.
    ///
    /// An empty `events` list subscribes to every kind.
    Subscribe {
        events: Vec<HostEventKind>,
        callback_channel: String,
        callback_port: Option<String>,
    },
    Unsubscribe(SubscriptionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostResponse {
    Pong(String),
    HostInfo(Option<HostWindow>),
    Subscribed(SubscriptionId),
    /// `true` if the subscription existed.
    Unsubscribed(bool),
}

impl Contract for HostContract {
    const NAME: &'static str = "interop.host.v1";
    type Request = HostRequest;
    type Response = HostResponse;
}

/// Marker for the plugin-side callback service.
#[derive(Debug, Clone, Copy)]
pub enum PluginCallbackContract {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginCallbackRequest {
    Notify(HostEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginCallbackResponse {
    Ack,
}

impl Contract for PluginCallbackContract {
    const NAME: &'static str = "interop.plugin-callback.v1";
    type Request = PluginCallbackRequest;
    type Response = PluginCallbackResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{decode_payload, encode_payload};

    #[test]
    fn test_contract_names_differ() {
        assert_ne!(HostContract::NAME, PluginCallbackContract::NAME);
    }

    #[test]
    fn test_subscribe_request_survives_bincode() {
        let request = HostRequest::Subscribe {
            events: vec![HostEventKind::Started, HostEventKind::Stopped],
            callback_channel: "abcDEF0123456789xyzQ".to_string(),
            callback_port: None,
        };

        let bytes = encode_payload(&request).expect("encode");
        let decoded: HostRequest = decode_payload(&bytes).expect("decode");

        assert_eq!(decoded, request);
    }
}
