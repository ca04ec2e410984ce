//! Transport contract.
//!
//! The registry never talks to a broker directly. It emits
//! [`TransportRequest`]s and reacts to [`TransportEvent`]s; a [`Transport`]
//! carries the requests out. Calls must not block: a transport queues the
//! request and returns, leaving delivery and reconnects to itself.

use crate::error::ClientResult;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// Outgoing request produced by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    },
    Subscribe {
        filter: String,
        qos: Qos,
    },
    Unsubscribe {
        filter: String,
    },
}

impl TransportRequest {
    /// Topic or filter the request applies to.
    pub fn topic(&self) -> &str {
        match self {
            Self::Publish { topic, .. } => topic,
            Self::Subscribe { filter, .. } | Self::Unsubscribe { filter } => filter,
        }
    }
}

/// Connection edge or message reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Message { topic: String, payload: Vec<u8> },
}

/// Fire-and-forget publish/subscribe transport.
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> ClientResult<()>;

    fn subscribe(&self, filter: &str, qos: Qos) -> ClientResult<()>;

    fn unsubscribe(&self, filter: &str) -> ClientResult<()>;

    /// Carry out a registry request.
    fn execute(&self, request: &TransportRequest) -> ClientResult<()> {
        match request {
            TransportRequest::Publish {
                topic,
                payload,
                qos,
                retain,
            } => self.publish(topic, payload, *qos, *retain),
            TransportRequest::Subscribe { filter, qos } => self.subscribe(filter, *qos),
            TransportRequest::Unsubscribe { filter } => self.unsubscribe(filter),
        }
    }
}
