//! Sensor client.
//!
//! Wraps a [`SensorRegistry`] behind a single lock, carries its requests
//! out over a [`Transport`], and fans its events out to any number of
//! consumers over a broadcast channel.

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use sensorlink_core::{PacketCodec, Readings, SensorSchema};
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::event::{ConnectionState, SensorEvent};
use crate::registry::{Effects, SensorRegistry};
use crate::transport::{Transport, TransportEvent};

/// Sensor client bound to a transport.
pub struct SensorClient {
    registry: Mutex<SensorRegistry>,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<SensorEvent>,
}

impl SensorClient {
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = SensorRegistry::new(config.topics(), config.discovery_enabled);
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            registry: Mutex::new(registry),
            transport,
            event_tx,
        }
    }

    /// Receive sensor events from now on.
    pub fn events(&self) -> broadcast::Receiver<SensorEvent> {
        self.event_tx.subscribe()
    }

    /// Sensor events as a stream. Lagging consumers skip missed events.
    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = SensorEvent> + Send + 'static>> {
        let mut rx = self.event_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Sensor event stream lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn is_connected(&self) -> bool {
        self.registry.lock().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.registry.lock().state()
    }

    pub fn discovered(&self, name: &str) -> Option<Arc<PacketCodec>> {
        self.registry.lock().discovered(name).cloned()
    }

    pub fn created(&self, name: &str) -> Option<Arc<PacketCodec>> {
        self.registry.lock().created(name).cloned()
    }

    pub fn discovered_names(&self) -> Vec<String> {
        self.registry
            .lock()
            .discovered_names()
            .map(str::to_string)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.registry
            .lock()
            .subscriptions()
            .map(str::to_string)
            .collect()
    }

    /// Register a sensor owned by this client and advertise its schema.
    pub fn create_sensor(&self, name: &str, schema: SensorSchema) -> ClientResult<Arc<PacketCodec>> {
        let mut registry = self.registry.lock();
        let (codec, effects) = registry.create_sensor(name, schema)?;
        self.apply(effects)?;
        Ok(codec)
    }

    /// Remove a created sensor and clear its retained schema.
    pub fn delete_sensor(&self, name: &str) -> ClientResult<()> {
        let mut registry = self.registry.lock();
        let effects = registry.delete_sensor(name);
        self.apply(effects)
    }

    pub fn subscribe_sensor(&self, name: &str) -> ClientResult<()> {
        let mut registry = self.registry.lock();
        let effects = registry.subscribe_sensor(name);
        self.apply(effects)
    }

    pub fn subscribe_all_sensors(&self) -> ClientResult<()> {
        let mut registry = self.registry.lock();
        let effects = registry.subscribe_all_sensors();
        self.apply(effects)
    }

    pub fn unsubscribe_sensor(&self, name: &str) -> ClientResult<()> {
        let mut registry = self.registry.lock();
        let effects = registry.unsubscribe_sensor(name);
        self.apply(effects)
    }

    /// Encode and publish one data packet for a created sensor.
    pub fn publish_data(
        &self,
        name: &str,
        readings: &Readings,
        timestamp: Option<DateTime<Utc>>,
    ) -> ClientResult<()> {
        let registry = self.registry.lock();
        let effects = registry.publish_data(name, readings, timestamp)?;
        self.apply(effects)
    }

    /// Publish pre-encoded channel bytes for a created sensor, prefixed
    /// with a timestamp.
    pub fn publish_raw(
        &self,
        name: &str,
        raw: &[u8],
        timestamp: Option<DateTime<Utc>>,
    ) -> ClientResult<()> {
        let registry = self.registry.lock();
        let effects = registry.publish_raw(name, raw, timestamp)?;
        self.apply(effects)
    }

    /// Feed a transport event into the registry.
    ///
    /// Called by the transport driver, one event at a time. Request
    /// failures are logged, not returned.
    pub fn handle_event(&self, event: TransportEvent) {
        let mut registry = self.registry.lock();
        let effects = match event {
            TransportEvent::Connected => registry.on_connect(),
            TransportEvent::Disconnected { reason } => registry.on_disconnect(&reason),
            TransportEvent::Message { topic, payload } => registry.on_message(&topic, &payload),
        };
        if let Err(e) = self.apply(effects) {
            warn!("Failed to apply transport event effects: {}", e);
        }
    }

    /// Issue requests in order, then deliver events. Must be called with
    /// the registry lock held so effects of concurrent calls never
    /// interleave.
    fn apply(&self, effects: Effects) -> ClientResult<()> {
        let mut first_error = None;
        for request in &effects.requests {
            if let Err(e) = self.transport.execute(request) {
                warn!("Transport request on {} failed: {}", request.topic(), e);
                first_error.get_or_insert(e);
            }
        }
        for event in effects.events {
            // No receivers is not an error
            let _ = self.event_tx.send(event);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
