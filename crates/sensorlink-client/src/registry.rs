//! Sensor registry and lifecycle.
//!
//! The registry keeps two independent tables keyed by sensor name:
//!
//! - **Created**: sensors owned by this client. Their schema is published
//!   (retained) on every connect and cleared on delete.
//! - **Discovered**: sensors learned from metadata messages. Entries are
//!   replaced on a new schema and evicted on an empty or invalid schema,
//!   or when the transport disconnects.
//!
//! A name may be in both tables at once, e.g. when a client subscribes to
//! its own sensor.
//!
//! Every operation is synchronous and returns [`Effects`]: the transport
//! requests to issue and the events to deliver, in order. The registry
//! itself performs no I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sensorlink_core::{PacketCodec, Readings, SensorSchema};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::event::{ConnectionState, SensorEvent};
use crate::topics::{SensorTopic, TopicScheme, ALL_SENSORS};
use crate::transport::{Qos, TransportRequest};

/// Output of a registry operation.
#[derive(Debug, Default)]
pub struct Effects {
    pub requests: Vec<TransportRequest>,
    pub events: Vec<SensorEvent>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.events.is_empty()
    }

    fn publish(&mut self, topic: String, payload: Vec<u8>, qos: Qos, retain: bool) {
        self.requests.push(TransportRequest::Publish {
            topic,
            payload,
            qos,
            retain,
        });
    }

    fn subscribe(&mut self, filter: String, qos: Qos) {
        self.requests.push(TransportRequest::Subscribe { filter, qos });
    }

    fn unsubscribe(&mut self, filter: String) {
        self.requests.push(TransportRequest::Unsubscribe { filter });
    }

    fn emit(&mut self, event: SensorEvent) {
        self.events.push(event);
    }
}

/// Sensor lifecycle state machine.
#[derive(Debug)]
pub struct SensorRegistry {
    topics: TopicScheme,
    discovery_enabled: bool,
    state: ConnectionState,
    created: BTreeMap<String, Arc<PacketCodec>>,
    discovered: BTreeMap<String, Arc<PacketCodec>>,
    subscriptions: BTreeSet<String>,
}

impl SensorRegistry {
    pub fn new(topics: TopicScheme, discovery_enabled: bool) -> Self {
        Self {
            topics,
            discovery_enabled,
            state: ConnectionState::Disconnected,
            created: BTreeMap::new(),
            discovered: BTreeMap::new(),
            subscriptions: BTreeSet::new(),
        }
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn discovery_enabled(&self) -> bool {
        self.discovery_enabled
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn created(&self, name: &str) -> Option<&Arc<PacketCodec>> {
        self.created.get(name)
    }

    pub fn discovered(&self, name: &str) -> Option<&Arc<PacketCodec>> {
        self.discovered.get(name)
    }

    pub fn created_names(&self) -> impl Iterator<Item = &str> {
        self.created.keys().map(String::as_str)
    }

    pub fn discovered_names(&self) -> impl Iterator<Item = &str> {
        self.discovered.keys().map(String::as_str)
    }

    /// Current subscription intent. `#` stands for every sensor.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    // ========================================================================
    // Locally owned sensors
    // ========================================================================

    /// Register a sensor owned by this client, replacing any previous one
    /// of the same name. The schema is published at once when connected,
    /// otherwise on the next connect.
    pub fn create_sensor(
        &mut self,
        name: &str,
        schema: SensorSchema,
    ) -> ClientResult<(Arc<PacketCodec>, Effects)> {
        let codec = Arc::new(PacketCodec::from_schema(schema)?);
        info!(
            "Creating sensor {:?} with {} packets",
            name,
            codec.length()
        );

        self.created.insert(name.to_string(), codec.clone());

        let mut effects = Effects::default();
        if self.is_connected() {
            self.publish_meta(name, &codec, &mut effects);
        }
        Ok((codec, effects))
    }

    /// Remove a created sensor and clear its retained schema.
    ///
    /// Unknown names are ignored.
    pub fn delete_sensor(&mut self, name: &str) -> Effects {
        let mut effects = Effects::default();
        if self.created.remove(name).is_none() {
            debug!("Sensor {:?} was not created here, nothing to delete", name);
            return effects;
        }

        effects.publish(self.topics.meta_topic(name), Vec::new(), Qos::AtLeastOnce, true);
        info!("Sensor {:?} deleted", name);
        effects
    }

    /// Encode readings and publish them on the sensor's data topic.
    pub fn publish_data(
        &self,
        name: &str,
        readings: &Readings,
        timestamp: Option<DateTime<Utc>>,
    ) -> ClientResult<Effects> {
        let codec = self.created_codec(name)?;
        let payload = codec.encode(readings, timestamp)?;
        Ok(self.data_effects(name, payload))
    }

    /// Publish bytes that already match the sensor's wire layout after
    /// the leading timestamp.
    pub fn publish_raw(
        &self,
        name: &str,
        raw: &[u8],
        timestamp: Option<DateTime<Utc>>,
    ) -> ClientResult<Effects> {
        let codec = self.created_codec(name)?;
        let payload = codec.encode_raw(raw, timestamp)?;
        Ok(self.data_effects(name, payload))
    }

    fn created_codec(&self, name: &str) -> ClientResult<&Arc<PacketCodec>> {
        self.created.get(name).ok_or_else(|| {
            ClientError::Precondition(format!("sensor {name:?} has not been created"))
        })
    }

    fn data_effects(&self, name: &str, payload: Vec<u8>) -> Effects {
        let mut effects = Effects::default();
        effects.publish(self.topics.data_topic(name), payload, Qos::AtMostOnce, false);
        effects
    }

    fn publish_meta(&self, name: &str, codec: &PacketCodec, effects: &mut Effects) {
        effects.publish(
            self.topics.meta_topic(name),
            codec.blob().as_bytes().to_vec(),
            Qos::AtLeastOnce,
            true,
        );
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Add a sensor to the subscription intent. Takes effect immediately
    /// when connected and again on every reconnect.
    pub fn subscribe_sensor(&mut self, name: &str) -> Effects {
        let mut effects = Effects::default();
        if !self.subscriptions.insert(name.to_string()) {
            debug!("Already subscribed to sensor {:?}", name);
        }
        if self.is_connected() {
            self.subscribe_requests(name, &mut effects);
        }
        effects
    }

    /// Subscribe to data from every sensor.
    pub fn subscribe_all_sensors(&mut self) -> Effects {
        self.subscribe_sensor(ALL_SENSORS)
    }

    /// Remove a sensor from the subscription intent.
    pub fn unsubscribe_sensor(&mut self, name: &str) -> Effects {
        let mut effects = Effects::default();
        if !self.subscriptions.remove(name) {
            return effects;
        }
        if self.is_connected() {
            effects.unsubscribe(self.topics.data_topic(name));
            if !self.discovery_enabled {
                effects.unsubscribe(self.topics.meta_topic(name));
            }
        }
        effects
    }

    fn subscribe_requests(&self, name: &str, effects: &mut Effects) {
        if !self.discovery_enabled {
            effects.subscribe(self.topics.meta_topic(name), Qos::AtLeastOnce);
        }
        effects.subscribe(self.topics.data_topic(name), Qos::AtMostOnce);
    }

    // ========================================================================
    // Transport events
    // ========================================================================

    /// The transport (re)connected: re-apply subscriptions and republish
    /// every created schema.
    pub fn on_connect(&mut self) -> Effects {
        self.state = ConnectionState::Connected;
        info!(
            "Connected: {} subscriptions, {} created sensors",
            self.subscriptions.len(),
            self.created.len()
        );

        let mut effects = Effects::default();
        if self.discovery_enabled {
            effects.subscribe(self.topics.meta_wildcard(), Qos::AtLeastOnce);
        }
        for name in &self.subscriptions {
            self.subscribe_requests(name, &mut effects);
        }
        for (name, codec) in &self.created {
            self.publish_meta(name, codec, &mut effects);
        }
        effects
    }

    /// The transport lost its connection: every discovered sensor is
    /// forgotten until its schema arrives again.
    pub fn on_disconnect(&mut self, reason: &str) -> Effects {
        if self.is_connected() {
            warn!("Disconnected: {}", reason);
        }
        self.state = ConnectionState::Disconnected;

        let mut effects = Effects::default();
        for name in std::mem::take(&mut self.discovered).into_keys() {
            effects.emit(SensorEvent::Deleted { name });
        }
        effects
    }

    /// Dispatch an incoming message by topic.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> Effects {
        match self.topics.classify(topic) {
            Some(SensorTopic::Meta(name)) => self.on_meta_message(name, payload),
            Some(SensorTopic::Data(name)) => self.on_data_message(name, payload),
            None => {
                debug!("Ignoring message on unrelated topic {}", topic);
                Effects::default()
            }
        }
    }

    /// Handle a schema blob (or an empty deletion marker) for `name`.
    pub fn on_meta_message(&mut self, name: &str, blob: &[u8]) -> Effects {
        let mut effects = Effects::default();

        if blob.is_empty() {
            if self.discovered.remove(name).is_some() {
                info!("Sensor {:?} deleted", name);
                effects.emit(SensorEvent::Deleted {
                    name: name.to_string(),
                });
            } else {
                info!("Sensor {:?} deleted (ignored)", name);
            }
            return effects;
        }

        match self.discovered.get(name) {
            Some(existing) if existing.blob() == blob => {
                debug!("Sensor {:?} metadata refreshed", name);
                return effects;
            }
            Some(_) => info!("New metadata for sensor {:?}", name),
            None => info!("New sensor {:?}", name),
        }

        match PacketCodec::from_blob(blob) {
            Ok(codec) => {
                debug!(
                    "Codec created for {:?} with {} channels",
                    name,
                    codec.channel_count()
                );
                let codec = Arc::new(codec);
                self.discovered.insert(name.to_string(), codec.clone());
                effects.emit(SensorEvent::Discovered {
                    name: name.to_string(),
                    codec,
                });
            }
            Err(e) => {
                warn!("Invalid metadata for sensor {:?}: {}", name, e);
                if self.discovered.remove(name).is_some() {
                    effects.emit(SensorEvent::Deleted {
                        name: name.to_string(),
                    });
                }
            }
        }
        effects
    }

    /// Decode a data packet for a discovered sensor.
    pub fn on_data_message(&mut self, name: &str, payload: &[u8]) -> Effects {
        let mut effects = Effects::default();

        let Some(codec) = self.discovered.get(name) else {
            debug!("Data packet received for unknown sensor {:?}", name);
            return effects;
        };

        match codec.decode(payload) {
            Ok(packet) => {
                debug!("Data packet received for sensor {:?}", name);
                effects.emit(SensorEvent::Data {
                    name: name.to_string(),
                    packet,
                    payload: payload.to_vec(),
                });
            }
            Err(e) => warn!("Malformed data packet for sensor {:?}: {}", name, e),
        }
        effects
    }
}
