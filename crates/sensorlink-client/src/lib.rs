//! Sensor Client Crate
//!
//! Publish/subscribe sensor lifecycle on top of `sensorlink-core`.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `mqtt` | ✅ | MQTT transport (rumqttc) |
//!
//! ## Architecture
//!
//! - **SensorRegistry**: pure state machine over Created/Discovered sensors
//!   and the subscription intent
//! - **SensorClient**: registry behind one lock, a transport, and an event
//!   broadcast channel
//! - **Transport**: non-blocking publish/subscribe contract; `MqttTransport`
//!   and `MqttDriver` implement it over MQTT

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod topics;
pub mod transport;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use client::SensorClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use event::{ConnectionState, SensorEvent};
pub use registry::{Effects, SensorRegistry};
pub use topics::{SensorTopic, TopicScheme, ALL_SENSORS};
pub use transport::{Qos, Transport, TransportEvent, TransportRequest};

#[cfg(feature = "mqtt")]
pub use mqtt::{connect_mqtt, MqttDriver, MqttTransport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
