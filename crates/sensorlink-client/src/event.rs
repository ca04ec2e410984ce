//! Sensor events delivered to consumers.

use std::fmt;
use std::sync::Arc;

use sensorlink_core::{DataPacket, PacketCodec};

/// Event emitted by the sensor registry.
///
/// Events are produced in the order the transport reported the messages
/// that caused them.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// A sensor was seen for the first time, or its schema changed
    Discovered {
        name: String,
        codec: Arc<PacketCodec>,
    },

    /// A discovered sensor is gone (deleted, invalid schema, or disconnect)
    Deleted { name: String },

    /// A data packet from a discovered sensor
    Data {
        name: String,
        packet: DataPacket,
        /// Undecoded packet bytes
        payload: Vec<u8>,
    },
}

impl SensorEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::Discovered { name, .. } | Self::Deleted { name } | Self::Data { name, .. } => {
                name
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovered { .. } => "discovered",
            Self::Deleted { .. } => "deleted",
            Self::Data { .. } => "data",
        }
    }
}

/// Transport connection state as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
