//! MQTT transport.
//!
//! [`MqttTransport`] hands requests to an unbounded queue without
//! waiting. [`MqttDriver`] owns the `rumqttc` client and event loop: a
//! forwarding task awaits each queued request on the client while the
//! driver polls the broker, turns connection edges and publishes into
//! [`TransportEvent`]s, and keeps polling after errors so `rumqttc` can
//! reconnect. A reconnect burst larger than the `rumqttc` request queue
//! waits for the event loop instead of being dropped.
//!
//! ```no_run
//! # async fn run() -> sensorlink_client::ClientResult<()> {
//! use sensorlink_client::{connect_mqtt, ClientConfig};
//!
//! let (client, driver) = connect_mqtt(&ClientConfig::default())?;
//! client.subscribe_all_sensors()?;
//! driver.run(client).await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::SensorClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Qos, Transport, TransportEvent, TransportRequest};

/// Largest packet accepted or sent, in bytes.
const MAX_PACKET_SIZE: usize = 1024 * 1024;

impl From<Qos> for QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
        }
    }
}

/// [`Transport`] feeding the request queue of an [`MqttDriver`].
#[derive(Clone)]
pub struct MqttTransport {
    requests: mpsc::UnboundedSender<TransportRequest>,
}

impl MqttTransport {
    /// Create a transport and the receiving end its driver forwards from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> ClientResult<()> {
        self.execute(&TransportRequest::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        })
    }

    fn subscribe(&self, filter: &str, qos: Qos) -> ClientResult<()> {
        self.execute(&TransportRequest::Subscribe {
            filter: filter.to_string(),
            qos,
        })
    }

    fn unsubscribe(&self, filter: &str) -> ClientResult<()> {
        self.execute(&TransportRequest::Unsubscribe {
            filter: filter.to_string(),
        })
    }

    fn execute(&self, request: &TransportRequest) -> ClientResult<()> {
        self.requests.send(request.clone()).map_err(|_| {
            ClientError::Transport(format!(
                "MQTT driver stopped, dropping request on {}",
                request.topic()
            ))
        })
    }
}

/// Await each queued request on the `rumqttc` client, in order.
async fn forward_requests(client: AsyncClient, mut requests: mpsc::UnboundedReceiver<TransportRequest>) {
    while let Some(request) = requests.recv().await {
        let result = match &request {
            TransportRequest::Publish {
                topic,
                payload,
                qos,
                retain,
            } => client.publish(topic, (*qos).into(), *retain, payload.clone()).await,
            TransportRequest::Subscribe { filter, qos } => client.subscribe(filter, (*qos).into()).await,
            TransportRequest::Unsubscribe { filter } => client.unsubscribe(filter).await,
        };
        if let Err(e) = result {
            warn!("MQTT request on {} failed: {}", request.topic(), e);
        }
    }
    debug!("MQTT request queue closed");
}

/// Aborts the forwarding task when the driver future is dropped.
struct ForwarderGuard(JoinHandle<()>);

impl Drop for ForwarderGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives the MQTT event loop for one [`SensorClient`].
pub struct MqttDriver {
    eventloop: EventLoop,
    mqtt: AsyncClient,
    requests: mpsc::UnboundedReceiver<TransportRequest>,
    broker: String,
    reconnect_delay: Duration,
}

impl MqttDriver {
    /// Poll the broker forever (foreground mode).
    pub async fn run(self, client: Arc<SensorClient>) {
        let MqttDriver {
            mut eventloop,
            mqtt,
            requests,
            broker,
            reconnect_delay,
        } = self;
        let _forwarder = ForwarderGuard(tokio::spawn(forward_requests(mqtt, requests)));

        info!("Connecting to MQTT broker {}", broker);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!("MQTT broker {} connection acknowledged", broker);
                        client.handle_event(TransportEvent::Connected);
                    } else {
                        warn!("MQTT broker {} refused connection: {:?}", broker, ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(
                        "Received MQTT message on topic: {}, payload length: {}",
                        publish.topic,
                        publish.payload.len()
                    );
                    client.handle_event(TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    client.handle_event(TransportEvent::Disconnected {
                        reason: "broker sent disconnect".into(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    if client.is_connected() {
                        client.handle_event(TransportEvent::Disconnected {
                            reason: e.to_string(),
                        });
                    }
                    warn!("MQTT broker {} error: {}", broker, e);
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    }

    /// Poll the broker on a background task.
    pub fn spawn(self, client: Arc<SensorClient>) -> JoinHandle<()> {
        tokio::spawn(self.run(client))
    }
}

/// Build MQTT options from the client configuration.
pub fn mqtt_options(config: &ClientConfig) -> MqttOptions {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("sensorlink-{}", Uuid::new_v4()));

    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive_duration());
    options.set_clean_session(true);
    options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }
    options
}

/// Create a sensor client connected to the configured broker.
///
/// Nothing happens on the network until the returned driver runs.
pub fn connect_mqtt(config: &ClientConfig) -> ClientResult<(Arc<SensorClient>, MqttDriver)> {
    config.validate()?;

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options(config), config.request_capacity);
    let (transport, requests) = MqttTransport::channel();
    let client = Arc::new(SensorClient::new(config, Arc::new(transport)));

    let driver = MqttDriver {
        eventloop,
        mqtt,
        requests,
        broker: config.broker_addr(),
        reconnect_delay: config.reconnect_delay(),
    };
    Ok((client, driver))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_options() {
        let config = ClientConfig::new("broker.local", 1884)
            .with_client_id("bench-node")
            .with_keep_alive(30);
        let options = mqtt_options(&config);
        assert_eq!(options.client_id(), "bench-node");
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
    }

    #[test]
    fn test_generated_client_id() {
        let options = mqtt_options(&ClientConfig::default());
        assert!(options.client_id().starts_with("sensorlink-"));
    }

    #[tokio::test]
    async fn test_requests_queue_without_broker() {
        let (client, _driver) = connect_mqtt(&ClientConfig::default()).unwrap();
        // Nothing polls the event loop, so requests just sit in the queue
        client.subscribe_sensor("temp").unwrap();
        assert_eq!(client.subscriptions(), vec!["temp".to_string()]);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_burst_larger_than_request_queue() {
        let config = ClientConfig {
            request_capacity: 4,
            ..ClientConfig::default()
        };
        let (client, mut driver) = connect_mqtt(&config).unwrap();
        for i in 0..40 {
            client.subscribe_sensor(&format!("s{i}")).unwrap();
        }

        // 80 subscriptions against a queue of 4: nothing may be rejected
        client.handle_event(TransportEvent::Connected);
        client.subscribe_sensor("extra").unwrap();

        let mut filters = Vec::new();
        while let Ok(request) = driver.requests.try_recv() {
            filters.push(request.topic().to_string());
        }
        assert_eq!(filters.len(), 82);
        assert_eq!(filters[0], "sensors/meta/s0");
        assert_eq!(filters[1], "sensors/data/s0");
        assert_eq!(filters[81], "sensors/data/extra");
    }

    #[tokio::test]
    async fn test_requests_fail_after_driver_dropped() {
        let (client, driver) = connect_mqtt(&ClientConfig::default()).unwrap();
        drop(driver);
        client.handle_event(TransportEvent::Connected);
        assert!(matches!(
            client.subscribe_sensor("temp"),
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(QoS::from(Qos::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(QoS::from(Qos::AtLeastOnce), QoS::AtLeastOnce);
    }
}
