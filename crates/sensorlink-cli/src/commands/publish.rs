//! `sensorlink publish-random`

use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensorlink_client::ClientConfig;
use sensorlink_core::{ChannelDescriptor, ReadingValue, Readings, SensorSchema};
use tracing::{info, warn};

use super::start_client;

/// Schema of the random test sensor.
pub(crate) fn random_sensor_schema() -> SensorSchema {
    let axis = ChannelDescriptor::scaled("x", 16)
        .with_unit("m/s²")
        .with_lsb(0.01);
    SensorSchema::new("Random Testing Sensor")
        .with_channel(ChannelDescriptor::timestamp())
        .with_channel(ChannelDescriptor::float("random_percent", 32).with_unit("%"))
        .with_channel(
            ChannelDescriptor::scaled("random_percent_scaled", 16)
                .with_unit("%")
                .with_signed(false)
                .with_lsb(0.1),
        )
        .with_channels([axis.renamed("vector_x"), axis.renamed("vector_y"), axis.renamed("vector_z")])
        .with_channel(ChannelDescriptor::string("status"))
}

pub(crate) fn random_readings(rng: &mut impl Rng) -> Readings {
    let mut readings = Readings::new();
    readings.insert("random_percent".into(), ReadingValue::Number(rng.gen_range(0.0..100.0)));
    readings.insert(
        "random_percent_scaled".into(),
        ReadingValue::Number(rng.gen_range(0.0..100.0)),
    );
    for axis in ["vector_x", "vector_y", "vector_z"] {
        readings.insert(axis.into(), ReadingValue::Number(rng.gen_range(-10.0..10.0)));
    }
    readings.insert("status".into(), ReadingValue::from("vibing"));
    readings
}

pub async fn run(config: ClientConfig, name: &str, interval_ms: u64, count: u64) -> Result<()> {
    let (client, driver) = start_client(&config)?;
    client.create_sensor(name, random_sensor_schema())?;

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut rng = StdRng::from_entropy();
    let mut sent = 0u64;

    while count == 0 || sent < count {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }

        if !client.is_connected() {
            warn!("Not connected to {}, skipping packet", config.broker_addr());
            continue;
        }
        match client.publish_data(name, &random_readings(&mut rng), None) {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to publish packet: {}", e),
        }
    }

    info!("Published {} packets for {:?}", sent, name);
    client.delete_sensor(name)?;
    // Give the event loop a moment to send the deletion
    tokio::time::sleep(Duration::from_millis(200)).await;
    driver.abort();
    Ok(())
}
