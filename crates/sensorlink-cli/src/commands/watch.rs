//! `sensorlink watch`

use std::fmt::Write as _;

use anyhow::Result;
use futures::StreamExt;
use sensorlink_client::{ClientConfig, SensorEvent};
use sensorlink_core::{DataPacket, SensorSchema};
use serde::Serialize;
use tracing::info;

use super::start_client;

#[derive(Serialize)]
struct PacketLine<'a> {
    sensor: &'a str,
    packet: &'a DataPacket,
}

pub async fn run(mut config: ClientConfig, names: &[String], json: bool) -> Result<()> {
    config.discovery_enabled = true;
    let (client, driver) = start_client(&config)?;
    let mut events = client.event_stream();

    if names.is_empty() {
        client.subscribe_all_sensors()?;
    } else {
        for name in names {
            client.subscribe_sensor(name)?;
        }
    }

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                match event {
                    SensorEvent::Discovered { name, codec } => info!(
                        "Discovered sensor {:?} ({:?}, {} channels, {} packets)",
                        name,
                        codec.schema().name,
                        codec.channel_count(),
                        codec.length()
                    ),
                    SensorEvent::Deleted { name } => info!("Sensor {:?} deleted", name),
                    SensorEvent::Data { name, packet, .. } => {
                        if json {
                            let line = PacketLine { sensor: &name, packet: &packet };
                            println!("{}", serde_json::to_string(&line)?);
                        } else if let Some(codec) = client.discovered(&name) {
                            print!("{}", format_packet(&name, codec.schema(), &packet));
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    driver.abort();
    Ok(())
}

/// Render a packet as an indented block with channel units.
pub(crate) fn format_packet(name: &str, schema: &SensorSchema, packet: &DataPacket) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {:?}:", name, schema.name);
    for (channel, value) in packet.iter() {
        let unit = schema
            .channel(channel)
            .map(|c| c.unit.as_str())
            .unwrap_or_default();
        if unit.is_empty() {
            let _ = writeln!(out, "    {channel}: {value}");
        } else {
            let _ = writeln!(out, "    {channel}: {value} {unit}");
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlink_core::{ChannelDescriptor, PacketCodec, ReadingValue, Readings};

    #[test]
    fn test_format_packet() {
        let schema = SensorSchema::new("CPU Temperature")
            .with_channel(ChannelDescriptor::float("cpu_temp", 64).with_unit("°C"))
            .with_channel(ChannelDescriptor::string("status"));
        let codec = PacketCodec::from_schema(schema.clone()).unwrap();
        let readings: Readings = [
            ("cpu_temp".to_string(), ReadingValue::Number(45.5)),
            ("status".to_string(), ReadingValue::from("chilling")),
        ]
        .into();
        let packet = codec.decode(&codec.encode(&readings, None).unwrap()).unwrap();

        let text = format_packet("cpu", &schema, &packet);
        assert_eq!(
            text,
            "cpu \"CPU Temperature\":\n    cpu_temp: 45.5 °C\n    status: \"chilling\"\n\n"
        );
    }
}
