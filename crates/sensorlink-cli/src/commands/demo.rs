//! `sensorlink demo`: offline walkthrough of schema and packet encoding.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use sensorlink_core::{ChannelDescriptor, PacketCodec, ReadingValue, Readings, SensorSchema};

pub fn run() -> Result<()> {
    let stdout = std::io::stdout();
    write_demo(&mut stdout.lock())
}

/// Classic 16-bytes-per-row hex dump with an offset column.
pub(crate) fn hexdump(data: &[u8]) -> String {
    let mut out = format!("({} bytes)\n", data.len());
    for (row, chunk) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| hex::encode([*b])).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}: {:<47}  {}\n", row * 16, bytes.join(" "), ascii));
    }
    out
}

fn heading<W: Write>(out: &mut W, title: &str, underline: char) -> Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", underline.to_string().repeat(title.chars().count()))?;
    Ok(())
}

fn cpu_schema() -> SensorSchema {
    SensorSchema::new("CPU Temperature")
        .with_channel(ChannelDescriptor::timestamp())
        .with_channel(ChannelDescriptor::float("cpu_temp", 32).with_unit("°C"))
        .with_channel(ChannelDescriptor::scaled("open_files", 32).with_signed(false))
        .with_channel(ChannelDescriptor::string("status"))
}

pub(crate) fn mpu6050_schema() -> SensorSchema {
    let accel = ChannelDescriptor::scaled("ax", 16)
        .with_unit("g")
        .with_lsb(16.0 / 32768.0);
    let gyro = ChannelDescriptor::scaled("gx", 16)
        .with_unit("°/s")
        .with_lsb(2000.0 / 32768.0);
    SensorSchema::new("MPU6050")
        .with_channel(ChannelDescriptor::timestamp())
        .with_channels([accel.renamed("ax"), accel.renamed("ay"), accel.renamed("az")])
        .with_channel(
            ChannelDescriptor::scaled("temperature", 16)
                .with_unit("°C")
                .with_lsb(1.0 / 340.0)
                .with_zero(36.53),
        )
        .with_channels([gyro.renamed("gx"), gyro.renamed("gy"), gyro.renamed("gz")])
}

fn readings<const N: usize>(values: [(&str, ReadingValue); N]) -> Readings {
    values
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub(crate) fn write_demo<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out)?;
    heading(out, "CPU Temperature Sensor Example", '=')?;
    heading(out, "Metadata", '-')?;
    let cpu = PacketCodec::from_schema(cpu_schema())?;
    writeln!(out, "{}", serde_json::to_string(cpu.schema())?)?;
    write!(out, "{}", hexdump(cpu.blob().as_bytes()))?;

    writeln!(out)?;
    heading(out, "Sensor Reading", '-')?;
    let data = cpu.encode(
        &readings([
            ("cpu_temp", ReadingValue::Number(45.2)),
            ("open_files", ReadingValue::Number(3412.0)),
            ("status", ReadingValue::from("chilling")),
        ]),
        None,
    )?;
    writeln!(out, "{}", serde_json::to_string(&cpu.decode(&data)?)?)?;
    write!(out, "{}", hexdump(&data))?;

    writeln!(out)?;
    writeln!(out)?;
    heading(out, "MPU6050 Example", '=')?;
    heading(out, "Metadata", '-')?;
    let built = PacketCodec::from_schema(mpu6050_schema())?;
    writeln!(out, "{}", serde_json::to_string(built.schema())?)?;
    write!(out, "{}", hexdump(built.blob().as_bytes()))?;

    // A receiver only ever sees the blob
    let mpu = PacketCodec::from_blob(built.blob().as_bytes())?;

    writeln!(out)?;
    heading(out, "Sensor Reading", '-')?;
    let taken_at = Utc
        .with_ymd_and_hms(2022, 11, 20, 1, 11, 15)
        .single()
        .context("invalid demo timestamp")?;
    let data = mpu.encode(
        &readings([
            ("ax", ReadingValue::Number(0.98)),
            ("ay", ReadingValue::Number(0.01)),
            ("az", ReadingValue::Number(-0.05)),
            ("temperature", ReadingValue::Number(24.5)),
            ("gx", ReadingValue::Number(10.1)),
            ("gy", ReadingValue::Number(-20.4)),
            ("gz", ReadingValue::Number(5.2)),
        ]),
        Some(taken_at),
    )?;
    writeln!(out, "{}", serde_json::to_string(&mpu.decode(&data)?)?)?;
    write!(out, "{}", hexdump(&data))?;

    writeln!(out)?;
    heading(out, "Sensor Reading (raw)", '-')?;
    // Register dump straight from the chip, copied after the timestamp
    let raw = hex::decode("0716018bfca2fdd2ffd2fdce005d")?;
    let data = mpu.encode_raw(&raw, None)?;
    writeln!(out, "{}", serde_json::to_string(&mpu.decode(&data)?)?)?;
    write!(out, "{}", hexdump(&data))?;
    writeln!(out)?;
    Ok(())
}
