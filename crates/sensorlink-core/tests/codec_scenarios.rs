//! End-to-end codec behavior: schema blobs, packets and the raw fast path.

use chrono::{TimeZone, Utc};
use sensorlink_core::{
    decode_schema, encode_schema, ChannelDescriptor, CodecError, EncodingKind, PacketCodec,
    PacketLength, ReadingValue, Readings, SensorSchema,
};

fn mpu6050_schema() -> SensorSchema {
    let accel = |name: &str| {
        ChannelDescriptor::scaled(name, 16)
            .with_unit("g")
            .with_lsb(16.0 / 32768.0)
    };
    let gyro = |name: &str| {
        ChannelDescriptor::scaled(name, 16)
            .with_unit("°/s")
            .with_lsb(2000.0 / 32768.0)
    };
    SensorSchema::new("MPU6050")
        .with_channel(ChannelDescriptor::timestamp())
        .with_channels([accel("ax"), accel("ay"), accel("az")])
        .with_channel(
            ChannelDescriptor::scaled("temperature", 16)
                .with_unit("°C")
                .with_lsb(1.0 / 340.0)
                .with_zero(36.53),
        )
        .with_channels([gyro("gx"), gyro("gy"), gyro("gz")])
}

fn approx(value: Option<&ReadingValue>, expected: f64, tolerance: f64) {
    let v = value.and_then(ReadingValue::as_f64).expect("numeric value");
    assert!(
        (v - expected).abs() <= tolerance,
        "{v} is not within {tolerance} of {expected}"
    );
}

#[test]
fn test_float_with_timestamp() {
    let codec = PacketCodec::from_schema(
        SensorSchema::new("A")
            .with_channel(ChannelDescriptor::timestamp())
            .with_channel(ChannelDescriptor::float("v", 32)),
    )
    .unwrap();
    assert_eq!(codec.length(), PacketLength::Fixed(12));

    let t = Utc.timestamp_opt(1_668_906_675, 987_654_321).unwrap();
    let readings: Readings = [("v".to_string(), ReadingValue::Number(45.2))].into();
    let data = codec.encode(&readings, Some(t)).unwrap();
    let packet = codec.decode(&data).unwrap();

    assert_eq!(
        packet.get("timestamp").and_then(ReadingValue::as_timestamp),
        Some(Utc.timestamp_opt(1_668_906_675, 987_654_000).unwrap())
    );
    approx(packet.get("v"), 45.2, 1e-5);
}

#[test]
fn test_scaled_accel_axis() {
    let codec = PacketCodec::from_schema(
        SensorSchema::new("B")
            .with_channel(ChannelDescriptor::scaled("ax", 16).with_lsb(16.0 / 32768.0)),
    )
    .unwrap();
    let packet = codec.decode(&[0x40, 0x00]).unwrap();
    assert_eq!(packet.get("ax"), Some(&ReadingValue::Number(8.0)));
}

#[test]
fn test_string_terminator() {
    let codec =
        PacketCodec::from_schema(SensorSchema::new("C").with_channel(ChannelDescriptor::string("status")))
            .unwrap();
    let readings: Readings = [("status".to_string(), ReadingValue::from("chilling"))].into();
    assert_eq!(codec.encode(&readings, None).unwrap(), b"chilling\0");
    assert!(matches!(
        codec.decode(b"chilling"),
        Err(CodecError::PacketDecode(_))
    ));
}

#[test]
fn test_mpu6050_raw_fast_path() {
    let schema = mpu6050_schema();
    let blob = encode_schema(&schema).unwrap();

    // A consumer builds its codec from the blob alone
    let codec = PacketCodec::from_blob(blob.as_bytes()).unwrap();
    assert_eq!(codec.schema(), &schema);
    assert!(codec.supports_raw());
    assert_eq!(codec.length(), PacketLength::Fixed(22));

    let raw = [
        0x07, 0x16, 0x01, 0x8b, 0xfc, 0xa2, 0xfd, 0xd2, 0xff, 0xd2, 0xfd, 0xce, 0x00, 0x5d,
    ];
    let ts = Utc.with_ymd_and_hms(2022, 11, 20, 1, 11, 15).unwrap();
    let data = codec.encode_raw(&raw, Some(ts)).unwrap();
    assert_eq!(&data[8..], &raw);

    let packet = codec.decode(&data).unwrap();
    assert_eq!(packet.get("timestamp"), Some(&ReadingValue::Timestamp(ts)));
    approx(packet.get("ax"), 1814.0 * 16.0 / 32768.0, 1e-12);
    approx(packet.get("az"), -862.0 * 16.0 / 32768.0, 1e-12);
    approx(packet.get("temperature"), -558.0 / 340.0 + 36.53, 1e-9);
    approx(packet.get("gz"), 93.0 * 2000.0 / 32768.0, 1e-12);

    assert!(matches!(
        codec.encode_raw(&raw[..13], None),
        Err(CodecError::RawLengthMismatch {
            expected: 14,
            actual: 13
        })
    ));
}

#[test]
fn test_decoded_packet_reencodes_identically() {
    let codec = PacketCodec::from_schema(mpu6050_schema()).unwrap();
    let raw = [
        0x07, 0x16, 0x01, 0x8b, 0xfc, 0xa2, 0xfd, 0xd2, 0xff, 0xd2, 0xfd, 0xce, 0x00, 0x5d,
    ];
    let ts = Utc.with_ymd_and_hms(2022, 11, 20, 1, 11, 15).unwrap();
    let data = codec.encode_raw(&raw, Some(ts)).unwrap();

    // The decoded timestamp travels as a reading, no override needed
    let readings = codec.decode(&data).unwrap().into_readings();
    assert_eq!(readings.len(), 8);
    assert_eq!(codec.encode(&readings, None).unwrap(), data);
}

#[test]
fn test_mpu6050_encode_decode() {
    let codec = PacketCodec::from_schema(mpu6050_schema()).unwrap();
    let values = [
        ("ax", 0.98),
        ("ay", 0.01),
        ("az", -0.05),
        ("temperature", 24.5),
        ("gx", 10.1),
        ("gy", -20.4),
        ("gz", 5.2),
    ];
    let readings: Readings = values
        .iter()
        .map(|(k, v)| (k.to_string(), ReadingValue::Number(*v)))
        .collect();

    let data = codec.encode(&readings, None).unwrap();
    assert_eq!(data.len(), 22);

    let packet = codec.decode(&data).unwrap();
    for (name, expected) in values {
        let lsb = match name {
            "temperature" => 1.0 / 340.0,
            "gx" | "gy" | "gz" => 2000.0 / 32768.0,
            _ => 16.0 / 32768.0,
        };
        approx(packet.get(name), expected, lsb / 2.0 + 1e-12);
    }
}

#[test]
fn test_schema_blob_roundtrip_and_identity() {
    let schema = mpu6050_schema();
    let blob = encode_schema(&schema).unwrap();
    let decoded = decode_schema(blob.as_bytes()).unwrap();
    assert_eq!(decoded, schema);
    assert_eq!(encode_schema(&decoded).unwrap(), blob);

    // Renaming a single channel changes the blob
    let mut other = schema.clone();
    other.channels[1].name = "accel_x".into();
    assert_ne!(encode_schema(&other).unwrap(), blob);
}

#[test]
fn test_raw_eligibility() {
    let cases = [
        (SensorSchema::new("empty"), false),
        (
            SensorSchema::new("no-ts").with_channel(ChannelDescriptor::float("v", 32)),
            false,
        ),
        (
            SensorSchema::new("renamed")
                .with_channel(ChannelDescriptor::timestamp().renamed("time")),
            false,
        ),
        (
            SensorSchema::new("ok")
                .with_channel(ChannelDescriptor::timestamp())
                .with_channel(ChannelDescriptor::string("s")),
            true,
        ),
    ];
    for (schema, eligible) in cases {
        let name = schema.name.clone();
        let codec = PacketCodec::from_schema(schema).unwrap();
        assert_eq!(codec.supports_raw(), eligible, "{name}");
        if !eligible {
            assert!(matches!(
                codec.encode_raw(&[], None),
                Err(CodecError::Precondition(_))
            ));
        }
    }
}

#[test]
fn test_invalid_schema_from_blob() {
    // Unit on a timestamp channel passes the wire format but not validation
    let schema = SensorSchema::new("bad").with_channel(ChannelDescriptor::timestamp().with_unit("s"));
    let blob = encode_schema(&schema).unwrap();
    let err = PacketCodec::from_blob(blob.as_bytes()).unwrap_err();
    assert!(err.is_construction_error());

    let schema = SensorSchema::new("odd").with_channel(ChannelDescriptor::new("x", EncodingKind::ScaledInteger).with_bits(12));
    let blob = encode_schema(&schema).unwrap();
    assert!(matches!(
        PacketCodec::from_blob(blob.as_bytes()),
        Err(CodecError::UnsupportedEncoding(_))
    ));
}
