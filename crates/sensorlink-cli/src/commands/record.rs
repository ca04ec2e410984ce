//! `sensorlink record`
//!
//! One record file per sensor schema. A sensor that changes its schema
//! starts a new file; deletion closes the current one.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::StreamExt;
use sensorlink_client::{ClientConfig, SensorEvent};
use sensorlink_core::RecordWriter;
use tracing::{info, warn};

use super::start_client;

/// First path of the form `{path}-{n}` that does not exist yet.
pub(crate) fn path_with_suffix(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (0u64..)
        .map(|n| path.with_file_name(format!("{name}-{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

struct OpenRecord {
    path: PathBuf,
    writer: RecordWriter<File>,
}

/// Routes sensor events into record files under one directory.
pub(crate) struct Recorder {
    dir: PathBuf,
    open: HashMap<String, OpenRecord>,
}

impl Recorder {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            open: HashMap::new(),
        }
    }

    pub fn handle(&mut self, event: &SensorEvent) -> Result<()> {
        match event {
            SensorEvent::Discovered { name, codec } => {
                let blob = codec.blob().as_bytes();
                if let Some(record) = self.open.get(name) {
                    if record.writer.schema_blob() == blob {
                        return Ok(());
                    }
                }
                self.close(name);
                self.start(name, blob)?;
            }
            SensorEvent::Deleted { name } => self.close(name),
            SensorEvent::Data { name, payload, .. } => {
                if let Some(record) = self.open.get_mut(name) {
                    record
                        .writer
                        .write_packet(payload)
                        .with_context(|| format!("writing {}", record.path.display()))?;
                }
            }
        }
        Ok(())
    }

    fn start(&mut self, name: &str, blob: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = path_with_suffix(&self.dir.join(hex::encode(name)));
        info!("Opening {}", path.display());

        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let writer = RecordWriter::create(file, blob)?;
        self.open.insert(name.to_string(), OpenRecord { path, writer });
        Ok(())
    }

    fn close(&mut self, name: &str) {
        if let Some(mut record) = self.open.remove(name) {
            info!(
                "Closing {} after {} packets",
                record.path.display(),
                record.writer.packet_count()
            );
            if let Err(e) = record.writer.flush() {
                warn!("Failed to flush {}: {}", record.path.display(), e);
            }
        }
    }

    pub fn close_all(&mut self) {
        let names: Vec<String> = self.open.keys().cloned().collect();
        for name in names {
            self.close(&name);
        }
    }
}

pub async fn run(mut config: ClientConfig, dir: &Path) -> Result<()> {
    config.discovery_enabled = true;
    let dir = path_with_suffix(dir);
    info!("Recording into {}", dir.display());

    let (client, driver) = start_client(&config)?;
    let mut events = client.event_stream();
    client.subscribe_all_sensors()?;

    let mut recorder = Recorder::new(dir);
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                if let Err(e) = recorder.handle(&event) {
                    warn!("Recording {:?} failed: {:#}", event.name(), e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    recorder.close_all();
    driver.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use sensorlink_core::{ChannelDescriptor, PacketCodec, RecordReader, SensorSchema};

    fn codec(label: &str) -> Arc<PacketCodec> {
        Arc::new(
            PacketCodec::from_schema(
                SensorSchema::new(label)
                    .with_channel(ChannelDescriptor::timestamp())
                    .with_channel(ChannelDescriptor::scaled("x", 8)),
            )
            .unwrap(),
        )
    }

    fn data(codec: &PacketCodec, x: u8) -> SensorEvent {
        let payload = codec.encode_raw(&[x], None).unwrap();
        SensorEvent::Data {
            name: "temp".into(),
            packet: codec.decode(&payload).unwrap(),
            payload,
        }
    }

    #[test]
    fn test_path_with_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("logs");
        assert_eq!(path_with_suffix(&base), tmp.path().join("logs-0"));
        std::fs::create_dir(tmp.path().join("logs-0")).unwrap();
        assert_eq!(path_with_suffix(&base), tmp.path().join("logs-1"));
    }

    #[test]
    fn test_recorder_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs-0");
        let mut recorder = Recorder::new(dir.clone());

        let v1 = codec("T");
        let discovered = SensorEvent::Discovered {
            name: "temp".into(),
            codec: v1.clone(),
        };
        recorder.handle(&discovered).unwrap();
        recorder.handle(&data(&v1, 1)).unwrap();
        // Same schema again keeps the file
        recorder.handle(&discovered).unwrap();
        recorder.handle(&data(&v1, 2)).unwrap();

        // New schema opens a second file
        let v2 = codec("T2");
        recorder
            .handle(&SensorEvent::Discovered {
                name: "temp".into(),
                codec: v2.clone(),
            })
            .unwrap();
        recorder.handle(&data(&v2, 3)).unwrap();
        recorder
            .handle(&SensorEvent::Deleted {
                name: "temp".into(),
            })
            .unwrap();
        // Data after deletion is dropped
        recorder.handle(&data(&v2, 4)).unwrap();

        let first = dir.join(format!("{}-0", hex::encode("temp")));
        let reader = RecordReader::open(File::open(&first).unwrap()).unwrap();
        assert_eq!(reader.codec().schema().name, "T");
        assert_eq!(reader.count(), 2);

        let second = dir.join(format!("{}-1", hex::encode("temp")));
        let reader = RecordReader::open(File::open(&second).unwrap()).unwrap();
        assert_eq!(reader.codec().schema().name, "T2");
        assert_eq!(reader.count(), 1);
    }
}
