//! `sensorlink dump`

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sensorlink_core::RecordReader;
use tracing::warn;

pub fn run(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let stdout = std::io::stdout();
    dump(BufReader::new(file), &mut stdout.lock())
}

/// Print the schema, then one JSON line per packet.
pub(crate) fn dump<R: std::io::Read, W: Write>(input: R, out: &mut W) -> Result<()> {
    let mut reader = RecordReader::open(input).context("reading record header")?;
    writeln!(out, "{}", serde_json::to_string(reader.codec().schema())?)?;

    let mut index = 0usize;
    while let Some(bytes) = reader.next_packet()? {
        match reader.codec().decode(&bytes) {
            Ok(packet) => writeln!(out, "{}", serde_json::to_string(&packet)?)?,
            Err(e) => warn!("Skipping packet {}: {}", index, e),
        }
        index += 1;
    }
    Ok(())
}
