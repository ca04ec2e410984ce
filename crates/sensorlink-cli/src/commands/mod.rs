//! Subcommand implementations.

pub mod demo;
pub mod dump;
pub mod publish;
pub mod record;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use sensorlink_client::{connect_mqtt, ClientConfig, SensorClient};
use tokio::task::JoinHandle;

/// Connect to the broker and start polling in the background.
pub(crate) fn start_client(config: &ClientConfig) -> Result<(Arc<SensorClient>, JoinHandle<()>)> {
    let (client, driver) = connect_mqtt(config)?;
    let handle = driver.spawn(client.clone());
    Ok((client, handle))
}
