use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::drivers::block::block_limit;
use crate::drivers::{connect_tcp, open_serial, ScpiTransport, SimulatedScope};
use crate::scope::AcquisitionSettings;
use crate::types::{ChannelSelection, Mode, TriggerConfig};
/// How to reach the oscilloscope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Built-in simulated scope, no hardware needed.
    Simulation {
        #[serde(default)]
        seed: u64,
    },
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// Raw SCPI socket, e.g. `192.168.1.50:5555`.
    Tcp { address: String },
}
fn default_baud_rate() -> u32 {
    115_200
}
impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Simulation { seed: 0 }
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub read_timeout_ms: u64,
    pub channels: ChannelSelection,
    pub mode: Mode,
    pub trigger: TriggerConfig,
    pub acquisition: AcquisitionSettings,
}
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            read_timeout_ms: 10_000,
            channels: ChannelSelection::default(),
            mode: Mode::default(),
            trigger: TriggerConfig::default(),
            acquisition: AcquisitionSettings::default(),
        }
    }
}
impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
    pub fn validate(&self) -> Result<()> {
        if self.acquisition.chunk_samples == 0 {
            anyhow::bail!("acquisition.chunk_samples must be at least 1");
        }
        if !self.trigger.threshold_volts.is_finite() {
            anyhow::bail!("trigger.threshold_volts must be a finite number");
        }
        Ok(())
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
    /// Opens the configured link. The handle is boxed so the engine does not
    /// care which kind it got.
    pub fn open_transport(&self) -> Result<Box<dyn ScpiTransport + Send>> {
        let max_block = block_limit(self.acquisition.chunk_samples);
        let transport: Box<dyn ScpiTransport + Send> = match &self.transport {
            TransportConfig::Simulation { seed } => Box::new(SimulatedScope::new(*seed)),
            TransportConfig::Serial { port, baud_rate } => Box::new(
                open_serial(port, *baud_rate, self.read_timeout())
                    .with_context(|| format!("cannot open serial port {port}"))?
                    .with_max_block_len(max_block),
            ),
            TransportConfig::Tcp { address } => Box::new(
                connect_tcp(address, self.read_timeout())
                    .with_context(|| format!("cannot connect to {address}"))?
                    .with_max_block_len(max_block),
            ),
        };
        Ok(transport)
    }
}
