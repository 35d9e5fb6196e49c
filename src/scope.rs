use std::thread;
use std::time::Duration;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use crate::drivers::commands;
use crate::drivers::transport::query_scalar;
use crate::drivers::{fetch, to_voltage, AcquisitionError, ScpiTransport, DEFAULT_CHUNK_SAMPLES};
use crate::types::ChannelCapture;
/// Per-cycle knobs of the capture sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Most samples requested by one binary read.
    pub chunk_samples: u64,
    /// Wait after `:STOP` before reading; the scope needs it to freeze memory.
    pub settle_ms: u64,
}
impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            settle_ms: 500,
        }
    }
}
impl AcquisitionSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
/// Connected oscilloscope. Owns the transport handle; every acquisition call
/// goes through it.
pub struct ScopeSession<T: ScpiTransport> {
    transport: T,
}
impl<T: ScpiTransport> ScopeSession<T> {
    /// Puts the scope into RAW/BYTE waveform mode and checks it answers
    /// waveform queries.
    pub fn connect(mut transport: T) -> Result<Self, AcquisitionError> {
        match Self::configure(&mut transport) {
            Ok(x_increment) => {
                info!("instrument ready (x increment {x_increment:e} s)");
                Ok(Self { transport })
            }
            Err(e) => Err(AcquisitionError::UnsupportedDevice(Box::new(e))),
        }
    }
    fn configure(transport: &mut T) -> Result<f64, AcquisitionError> {
        transport.write(commands::WAVEFORM_MODE_RAW)?;
        transport.write(commands::WAVEFORM_FORMAT_BYTE)?;
        query_scalar(transport, commands::X_INCREMENT)
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
    pub fn into_transport(self) -> T {
        self.transport
    }
    /// Routes both the waveform readout and the measurement unit to `channel`.
    pub fn select_channel(&mut self, channel: u8) -> Result<(), AcquisitionError> {
        if !(1..=2).contains(&channel) {
            return Err(AcquisitionError::InvalidChannel(channel));
        }
        self.transport
            .write(&commands::source_channel(commands::WAVEFORM_SOURCE, channel))?;
        self.transport
            .write(&commands::source_channel(commands::MEASURE_SOURCE, channel))
    }
    pub fn stop(&mut self) -> Result<(), AcquisitionError> {
        self.transport.write(commands::STOP)
    }
    pub fn run(&mut self) -> Result<(), AcquisitionError> {
        self.transport.write(commands::RUN)
    }
    /// Instantaneous frequency of the measurement source; 9.9e37 when the
    /// scope cannot measure one.
    pub fn frequency(&mut self) -> Result<f64, AcquisitionError> {
        query_scalar(&mut self.transport, commands::FREQUENCY)
    }
    /// One stop, settle, fetch, run cycle on the currently selected source.
    pub fn capture(
        &mut self,
        channel: u8,
        settings: &AcquisitionSettings,
    ) -> Result<ChannelCapture, AcquisitionError> {
        self.stop()?;
        thread::sleep(settings.settle());
        let acquisition = fetch(&mut self.transport, settings.chunk_samples)?;
        self.run()?;
        let frequency = self.frequency()?;
        debug!(
            "CH{channel}: depth {} -> {} raw bytes",
            acquisition.memory_depth,
            acquisition.raw.len()
        );
        let voltages = to_voltage(acquisition.raw.decimate(), &acquisition.params);
        Ok(ChannelCapture {
            channel,
            voltages,
            x_increment: acquisition.params.x_increment,
            x_reference: acquisition.params.x_reference,
            frequency,
        })
    }
}
