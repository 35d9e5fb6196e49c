use thiserror::Error;
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("transport i/o failed: {0}")]
    Transport(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("malformed response to `{command}`: {detail}")]
    MalformedResponse { command: String, detail: String },
    #[error("selected device is not supported: {0}")]
    UnsupportedDevice(Box<AcquisitionError>),
    #[error("channel {0} does not exist; expected 1 or 2")]
    InvalidChannel(u8),
    #[error("instrument reported an unusable memory depth: {0}")]
    InvalidMemoryDepth(f64),
    #[error("chunk size must be at least one sample")]
    InvalidChunkSize,
    #[error("waveform contains no samples")]
    EmptyWaveform,
    #[error("an acquisition worker is already running")]
    WorkerBusy,
    #[error("no instrument session available; the last worker did not return it")]
    NoSession,
}
impl AcquisitionError {
    pub fn malformed(command: &str, detail: impl Into<String>) -> Self {
        AcquisitionError::MalformedResponse {
            command: command.to_string(),
            detail: detail.into(),
        }
    }
}
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("nothing to save; take a measurement first")]
    NoMeasurement,
    #[error("channel lengths differ: {first} vs {second}")]
    LengthMismatch { first: usize, second: usize },
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}
