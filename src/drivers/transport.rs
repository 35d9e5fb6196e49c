use std::collections::{HashMap, VecDeque};
use std::io;
use crate::drivers::AcquisitionError;
/// Command/query channel to an instrument speaking SCPI.
pub trait ScpiTransport {
    fn write(&mut self, command: &str) -> Result<(), AcquisitionError>;
    /// Sends a query and parses the comma separated numeric reply.
    fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError>;
    /// Sends a query whose reply is a binary block of unsigned bytes.
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError>;
}
impl<T: ScpiTransport + ?Sized> ScpiTransport for Box<T> {
    fn write(&mut self, command: &str) -> Result<(), AcquisitionError> {
        (**self).write(command)
    }
    fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError> {
        (**self).query_ascii(command)
    }
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
        (**self).query_binary(command)
    }
}
/// Sends an ASCII query and keeps the first value of the reply.
pub fn query_scalar<T: ScpiTransport + ?Sized>(
    transport: &mut T,
    command: &str,
) -> Result<f64, AcquisitionError> {
    transport
        .query_ascii(command)?
        .first()
        .copied()
        .ok_or_else(|| AcquisitionError::malformed(command, "empty reply"))
}
/// Scripted transport useful for tests: fixed ASCII answers, queued binary
/// blocks and a log of every command it saw.
#[derive(Debug, Default)]
pub struct ManualTransport {
    ascii: HashMap<String, Vec<f64>>,
    binary: VecDeque<Vec<u8>>,
    binary_fallback: Option<Vec<u8>>,
    log: Vec<String>,
}
impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ascii(mut self, command: &str, values: &[f64]) -> Self {
        self.ascii.insert(command.to_string(), values.to_vec());
        self
    }
    pub fn with_binary(mut self, block: Vec<u8>) -> Self {
        self.binary.push_back(block);
        self
    }
    /// Block returned once the queue is drained; without it an empty queue is a fault.
    pub fn with_binary_fallback(mut self, block: Vec<u8>) -> Self {
        self.binary_fallback = Some(block);
        self
    }
    pub fn log(&self) -> &[String] {
        &self.log
    }
    /// Every `:WAVeform:STARt`/`:WAVeform:STOP` pair written so far.
    pub fn windows(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut start = None;
        for line in &self.log {
            if let Some(v) = line.strip_prefix(":WAVeform:STARt ") {
                start = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix(":WAVeform:STOP ") {
                if let (Some(s), Ok(e)) = (start.take(), v.trim().parse()) {
                    out.push((s, e));
                }
            }
        }
        out
    }
    pub fn count(&self, command: &str) -> usize {
        self.log.iter().filter(|c| c.as_str() == command).count()
    }
}
impl ScpiTransport for ManualTransport {
    fn write(&mut self, command: &str) -> Result<(), AcquisitionError> {
        self.log.push(command.to_string());
        Ok(())
    }
    fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError> {
        self.log.push(command.to_string());
        self.ascii.get(command).cloned().ok_or_else(|| {
            AcquisitionError::Transport(io::Error::new(
                io::ErrorKind::Other,
                format!("no scripted answer for `{command}`"),
            ))
        })
    }
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.log.push(command.to_string());
        self.binary
            .pop_front()
            .or_else(|| self.binary_fallback.clone())
            .ok_or_else(|| {
                AcquisitionError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no scripted block for `{command}`"),
                ))
            })
    }
}
