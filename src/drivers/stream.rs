use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use log::{debug, info};
use serialport::SerialPort;
use crate::drivers::block::{block_limit, parse_ascii_values, read_block, read_line, TERMINATOR};
use crate::drivers::{AcquisitionError, ScpiTransport, DEFAULT_CHUNK_SAMPLES};
/// Newline terminated SCPI over any byte stream (serial line, raw TCP socket).
pub struct StreamTransport<S: Read + Write> {
    reader: BufReader<S>,
    name: String,
    max_block_len: usize,
}
impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(stream),
            name: name.into(),
            max_block_len: block_limit(DEFAULT_CHUNK_SAMPLES),
        }
    }
    /// Caps the payload a single binary reply may announce.
    pub fn with_max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = max_block_len;
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
    fn send(&mut self, command: &str) -> Result<(), AcquisitionError> {
        debug!("{} <- {}", self.name, command);
        let stream = self.reader.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.write_all(&[TERMINATOR])?;
        stream.flush()?;
        Ok(())
    }
}
impl<S: Read + Write> ScpiTransport for StreamTransport<S> {
    fn write(&mut self, command: &str) -> Result<(), AcquisitionError> {
        self.send(command)
    }
    fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError> {
        self.send(command)?;
        let line = read_line(&mut self.reader, command)?;
        parse_ascii_values(command, &line)
    }
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.send(command)?;
        let block = read_block(&mut self.reader, command, self.max_block_len)?;
        debug!("{} -> {} byte block", self.name, block.len());
        Ok(block)
    }
}
pub fn open_serial(
    port: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<StreamTransport<Box<dyn SerialPort>>, AcquisitionError> {
    let stream = serialport::new(port, baud_rate).timeout(timeout).open()?;
    info!("opened serial instrument link {port} @ {baud_rate} baud");
    Ok(StreamTransport::new(stream, port))
}
pub fn connect_tcp(
    address: &str,
    timeout: Duration,
) -> Result<StreamTransport<TcpStream>, AcquisitionError> {
    let stream = TcpStream::connect(address)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    info!("connected to SCPI socket {address}");
    Ok(StreamTransport::new(stream, address))
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    struct Loopback {
        replies: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }
    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }
    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    fn transport(replies: &[u8]) -> StreamTransport<Loopback> {
        StreamTransport::new(
            Loopback {
                replies: Cursor::new(replies.to_vec()),
                written: Vec::new(),
            },
            "loopback",
        )
    }
    #[test]
    fn commands_are_newline_terminated() {
        let mut t = transport(b"");
        t.write(":STOP").unwrap();
        t.write(":RUN").unwrap();
        assert_eq!(t.into_inner().written, b":STOP\n:RUN\n".to_vec());
    }
    #[test]
    fn mixes_ascii_and_binary_replies() {
        let mut t = transport(b"1.0e-9\n#14\x01\x02\x03\x04\n5.0e+01\n");
        assert_eq!(t.query_ascii(":WAVeform:XINCrement?").unwrap(), vec![1.0e-9]);
        assert_eq!(t.query_binary(":WAVeform:DATA?").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(t.query_ascii(":MEAS:ITEM? FREQ").unwrap(), vec![50.0]);
        let written = t.into_inner().written;
        assert_eq!(
            String::from_utf8(written).unwrap(),
            ":WAVeform:XINCrement?\n:WAVeform:DATA?\n:MEAS:ITEM? FREQ\n"
        );
    }
    #[test]
    fn block_limit_is_enforced() {
        let mut t = transport(b"#15abcde\n").with_max_block_len(4);
        assert!(matches!(
            t.query_binary(":WAVeform:DATA?"),
            Err(AcquisitionError::MalformedResponse { .. })
        ));
    }
    #[test]
    fn closed_stream_is_reported() {
        let mut t = transport(b"");
        assert!(t.query_ascii(":ACQuire:SRATe?").is_err());
    }
}
