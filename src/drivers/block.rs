//! Reply decoding for SCPI byte streams.
//!
//! ASCII replies are newline terminated lists of comma separated numbers.
//! Binary replies use the IEEE 488.2 block format: `#`, one digit `n`, `n`
//! decimal digits giving the payload length, the payload, then the newline
//! terminator. `#0` marks an indefinite block that runs up to the newline.
use std::io::{BufRead, Read};
use crate::drivers::AcquisitionError;
pub const TERMINATOR: u8 = b'\n';
/// Four RAW bytes per point, doubled for headroom.
const BLOCK_BYTES_PER_SAMPLE: u64 = 8;
/// Largest payload accepted for reads of at most `chunk_samples` points.
pub fn block_limit(chunk_samples: u64) -> usize {
    usize::try_from(chunk_samples.saturating_mul(BLOCK_BYTES_PER_SAMPLE)).unwrap_or(usize::MAX)
}
pub fn parse_ascii_values(command: &str, reply: &str) -> Result<Vec<f64>, AcquisitionError> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Ok(Vec::new());
    }
    reply
        .split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|e| AcquisitionError::malformed(command, format!("`{field}`: {e}")))
        })
        .collect()
}
pub fn read_line<R: BufRead>(reader: &mut R, command: &str) -> Result<String, AcquisitionError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(AcquisitionError::malformed(command, "connection closed"));
    }
    Ok(line)
}
/// Reads one block; payloads longer than `max_len` are refused before any
/// buffer is sized from the header.
pub fn read_block<R: BufRead>(
    reader: &mut R,
    command: &str,
    max_len: usize,
) -> Result<Vec<u8>, AcquisitionError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    if byte[0] != b'#' {
        return Err(AcquisitionError::malformed(
            command,
            format!("expected block header `#`, got 0x{:02x}", byte[0]),
        ));
    }
    reader.read_exact(&mut byte)?;
    let digits = match (byte[0] as char).to_digit(10) {
        Some(d) => d as usize,
        None => {
            return Err(AcquisitionError::malformed(
                command,
                "block header length digit missing",
            ))
        }
    };
    if digits == 0 {
        let mut payload = Vec::new();
        let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
        reader.by_ref().take(limit).read_until(TERMINATOR, &mut payload)?;
        if payload.last() == Some(&TERMINATOR) {
            payload.pop();
        } else if payload.len() > max_len {
            return Err(AcquisitionError::malformed(
                command,
                format!("indefinite block exceeds {max_len} bytes"),
            ));
        }
        return Ok(payload);
    }
    let mut len_field = vec![0u8; digits];
    reader.read_exact(&mut len_field)?;
    let len: usize = std::str::from_utf8(&len_field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AcquisitionError::malformed(command, "block length is not a number"))?;
    if len > max_len {
        return Err(AcquisitionError::malformed(
            command,
            format!("block of {len} bytes exceeds the {max_len} byte limit"),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    reader.read_exact(&mut byte)?;
    if byte[0] != TERMINATOR {
        return Err(AcquisitionError::malformed(
            command,
            "block not followed by the line terminator",
        ));
    }
    Ok(payload)
}
